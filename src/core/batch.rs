//! Batch orchestration: one decoded document in, one outcome per
//! reservation out.
//!
//! Only a missing or malformed `Reservations.Reservation` collection aborts
//! the batch. Every other failure is captured as a [`RecordError`] next to
//! the successful [`WriteReceipt`]s.

use crate::config::toml_config::ProcessorConfig;
use crate::core::destination;
use crate::core::mapper::{map_reservation, Field};
use crate::core::xml_tree::XmlNode;
use crate::domain::model::{BatchReport, Destination, RecordError, RecordOutcome, WriteReceipt};
use crate::domain::ports::BlobStore;
use crate::utils::error::{EtlError, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// 已轉換、等待寫入的單筆記錄
#[derive(Debug)]
struct PreparedRecord {
    index: usize,
    booking_id: String,
    destination: Destination,
    body: Vec<u8>,
}

/// Enumerate `Reservations.Reservation`, always as a sequence.
pub fn reservation_records(document: &XmlNode) -> Result<Vec<&XmlNode>> {
    let root = Field::root(document).element()?;
    let collection = root.child("Reservations")?;

    // <Reservations/> 視為空批次
    if matches!(collection.node(), XmlNode::Text(text) if text.trim().is_empty()) {
        tracing::warn!("Document contains an empty Reservations collection");
        return Ok(Vec::new());
    }

    let records = collection
        .element()?
        .child("Reservation")?
        .items()
        .into_iter()
        .map(|field| field.node())
        .collect();
    Ok(records)
}

fn prepare(
    index: usize,
    node: &XmlNode,
    source_bucket: &str,
    config: &ProcessorConfig,
) -> std::result::Result<PreparedRecord, RecordError> {
    let known_id = node.get("ID").and_then(XmlNode::as_text).map(str::to_string);
    let fail = |error: EtlError| RecordError {
        index,
        booking_id: known_id.clone(),
        error,
    };

    let reservation = map_reservation(node, config.currency_policy).map_err(&fail)?;
    let destination = destination::resolve(source_bucket, &reservation);
    let output = reservation.to_output();
    tracing::debug!("reservationData: {:?}", output);

    let body = if config.pretty_json {
        serde_json::to_vec_pretty(&output)
    } else {
        serde_json::to_vec(&output)
    }
    .map_err(|e| fail(e.into()))?;

    Ok(PreparedRecord {
        index,
        booking_id: reservation.booking_id,
        destination,
        body,
    })
}

async fn write<S: BlobStore>(store: &S, record: PreparedRecord) -> RecordOutcome {
    let PreparedRecord {
        index,
        booking_id,
        destination,
        body,
    } = record;

    match store
        .put(&destination.bucket, &destination.key, &body, JSON_CONTENT_TYPE)
        .await
    {
        Ok(()) => {
            tracing::info!("Successfully uploaded to {}", destination);
            Ok(WriteReceipt {
                index,
                booking_id,
                destination,
                bytes_written: body.len(),
                written_at: Utc::now(),
            })
        }
        Err(error) => Err(RecordError {
            index,
            booking_id: Some(booking_id),
            error,
        }),
    }
}

/// Map, resolve and store every reservation of `document`.
///
/// Writes run concurrently, at most `config.max_concurrent_writes` at a
/// time; the report is ordered by record index.
pub async fn process_document<S: BlobStore>(
    store: &S,
    config: &ProcessorConfig,
    document: &XmlNode,
    source_bucket: &str,
    source_key: &str,
) -> Result<BatchReport> {
    let records = reservation_records(document)?;
    tracing::info!(
        "Processing {} reservation(s) from {}/{}",
        records.len(),
        source_bucket,
        source_key
    );

    let prepared: Vec<_> = records
        .into_iter()
        .enumerate()
        .map(|(index, node)| prepare(index, node, source_bucket, config))
        .collect();

    let mut outcomes: Vec<RecordOutcome> = stream::iter(prepared)
        .map(|item| async move {
            match item {
                Ok(record) => write(store, record).await,
                Err(e) => Err(e),
            }
        })
        .buffer_unordered(config.max_concurrent_writes.max(1))
        .collect()
        .await;

    outcomes.sort_by_key(|outcome| match outcome {
        Ok(receipt) => receipt.index,
        Err(failure) => failure.index,
    });

    for failure in outcomes.iter().filter_map(|o| o.as_ref().err()) {
        tracing::error!(
            bucket = source_bucket,
            key = source_key,
            index = failure.index,
            booking_id = failure.booking_id.as_deref().unwrap_or("<unknown>"),
            "Reservation failed: {}",
            failure.error
        );
    }

    let report = BatchReport {
        source_bucket: source_bucket.to_string(),
        source_key: source_key.to_string(),
        outcomes,
    };
    tracing::info!(
        "Finished {}/{}: {} written, {} failed",
        source_bucket,
        source_key,
        report.succeeded(),
        report.failed()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::xml_tree::decode;
    use crate::utils::error::StoreErrorKind;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        denied_bucket: Option<String>,
    }

    impl BlobStore for MockStorage {
        async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files
                .get(&format!("{}/{}", bucket, key))
                .cloned()
                .ok_or_else(|| EtlError::store(StoreErrorKind::NotFound, bucket, key, "missing"))
        }

        async fn put(&self, bucket: &str, key: &str, data: &[u8], _content_type: &str) -> Result<()> {
            if self.denied_bucket.as_deref() == Some(bucket) {
                return Err(EtlError::store(StoreErrorKind::AccessDenied, bucket, key, "denied"));
            }
            let mut files = self.files.lock().await;
            files.insert(format!("{}/{}", bucket, key), data.to_vec());
            Ok(())
        }
    }

    fn reservation_xml(id: &str, hotel: &str) -> String {
        format!(
            r#"<Reservation>
  <ID>{id}</ID><Hotel>{hotel}</Hotel><From>2024-06-01</From><To>2024-06-04</To>
  <Guest><FirstName>Grace</FirstName><LastName>Hopper</LastName>
    <Address><Street>2 Navy Rd</Street><City>Arlington</City><CountryCode>US</CountryCode></Address>
  </Guest>
  <RoomStays><RoomStay>
    <Room><ID>KNG</ID><Occupancy><Adults>1</Adults><Children>0</Children></Occupancy></Room>
    <Rates><Plan>FLEX</Plan><Rate><Amount>80</Amount><Currency>EUR</Currency></Rate></Rates>
  </RoomStay></RoomStays>
</Reservation>"#
        )
    }

    fn document(records: &[String]) -> XmlNode {
        let xml = format!("<Reservations>{}</Reservations>", records.concat());
        decode(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_lone_reservation_is_enumerated() {
        let doc = document(&[reservation_xml("B1", "H1")]);
        let records = reservation_records(&doc).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("ID").and_then(XmlNode::as_text), Some("B1"));
    }

    #[test]
    fn test_missing_collection_is_batch_fatal() {
        let doc = decode(b"<Bookings><Reservation/></Bookings>").unwrap();
        assert!(matches!(
            reservation_records(&doc),
            Err(EtlError::MissingField { path }) if path == "Reservations"
        ));

        let doc = decode(b"<Reservations><Other/></Reservations>").unwrap();
        assert!(matches!(
            reservation_records(&doc),
            Err(EtlError::MissingField { path }) if path == "Reservations.Reservation"
        ));
    }

    #[test]
    fn test_empty_collection_yields_no_records() {
        let doc = decode(b"<Reservations/>").unwrap();
        assert!(reservation_records(&doc).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_and_sequence_forms_match() {
        let lone = document(&[reservation_xml("B1", "H1")]);
        let record = lone.get("Reservations").and_then(|r| r.get("Reservation")).cloned().unwrap();

        let mut collection = std::collections::BTreeMap::new();
        collection.insert("Reservation".to_string(), XmlNode::List(vec![record]));
        let mut root = std::collections::BTreeMap::new();
        root.insert("Reservations".to_string(), XmlNode::Map(collection));
        let wrapped = XmlNode::Map(root);

        let config = ProcessorConfig::default();
        let lone_store = MockStorage::default();
        let wrapped_store = MockStorage::default();
        process_document(&lone_store, &config, &lone, "hotel-input-dev", "a.xml")
            .await
            .unwrap();
        process_document(&wrapped_store, &config, &wrapped, "hotel-input-dev", "a.xml")
            .await
            .unwrap();

        let lone_files = lone_store.files.lock().await.clone();
        let wrapped_files = wrapped_store.files.lock().await.clone();
        assert_eq!(lone_files.len(), 1);
        assert_eq!(lone_files, wrapped_files);
    }

    #[tokio::test]
    async fn test_record_failures_are_isolated() {
        let broken = reservation_xml("B2", "H1").replace("<FirstName>Grace</FirstName>", "");
        let doc = document(&[
            reservation_xml("B1", "H1"),
            broken,
            reservation_xml("B3", "H2"),
        ]);
        let store = MockStorage::default();
        let config = ProcessorConfig {
            max_concurrent_writes: 2,
            ..ProcessorConfig::default()
        };

        let report = process_document(&store, &config, &doc, "hotel-input-dev", "batch.xml")
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.booking_id.as_deref(), Some("B2"));
        assert!(matches!(
            &failure.error,
            EtlError::MissingField { path } if path == "Guest.FirstName"
        ));

        let indexes: Vec<usize> = report.receipts().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 2]);

        let files = store.files.lock().await;
        assert!(files.contains_key("hotel-output-dev/H1/reservation_B1.json"));
        assert!(files.contains_key("hotel-output-dev/H2/reservation_B3.json"));
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_write_failures_are_record_level() {
        let doc = document(&[reservation_xml("B1", "H1"), reservation_xml("B2", "H2")]);
        let store = MockStorage {
            denied_bucket: Some("hotel-output-dev/H2".to_string()),
            ..MockStorage::default()
        };

        let report = process_document(
            &store,
            &ProcessorConfig::default(),
            &doc,
            "hotel-input-dev",
            "batch.xml",
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.booking_id.as_deref(), Some("B2"));
        assert!(matches!(
            failure.error,
            EtlError::Store {
                kind: StoreErrorKind::AccessDenied,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_compact_output() {
        let doc = document(&[reservation_xml("B1", "H1")]);
        let store = MockStorage::default();
        let config = ProcessorConfig {
            pretty_json: false,
            ..ProcessorConfig::default()
        };

        process_document(&store, &config, &doc, "hotel-input-dev", "a.xml")
            .await
            .unwrap();

        let files = store.files.lock().await;
        let body = files.get("hotel-output-dev/H1/reservation_B1.json").unwrap();
        assert!(!body.contains(&b'\n'));
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["totalPrice"], 80);
        assert_eq!(json["guestDetails"]["comments"], serde_json::json!([null]));
    }
}
