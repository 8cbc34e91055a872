use crate::config::toml_config::ProcessorConfig;
use crate::core::{batch, extension, xml_tree};
use crate::domain::event::{ObjectLocation, S3Event};
use crate::domain::model::BatchReport;
use crate::domain::ports::BlobStore;
use crate::utils::error::Result;

/// Entry point shared by the CLI and the Lambda handler. Build it once and
/// reuse it for every event.
pub struct EtlEngine<S: BlobStore> {
    store: S,
    config: ProcessorConfig,
}

impl<S: BlobStore> EtlEngine<S> {
    pub fn new(store: S, config: ProcessorConfig) -> Self {
        Self { store, config }
    }

    /// Process every object named by the notification, in order. A
    /// batch-fatal failure stops at that object.
    pub async fn handle_event(&self, event: &S3Event) -> Result<Vec<BatchReport>> {
        let locations = event.locations()?;
        let mut reports = Vec::with_capacity(locations.len());

        for location in &locations {
            reports.push(self.process_object(location).await?);
        }

        Ok(reports)
    }

    /// Classify, download, decode and fan out one source document.
    pub async fn process_object(&self, location: &ObjectLocation) -> Result<BatchReport> {
        let ObjectLocation { bucket, key } = location;
        tracing::info!("srcBucket: {}, srcKey: {}", bucket, key);

        let result: Result<BatchReport> = async {
            extension::ensure_supported(key)?;

            let body = self.store.get(bucket, key).await?;
            tracing::debug!("Downloaded {} bytes from {}/{}", body.len(), bucket, key);

            let document = xml_tree::decode(&body)?;
            batch::process_document(&self.store, &self.config, &document, bucket, key).await
        }
        .await;

        if let Err(e) = &result {
            tracing::error!(
                bucket = bucket.as_str(),
                key = key.as_str(),
                "❌ Unable to process: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
        }

        result
    }
}
