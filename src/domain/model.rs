use crate::utils::error::EtlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomOccupancy {
    pub adults: u32,
    pub children: u32,
}

/// 單一房價 (金額以整數單位計)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLine {
    pub amount: u64,
    /// 只有第一筆一定帶幣別
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestAddress {
    pub street: String,
    pub city: String,
    pub country_code: String,
}

impl GuestAddress {
    /// "street, city, countryCode"
    pub fn joined(&self) -> String {
        [
            self.street.as_str(),
            self.city.as_str(),
            self.country_code.as_str(),
        ]
        .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guest {
    pub first_name: String,
    pub last_name: String,
    pub address: GuestAddress,
}

/// A validated reservation. `total_price` and `currency` are always derived
/// from `rates`, which is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub booking_id: String,
    pub hotel_code: String,
    pub from_date: String,
    pub to_date: String,
    pub room_code: String,
    pub rate_code: String,
    pub occupancy: RoomOccupancy,
    pub guest: Guest,
    pub comments: Option<String>,
    pub rates: Vec<RateLine>,
    pub total_price: u64,
    pub currency: String,
}

impl Reservation {
    pub fn to_output(&self) -> OutputRecord {
        OutputRecord {
            reservation_id: self.booking_id.clone(),
            start_date: self.from_date.clone(),
            end_date: self.to_date.clone(),
            guest_room_id: self.room_code.clone(),
            rate_plan_id: self.rate_code.clone(),
            total_price: self.total_price,
            currency: self.currency.clone(),
            guest_count: GuestCount {
                adults: self.occupancy.adults,
                children: self.occupancy.children,
            },
            guest_details: GuestDetails {
                first_name: self.guest.first_name.clone(),
                last_name: self.guest.last_name.clone(),
                address: self.guest.address.joined(),
                comments: vec![self.comments.clone()],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub reservation_id: String,
    pub start_date: String,
    pub end_date: String,
    pub guest_room_id: String,
    pub rate_plan_id: String,
    pub total_price: u64,
    pub currency: String,
    pub guest_count: GuestCount,
    pub guest_details: GuestDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCount {
    pub adults: u32,
    pub children: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestDetails {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub comments: Vec<Option<String>>,
}

/// Where one output record lands. `bucket` may carry a `/`-separated
/// prefix (e.g. `hotel-output-prod/HTL1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub bucket: String,
    pub key: String,
}

/// Split `root/prefix` into the real bucket and a prefixed key.
pub fn split_bucket_path<'a>(bucket: &'a str, key: &str) -> (&'a str, String) {
    match bucket.split_once('/') {
        Some((root, prefix)) if !prefix.trim_matches('/').is_empty() => {
            (root, format!("{}/{}", prefix.trim_matches('/'), key))
        }
        Some((root, _)) => (root, key.to_string()),
        None => (bucket, key.to_string()),
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    pub index: usize,
    pub booking_id: String,
    pub destination: Destination,
    pub bytes_written: usize,
    pub written_at: DateTime<Utc>,
}

/// 單筆記錄的失敗，不影響同批其他記錄
#[derive(Debug)]
pub struct RecordError {
    pub index: usize,
    pub booking_id: Option<String>,
    pub error: EtlError,
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.booking_id {
            Some(id) => write!(f, "record #{} ({}): {}", self.index, id, self.error),
            None => write!(f, "record #{}: {}", self.index, self.error),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub type RecordOutcome = std::result::Result<WriteReceipt, RecordError>;

#[derive(Debug)]
pub struct BatchReport {
    pub source_bucket: String,
    pub source_key: String,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    pub fn receipts(&self) -> impl Iterator<Item = &WriteReceipt> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn succeeded(&self) -> usize {
        self.receipts().count()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed() == 0
    }
}
