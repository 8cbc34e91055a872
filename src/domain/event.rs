use crate::utils::error::{EtlError, Result};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// S3 object-created 通知 (只保留需要的欄位)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Object {
    pub key: String,
}

/// A decoded `(bucket, key)` pair ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl S3EventRecord {
    pub fn location(&self) -> Result<ObjectLocation> {
        Ok(ObjectLocation {
            bucket: self.s3.bucket.name.clone(),
            key: decode_object_key(&self.s3.object.key)?,
        })
    }
}

impl S3Event {
    pub fn locations(&self) -> Result<Vec<ObjectLocation>> {
        if self.records.is_empty() {
            return Err(EtlError::InvalidEvent {
                message: "notification contains no records".to_string(),
            });
        }

        self.records.iter().map(S3EventRecord::location).collect()
    }
}

/// S3 事件中的 key 以 `+` 代表空白，其餘為 percent-encoding
pub fn decode_object_key(raw: &str) -> Result<String> {
    let bytes = raw.as_bytes();
    if let Some(pos) = bytes.iter().enumerate().position(|(i, &b)| {
        b == b'%'
            && !bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    }) {
        return Err(EtlError::InvalidObjectKey {
            key: raw.to_string(),
            reason: format!("malformed percent escape at byte {}", pos),
        });
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|e| EtlError::InvalidObjectKey {
            key: raw.to_string(),
            reason: e.to_string(),
        })
}
