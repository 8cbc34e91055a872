use crate::domain::ports::BlobStore;
use crate::utils::error::{EtlError, Result, StoreErrorKind};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Directory-backed store: `<base_path>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(EtlError::store(
                StoreErrorKind::AccessDenied,
                bucket,
                key,
                "path escapes the storage root",
            ));
        }
        Ok(self.base_path.join(relative))
    }
}

fn map_io_error(err: std::io::Error, bucket: &str, key: &str) -> EtlError {
    let kind = match err.kind() {
        ErrorKind::NotFound => StoreErrorKind::NotFound,
        ErrorKind::PermissionDenied => StoreErrorKind::AccessDenied,
        _ => StoreErrorKind::Other,
    };
    EtlError::store(kind, bucket, key, err.to_string())
}

impl BlobStore for LocalStorage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(bucket, key)?;
        tokio::fs::read(&full_path)
            .await
            .map_err(|e| map_io_error(e, bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let full_path = self.resolve(bucket, key)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(e, bucket, key))?;
        }

        tokio::fs::write(&full_path, data)
            .await
            .map_err(|e| map_io_error(e, bucket, key))?;
        tracing::debug!("Wrote {} ({} bytes, {})", full_path.display(), data.len(), content_type);
        Ok(())
    }
}
