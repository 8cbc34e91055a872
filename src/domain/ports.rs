use crate::utils::error::Result;

/// Named byte blobs grouped by bucket.
///
/// Implementations map their native failures onto `EtlError::Store` so the
/// orchestrator can tell `NotFound`, `AccessDenied` and `Throttled` apart.
pub trait BlobStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str)
        -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
