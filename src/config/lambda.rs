use crate::config::toml_config::{ProcessorConfig, TomlConfig};
use crate::domain::model::split_bucket_path;
use crate::domain::ports::BlobStore;
use crate::utils::error::{EtlError, Result, StoreErrorKind};
use crate::utils::validation::{validate_aws_region, validate_url, Validate};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

const DEFAULT_REGION: &str = "ap-southeast-2";

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub s3_region: String,
    /// 本地 S3 模擬器 (會強制 path-style)
    pub s3_endpoint: Option<String>,
    pub processor: ProcessorConfig,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut processor = match lookup("RESERVATION_CONFIG") {
            Some(path) => TomlConfig::from_file(path)?.processor,
            None => ProcessorConfig::default(),
        };

        if let Some(policy) = lookup("CURRENCY_POLICY") {
            processor.currency_policy = policy.parse()?;
        }
        if let Some(raw) = lookup("MAX_CONCURRENT_WRITES") {
            processor.max_concurrent_writes =
                raw.trim()
                    .parse()
                    .map_err(|_| EtlError::InvalidConfigValueError {
                        field: "MAX_CONCURRENT_WRITES".to_string(),
                        value: raw.clone(),
                        reason: "Expected a positive integer".to_string(),
                    })?;
        }
        if let Some(raw) = lookup("PRETTY_JSON") {
            processor.pretty_json =
                raw.trim()
                    .parse()
                    .map_err(|_| EtlError::InvalidConfigValueError {
                        field: "PRETTY_JSON".to_string(),
                        value: raw.clone(),
                        reason: "Expected true or false".to_string(),
                    })?;
        }

        let config = Self {
            s3_region: lookup("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            s3_endpoint: lookup("S3_ENDPOINT").filter(|e| !e.trim().is_empty()),
            processor,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the S3 client once; callers share it across invocations.
    pub async fn s3_client(&self) -> S3Client {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).region(Region::new(self.s3_region.clone()));

        if let Some(endpoint) = &self.s3_endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        S3Client::from_conf(builder.build())
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        validate_aws_region("s3_region", &self.s3_region)?;

        if let Some(endpoint) = &self.s3_endpoint {
            validate_url("s3_endpoint", endpoint)?;
        }

        self.processor.validate()?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

/// 依 S3 錯誤碼分類
pub fn store_error_kind(code: Option<&str>) -> StoreErrorKind {
    match code {
        Some("NoSuchKey") | Some("NoSuchBucket") | Some("NotFound") => StoreErrorKind::NotFound,
        Some("AccessDenied")
        | Some("AllAccessDisabled")
        | Some("InvalidAccessKeyId")
        | Some("SignatureDoesNotMatch") => StoreErrorKind::AccessDenied,
        Some(code)
            if code == "SlowDown"
                || code == "RequestLimitExceeded"
                || code.starts_with("Throttl") =>
        {
            StoreErrorKind::Throttled
        }
        _ => StoreErrorKind::Other,
    }
}

#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
}

impl S3Storage {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

impl BlobStore for S3Storage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let kind = match e.as_service_error() {
                    Some(GetObjectError::NoSuchKey(_)) => StoreErrorKind::NotFound,
                    _ => store_error_kind(e.code()),
                };
                EtlError::store(kind, bucket, key, DisplayErrorContext(&e).to_string())
            })?;

        let data = resp.body.collect().await.map_err(|e| {
            EtlError::store(
                StoreErrorKind::Other,
                bucket,
                key,
                format!("Failed to collect S3 data: {}", e),
            )
        })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        // "hotel-output-prod/HTL1" 需拆成 bucket 與 key 前綴
        let (real_bucket, full_key) = split_bucket_path(bucket, key);

        self.client
            .put_object()
            .bucket(real_bucket)
            .key(&full_key)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                EtlError::store(
                    store_error_kind(e.code()),
                    real_bucket,
                    full_key.as_str(),
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::CurrencyPolicy;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_lambda_config_defaults() {
        let config = LambdaConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.s3_region, DEFAULT_REGION);
        assert_eq!(config.s3_endpoint, None);
        assert_eq!(config.processor, ProcessorConfig::default());
    }

    #[test]
    fn test_lambda_config_overrides() {
        let config = LambdaConfig::from_lookup(lookup(&[
            ("S3_REGION", "us-east-1"),
            ("S3_ENDPOINT", "http://localhost:4566"),
            ("CURRENCY_POLICY", "require_uniform"),
            ("MAX_CONCURRENT_WRITES", "32"),
            ("PRETTY_JSON", "false"),
        ]))
        .unwrap();

        assert_eq!(config.s3_region, "us-east-1");
        assert_eq!(config.s3_endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.processor.currency_policy, CurrencyPolicy::RequireUniform);
        assert_eq!(config.processor.max_concurrent_writes, 32);
        assert!(!config.processor.pretty_json);
    }

    #[test]
    fn test_lambda_config_rejects_bad_values() {
        assert!(LambdaConfig::from_lookup(lookup(&[("MAX_CONCURRENT_WRITES", "many")])).is_err());
        assert!(LambdaConfig::from_lookup(lookup(&[("S3_ENDPOINT", "localhost")])).is_err());
        assert!(LambdaConfig::from_lookup(lookup(&[("S3_REGION", "Mars_1")])).is_err());
    }

    #[test]
    fn test_store_error_kind() {
        assert_eq!(store_error_kind(Some("NoSuchKey")), StoreErrorKind::NotFound);
        assert_eq!(store_error_kind(Some("AccessDenied")), StoreErrorKind::AccessDenied);
        assert_eq!(store_error_kind(Some("SlowDown")), StoreErrorKind::Throttled);
        assert_eq!(store_error_kind(Some("ThrottlingException")), StoreErrorKind::Throttled);
        assert_eq!(store_error_kind(Some("InternalError")), StoreErrorKind::Other);
        assert_eq!(store_error_kind(None), StoreErrorKind::Other);
    }
}
