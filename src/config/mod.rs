pub mod cli;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::toml_config::{CurrencyPolicy, ProcessorConfig, TomlConfig};
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{
    validate_bucket_name, validate_non_empty_string, validate_path, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "reservation-etl")]
#[command(about = "Split an XML reservation batch into per-reservation JSON records")]
pub struct CliConfig {
    #[arg(long, default_value = "./data", help = "Directory holding one sub-directory per bucket")]
    pub storage_root: String,

    #[arg(long, help = "Source bucket name, e.g. hotel-input-dev")]
    pub bucket: String,

    #[arg(long, help = "Object key of the XML document inside the bucket")]
    pub key: String,

    #[arg(long, help = "TOML file with a [processor] section")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub currency_policy: Option<CurrencyPolicy>,

    #[arg(long)]
    pub max_concurrent_writes: Option<usize>,

    #[arg(long, help = "Write compact JSON instead of pretty-printed")]
    pub compact: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 先讀 TOML，再以命令列參數覆蓋
    pub fn processor_config(&self) -> Result<ProcessorConfig> {
        let mut processor = match &self.config {
            Some(path) => TomlConfig::from_file(path)?.processor,
            None => ProcessorConfig::default(),
        };

        if let Some(policy) = self.currency_policy {
            processor.currency_policy = policy;
        }
        if let Some(limit) = self.max_concurrent_writes {
            processor.max_concurrent_writes = limit;
        }
        if self.compact {
            processor.pretty_json = false;
        }

        processor.validate()?;
        Ok(processor)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("storage_root", &self.storage_root)?;
        validate_bucket_name("bucket", &self.bucket)?;
        validate_non_empty_string("key", &self.key)?;
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;

    #[test]
    fn test_cli_overrides() {
        let config = CliConfig::parse_from([
            "reservation-etl",
            "--bucket",
            "hotel-input-dev",
            "--key",
            "batch.xml",
            "--currency-policy",
            "require-uniform",
            "--max-concurrent-writes",
            "4",
            "--compact",
        ]);

        assert!(config.validate().is_ok());
        let processor = config.processor_config().unwrap();
        assert_eq!(processor.currency_policy, CurrencyPolicy::RequireUniform);
        assert_eq!(processor.max_concurrent_writes, 4);
        assert!(!processor.pretty_json);
    }

    #[test]
    fn test_cli_rejects_invalid_bucket() {
        let config = CliConfig::parse_from([
            "reservation-etl",
            "--bucket",
            "Hotel_Input",
            "--key",
            "batch.xml",
        ]);
        assert!(matches!(
            config.validate(),
            Err(EtlError::InvalidConfigValueError { field, .. }) if field == "bucket"
        ));
    }

    #[test]
    fn test_cli_rejects_invalid_limit() {
        let config = CliConfig::parse_from([
            "reservation-etl",
            "--bucket",
            "b",
            "--key",
            "k.xml",
            "--max-concurrent-writes",
            "0",
        ]);
        assert!(config.processor_config().is_err());
    }
}
