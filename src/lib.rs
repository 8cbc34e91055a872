pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

pub use config::toml_config::{CurrencyPolicy, ProcessorConfig, TomlConfig};
pub use core::etl::EtlEngine;
pub use domain::event::{ObjectLocation, S3Event};
pub use domain::model::{BatchReport, OutputRecord, RecordError, WriteReceipt};
pub use domain::ports::BlobStore;
pub use utils::error::{EtlError, Result};
