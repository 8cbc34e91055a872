use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_range, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_MAX_CONCURRENT_WRITES: usize = 8;
pub const MAX_CONCURRENT_WRITES_LIMIT: usize = 256;

/// How to pick the reservation currency when rate lines disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum CurrencyPolicy {
    /// 取第一筆房價的幣別
    #[default]
    TakeFirst,
    /// 幣別不一致時該筆記錄失敗
    RequireUniform,
}

impl FromStr for CurrencyPolicy {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "take_first" => Ok(CurrencyPolicy::TakeFirst),
            "require_uniform" => Ok(CurrencyPolicy::RequireUniform),
            other => Err(EtlError::InvalidConfigValueError {
                field: "currency_policy".to_string(),
                value: other.to_string(),
                reason: "Expected take_first or require_uniform".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub currency_policy: CurrencyPolicy,
    pub max_concurrent_writes: usize,
    pub pretty_json: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            currency_policy: CurrencyPolicy::TakeFirst,
            max_concurrent_writes: DEFAULT_MAX_CONCURRENT_WRITES,
            pretty_json: true,
        }
    }
}

impl Validate for ProcessorConfig {
    fn validate(&self) -> Result<()> {
        validate_range(
            "processor.max_concurrent_writes",
            self.max_concurrent_writes,
            1,
            MAX_CONCURRENT_WRITES_LIMIT,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub processor: ProcessorConfig,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let config: Self = toml::from_str(&processed_content).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 替換環境變數 (例如 ${MAX_WRITES})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.processor.validate()
    }
}
