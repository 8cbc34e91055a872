use std::fmt;
use thiserror::Error;

/// 存儲層錯誤種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    AccessDenied,
    Throttled,
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorKind::NotFound => "not found",
            StoreErrorKind::AccessDenied => "access denied",
            StoreErrorKind::Throttled => "throttled",
            StoreErrorKind::Other => "store failure",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Could not determine the file type of object key: {key}")]
    NoExtension { key: String },

    #[error("Unsupported file type: {file_type}")]
    UnsupportedType { file_type: String },

    #[error("Invalid object key '{key}': {reason}")]
    InvalidObjectKey { key: String, reason: String },

    #[error("Invalid trigger event: {message}")]
    InvalidEvent { message: String },

    #[error("Malformed XML: {message}")]
    MalformedXml { message: String },

    #[error("Missing required field: {path}")]
    MissingField { path: String },

    #[error("Field {path} has the wrong shape: expected {expected}, found {found}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field {path} must not be empty")]
    EmptyField { path: String },

    #[error("Invalid amount: {value}")]
    InvalidAmount { value: String },

    #[error("Invalid integer at {path}: {value}")]
    InvalidInteger { path: String, value: String },

    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    #[error("Reservation has {count} room stays, exactly one is supported")]
    MultipleRoomStays { count: usize },

    #[error("Store {kind} for {bucket}/{key}: {message}")]
    Store {
        kind: StoreErrorKind,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Parse,
    Mapping,
    Storage,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn store(
        kind: StoreErrorKind,
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        EtlError::Store {
            kind,
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::NoExtension { .. }
            | EtlError::UnsupportedType { .. }
            | EtlError::InvalidObjectKey { .. }
            | EtlError::InvalidEvent { .. } => ErrorCategory::Input,
            EtlError::MalformedXml { .. } => ErrorCategory::Parse,
            EtlError::MissingField { .. }
            | EtlError::WrongType { .. }
            | EtlError::EmptyField { .. }
            | EtlError::InvalidAmount { .. }
            | EtlError::InvalidInteger { .. }
            | EtlError::CurrencyMismatch { .. }
            | EtlError::MultipleRoomStays { .. } => ErrorCategory::Mapping,
            EtlError::Store { .. } => ErrorCategory::Storage,
            EtlError::ConfigError { .. } | EtlError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            EtlError::IoError(_) | EtlError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::Store {
                kind: StoreErrorKind::Throttled,
                ..
            } => ErrorSeverity::Medium,
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::IoError(_)
            | EtlError::SerializationError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 可重試的錯誤 (只有存儲端的暫時性錯誤)
    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::NoExtension { .. } | EtlError::UnsupportedType { .. } => {
                "Only .xml reservation documents are processed; check the upload key"
            }
            EtlError::InvalidObjectKey { .. } | EtlError::InvalidEvent { .. } => {
                "Check the notification payload delivered by the bucket trigger"
            }
            EtlError::MalformedXml { .. } => "Validate the document with an XML linter and re-upload it",
            EtlError::MissingField { .. }
            | EtlError::WrongType { .. }
            | EtlError::EmptyField { .. }
            | EtlError::InvalidAmount { .. }
            | EtlError::InvalidInteger { .. }
            | EtlError::MultipleRoomStays { .. } => {
                "Fix the reservation record in the source document and re-upload it"
            }
            EtlError::CurrencyMismatch { .. } => {
                "Split rates by currency or switch currency_policy to take_first"
            }
            EtlError::Store { kind, .. } => match kind {
                StoreErrorKind::NotFound => "Verify the bucket and object key exist",
                StoreErrorKind::AccessDenied => "Grant the function read/write access to both buckets",
                StoreErrorKind::Throttled => "Retry later or reduce max_concurrent_writes",
                StoreErrorKind::Other => "Inspect the store error message and retry",
            },
            EtlError::ConfigError { .. } | EtlError::InvalidConfigValueError { .. } => {
                "Review the configuration file and environment variables"
            }
            EtlError::IoError(_) | EtlError::SerializationError(_) => {
                "Check local disk permissions and available space"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Input rejected: {}", self),
            ErrorCategory::Parse => format!("Document could not be parsed: {}", self),
            ErrorCategory::Mapping => format!("Reservation record is invalid: {}", self),
            ErrorCategory::Storage => format!("Storage operation failed: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
