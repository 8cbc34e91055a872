use crate::utils::error::{EtlError, Result};

pub const SUPPORTED_EXTENSION: &str = "xml";

/// Lowercased text after the last `.` of the key, which may be empty
/// (`"booking."`) or contain `/` (`"v1.2/booking"`).
pub fn classify(key: &str) -> Result<String> {
    key.rfind('.')
        .map(|idx| key[idx + 1..].to_lowercase())
        .ok_or_else(|| EtlError::NoExtension {
            key: key.to_string(),
        })
}

/// 只接受 `.xml`
pub fn ensure_supported(key: &str) -> Result<()> {
    let file_type = classify(key)?;
    if file_type != SUPPORTED_EXTENSION {
        return Err(EtlError::UnsupportedType { file_type });
    }
    Ok(())
}
