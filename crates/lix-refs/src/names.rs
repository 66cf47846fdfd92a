//! Version name validation.
//!
//! Valid version names:
//! - Must be non-empty and at most 255 bytes
//! - Must not start or end with whitespace
//! - Must not contain control characters
//! - Must not end with `_all` (reserved for all-versions views)

use crate::error::{VersionError, VersionResult};

const MAX_NAME_LEN: usize = 255;

/// Validate a version name, returning `Ok(())` if valid.
///
/// ```
/// use lix_refs::validate_version_name;
///
/// assert!(validate_version_name("main").is_ok());
/// assert!(validate_version_name("feature/login form").is_ok());
/// assert!(validate_version_name("").is_err());
/// assert!(validate_version_name(" padded").is_err());
/// ```
pub fn validate_version_name(name: &str) -> VersionResult<()> {
    let invalid = |reason: &str| VersionError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("version name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("version name is too long"));
    }
    if name.trim() != name {
        return Err(invalid("must not start or end with whitespace"));
    }
    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(invalid(&format!("contains control character {ch:?}")));
    }
    if name.ends_with("_all") {
        return Err(invalid("must not end with '_all'"));
    }
    Ok(())
}
