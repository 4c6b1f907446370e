//! Format detection for string values
//!
//! Detection runs in a fixed precedence order: date-time, then UUID, then
//! email, then URL. The first matching pattern wins, so a value that would
//! satisfy several patterns is always classified the same way.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Detected string format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueFormat {
    /// ISO 8601 date-time (YYYY-MM-DDTHH:MM:SS with optional fraction/offset)
    DateTime,
    /// UUID/GUID
    Uuid,
    /// Email address
    Email,
    /// HTTP(S)/FTP URL
    Url,
}

impl std::fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueFormat::DateTime => write!(f, "date-time"),
            ValueFormat::Uuid => write!(f, "uuid"),
            ValueFormat::Email => write!(f, "email"),
            ValueFormat::Url => write!(f, "url"),
        }
    }
}

static DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$").unwrap()
});

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?|ftp)://[^\s/$.?#].[^\s]*$").unwrap());

/// Detect the format of a string value, if any.
///
/// Empty and whitespace-only strings never match.
pub fn detect_format(value: &str) -> Option<ValueFormat> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if DATETIME_REGEX.is_match(value) {
        return Some(ValueFormat::DateTime);
    }
    if UUID_REGEX.is_match(value) {
        return Some(ValueFormat::Uuid);
    }
    if EMAIL_REGEX.is_match(value) {
        return Some(ValueFormat::Email);
    }
    if URL_REGEX.is_match(value) {
        return Some(ValueFormat::Url);
    }

    None
}
