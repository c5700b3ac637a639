//! Payload classification.
//!
//! Maps decoded payload text to a scan kind via an ordered rule table:
//! - URL scheme prefixes first
//! - then mailto/tel/WIFI scheme prefixes
//! - then a loose email heuristic (contains '@' and '.')
//! - everything else is plain text
//!
//! The order is fixed and observable: a URL containing '@' is still a URL.

use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    Url,
    Email,
    Phone,
    Wifi,
    Text,
}

impl ScanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Url => "url",
            ScanKind::Email => "email",
            ScanKind::Phone => "phone",
            ScanKind::Wifi => "wifi",
            ScanKind::Text => "text",
        }
    }
}

fn is_url(data: &str) -> bool {
    data.starts_with("http://") || data.starts_with("https://")
}

fn is_mailto(data: &str) -> bool {
    data.starts_with("mailto:")
}

fn is_tel(data: &str) -> bool {
    data.starts_with("tel:")
}

fn is_wifi(data: &str) -> bool {
    data.starts_with("WIFI:")
}

fn looks_like_email(data: &str) -> bool {
    data.contains('@') && data.contains('.')
}

// evaluated top to bottom, first match wins
const RULES: &[(fn(&str) -> bool, ScanKind)] = &[
    (is_url, ScanKind::Url),
    (is_mailto, ScanKind::Email),
    (is_tel, ScanKind::Phone),
    (is_wifi, ScanKind::Wifi),
    (looks_like_email, ScanKind::Email),
];

pub fn classify(data: &str) -> ScanKind {
    RULES
        .iter()
        .find(|(matches, _)| matches(data))
        .map(|(_, kind)| *kind)
        .unwrap_or(ScanKind::Text)
}
