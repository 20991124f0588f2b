//! Session identifiers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one end-to-end pipeline run.
///
/// The canonical form is a second-resolution timestamp, `YYYYMMDD_HHMMSS`.
/// When two sessions are minted within the same second, a `_NN` suffix
/// disambiguates (`20250101_120000_02`). Identifiers sort lexicographically
/// in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Format a timestamp into a base (suffix-free) session id.
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        Self(ts.format("%Y%m%d_%H%M%S").to_string())
    }

    /// Current time, second resolution, no disambiguating suffix.
    pub fn now() -> Self {
        Self::from_timestamp(Utc::now())
    }

    /// Append a same-second disambiguating suffix (`_02`, `_03`, ...).
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}_{:02}", self.0, n))
    }

    /// Parse an existing identifier, validating its shape.
    pub fn parse(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        if is_valid_session_id(&s) {
            Some(Self(s))
        } else {
            None
        }
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base timestamp portion, without any disambiguating suffix.
    pub fn base(&self) -> &str {
        &self.0[..15.min(self.0.len())]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `YYYYMMDD_HHMMSS` with an optional `_NN` suffix.
fn is_valid_session_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 15 && bytes.len() != 18 {
        return false;
    }
    for (i, b) in bytes.iter().enumerate() {
        match i {
            8 | 15 => {
                if *b != b'_' {
                    return false;
                }
            }
            _ => {
                if !b.is_ascii_digit() {
                    return false;
                }
            }
        }
    }
    true
}
