//! Download event model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Country bucket used when a request carries no country information.
pub const UNKNOWN_COUNTRY: &str = "UNKNOWN";

/// One recorded download, persisted verbatim in the event log.
///
/// ```json
/// {
///   "time": "2025-06-18T09:30:00.123Z",
///   "ip": "203.0.113.7",
///   "country": "ES"
/// }
/// ```
///
/// The log file may be edited by hand, so `ip` and `country` fall back to
/// empty strings when absent or `null` rather than rejecting the whole document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadEvent {
    /// Moment the download was requested (UTC).
    pub time: DateTime<Utc>,
    /// Requester address as seen by the server or forwarded by a proxy.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ip: String,
    /// ISO country code, or `UNKNOWN`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub country: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl DownloadEvent {
    /// Build an event stamped with the current time.
    pub fn now(ip: impl Into<String>, country: impl Into<String>) -> Self {
        let country = country.into();
        let country = if country.trim().is_empty() {
            UNKNOWN_COUNTRY.to_string()
        } else {
            country
        };
        Self {
            time: Utc::now(),
            ip: ip.into(),
            country,
        }
    }

    /// Country bucket for aggregation; blank values count as `UNKNOWN`.
    pub fn country_or_unknown(&self) -> &str {
        if self.country.is_empty() {
            UNKNOWN_COUNTRY
        } else {
            &self.country
        }
    }
}
