//! Release-notes catalog.
//!
//! The catalog is a JSON array edited by hand and only ever read here. Each
//! read re-derives the presentation fields so nothing computed is stored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{error::StoreError, storage::read_document};

/// Releases dated within this many days of now are flagged as new.
pub const NEW_WINDOW_DAYS: i64 = 3;

/// Version reported when the catalog has no entries.
pub const FALLBACK_VERSION: &str = "v0.1.0";
/// Date reported when the catalog has no entries.
pub const FALLBACK_DATE: &str = "2025-01-01";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// One release entry as authored in the catalog document.
///
/// ```json
/// {
///   "id": "v1-2-0",
///   "version": "1.2.0",
///   "date": "2025-06-18",
///   "title": "Summer update",
///   "changes": ["New map", "Bug fixes"]
/// }
/// ```
///
/// Fields beyond `id`, `version` and `date` are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateRecord {
    pub id: String,
    pub version: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A catalog entry with its presentation fields filled in.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DerivedUpdateRecord {
    #[serde(flatten)]
    pub record: UpdateRecord,
    pub is_new: bool,
    pub formatted_date: String,
}

/// Most recent release, as exposed to download pages.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LatestRelease {
    pub version: String,
    pub date: String,
}

/// Read-only handle on the catalog document.
#[derive(Clone)]
pub struct UpdateCatalog {
    path: PathBuf,
}

impl UpdateCatalog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every release in document order.
    ///
    /// The feed degrades instead of failing: a missing document is silently
    /// empty, an unreadable one is logged as a warning and yields nothing, and
    /// an individual entry that does not parse is logged and skipped.
    pub fn load_all(&self) -> Vec<UpdateRecord> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "update catalog not found");
            return Vec::new();
        }
        match read_document::<Value>(&self.path) {
            Ok(entries) => entries
                .into_iter()
                .enumerate()
                .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(path = %self.path.display(), index, error = %e, "skipping unreadable release entry");
                        None
                    }
                })
                .collect(),
            Err(StoreError::Malformed { source, .. }) => {
                warn!(path = %self.path.display(), error = %source, "update catalog is malformed");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "failed to read update catalog");
                Vec::new()
            }
        }
    }
}

/// Release with the greatest date; the earliest listed wins among equal dates.
pub fn latest(records: &[UpdateRecord]) -> LatestRelease {
    records
        .iter()
        .reduce(|best, r| if r.date > best.date { r } else { best })
        .map(|r| LatestRelease {
            version: r.version.clone(),
            date: r.date.format("%Y-%m-%d").to_string(),
        })
        .unwrap_or_else(|| LatestRelease {
            version: FALLBACK_VERSION.to_string(),
            date: FALLBACK_DATE.to_string(),
        })
}

/// Whether `date` (taken at UTC midnight) lies within the "new" window of `now`.
///
/// The distance is rounded up to whole days, in either direction.
pub fn is_recent(date: NaiveDate, now: DateTime<Utc>) -> bool {
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        return false;
    };
    let ms = (now - midnight.and_utc()).num_milliseconds().abs();
    let days = (ms + DAY_MS - 1) / DAY_MS;
    days <= NEW_WINDOW_DAYS
}

/// Long-form date such as `June 18, 2025`.
pub fn format_long(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

pub fn derive(record: &UpdateRecord, now: DateTime<Utc>) -> DerivedUpdateRecord {
    DerivedUpdateRecord {
        record: record.clone(),
        is_new: is_recent(record.date, now),
        formatted_date: format_long(record.date),
    }
}

pub fn derive_all(records: &[UpdateRecord], now: DateTime<Utc>) -> Vec<DerivedUpdateRecord> {
    records.iter().map(|r| derive(r, now)).collect()
}

#[cfg(test)]
pub(crate) fn record(id: &str, version: &str, date: &str) -> UpdateRecord {
    UpdateRecord {
        id: id.into(),
        version: version.into(),
        date: date.parse().unwrap(),
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn latest_of_empty_is_fallback() {
        assert_eq!(
            latest(&[]),
            LatestRelease {
                version: "v0.1.0".into(),
                date: "2025-01-01".into()
            }
        );
    }

    #[test]
    fn latest_picks_max_date() {
        let records = vec![
            record("a", "1.0.0", "2025-06-01"),
            record("b", "1.1.0", "2025-06-18"),
            record("c", "0.9.0", "2025-05-30"),
        ];
        let l = latest(&records);
        assert_eq!(l.version, "1.1.0");
        assert_eq!(l.date, "2025-06-18");
        // input order untouched
        assert_eq!(records[0].id, "a");
    }

    #[test]
    fn latest_tie_prefers_first_listed() {
        let records = vec![
            record("a", "1.0.0", "2025-06-18"),
            record("b", "1.0.1", "2025-06-18"),
        ];
        assert_eq!(latest(&records).version, "1.0.0");
    }

    #[test]
    fn recent_window_is_three_days() {
        let date: NaiveDate = "2025-06-15".parse().unwrap();
        assert!(is_recent(date, at(2025, 6, 18)));
        assert!(!is_recent(date, at(2025, 6, 19)));
        assert!(!is_recent(date, at(2025, 6, 18) + Duration::seconds(1)));
        assert!(is_recent(date, at(2025, 6, 15)));
        // future-dated entries count by absolute distance
        assert!(is_recent(date, at(2025, 6, 12)));
        assert!(!is_recent(date, at(2025, 6, 11)));
    }

    #[test]
    fn derive_adds_presentation_fields() {
        let mut r = record("v1", "1.2.0", "2025-06-18");
        r.extra.insert("title".into(), Value::String("Summer".into()));
        let d = derive(&r, at(2025, 6, 20));
        assert!(d.is_new);
        assert_eq!(d.formatted_date, "June 18, 2025");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["id"], "v1");
        assert_eq!(json["date"], "2025-06-18");
        assert_eq!(json["title"], "Summer");
        assert_eq!(json["isNew"], true);
        assert_eq!(json["formattedDate"], "June 18, 2025");
    }

    #[test]
    fn load_missing_catalog_is_empty() {
        let dir = TempDir::new().unwrap();
        let c = UpdateCatalog::new(dir.path().join("updates.json"));
        assert!(c.load_all().is_empty());
    }

    #[test]
    fn load_malformed_catalog_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updates.json");
        fs::write(&path, r#"[{"id":"x","version":"1","date":"#).unwrap();
        assert!(UpdateCatalog::new(path).load_all().is_empty());
    }

    #[test]
    fn bad_entries_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updates.json");
        fs::write(
            &path,
            r#"[
              {"id":"c","version":"1.2.0","date":"2025-06-20"},
              {"id":"no-version","date":"2025-06-19"},
              {"id":"timestamp","version":"1.1.5","date":"2025-06-18T10:00:00"},
              {"id":"x","version":"1","date":"not-a-date"},
              42,
              {"id":"a","version":"1.0.0","date":"2025-06-01","title":"First"}
            ]"#,
        )
        .unwrap();
        let records = UpdateCatalog::new(path).load_all();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(records[1].extra["title"], "First");
        assert_eq!(latest(&records).version, "1.2.0");
    }

    #[test]
    fn load_preserves_document_order_and_extra_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updates.json");
        fs::write(
            &path,
            r#"[
              {"id":"b","version":"1.1.0","date":"2025-06-18","notes":["fix"]},
              {"id":"a","version":"1.0.0","date":"2025-06-01"}
            ]"#,
        )
        .unwrap();
        let records = UpdateCatalog::new(path).load_all();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "b");
        assert_eq!(records[0].extra["notes"], serde_json::json!(["fix"]));
    }
}
