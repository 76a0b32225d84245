//! Page windows over the release feed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{derive, derive_all, DerivedUpdateRecord, UpdateRecord};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 5;

/// Requested page window. Values are taken as given, without clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Build a request from raw query parameters.
    ///
    /// Returns `None` when neither parameter is present, which selects the
    /// unpaginated listing. Missing or non-numeric values fall back to the
    /// defaults.
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Option<Self> {
        if page.is_none() && limit.is_none() {
            return None;
        }
        Some(Self {
            page: parse_or(page, DEFAULT_PAGE),
            limit: parse_or(limit, DEFAULT_LIMIT),
        })
    }
}

fn parse_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_updates: i64,
    pub has_more: bool,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpdatePage {
    pub updates: Vec<DerivedUpdateRecord>,
    pub pagination: Pagination,
}

/// Either the whole feed or one page of it, depending on the request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum UpdateFeed {
    All(Vec<DerivedUpdateRecord>),
    Page(UpdatePage),
}

pub fn feed(records: &[UpdateRecord], req: Option<PageRequest>, now: DateTime<Utc>) -> UpdateFeed {
    match req {
        Some(req) => UpdateFeed::Page(paginate(records, req, now)),
        None => UpdateFeed::All(derive_all(records, now)),
    }
}

/// Select the window `[(page-1)*limit, page*limit)` of `records`.
pub fn paginate(records: &[UpdateRecord], req: PageRequest, now: DateTime<Utc>) -> UpdatePage {
    let total = records.len() as i64;
    let start = req.page.saturating_sub(1).saturating_mul(req.limit);
    let end = start.saturating_add(req.limit);
    let (from, to) = (resolve_index(start, total), resolve_index(end, total));
    let updates = if from < to {
        records[from..to].iter().map(|r| derive(r, now)).collect()
    } else {
        Vec::new()
    };
    let total_pages = ceil_div(total, req.limit);
    UpdatePage {
        updates,
        pagination: Pagination {
            current_page: req.page,
            total_pages,
            total_updates: total,
            has_more: end < total,
            limit: req.limit,
        },
    }
}

/// `ceil(total / limit)` for any sign of `limit`; 0 when `limit` is 0.
fn ceil_div(total: i64, limit: i64) -> i64 {
    if limit == 0 {
        return 0;
    }
    let (q, r) = (total / limit, total % limit);
    if r != 0 && (r > 0) == (limit > 0) {
        q + 1
    } else {
        q
    }
}

/// Map a possibly negative offset onto `0..=len`; negatives count from the end.
fn resolve_index(idx: i64, len: i64) -> usize {
    let resolved = if idx < 0 { (len + idx).max(0) } else { idx.min(len) };
    resolved as usize
}

/// Find a release by exact id.
pub fn lookup_by_id(
    records: &[UpdateRecord],
    id: &str,
    now: DateTime<Utc>,
) -> Option<DerivedUpdateRecord> {
    records.iter().find(|r| r.id == id).map(|r| derive(r, now))
}
