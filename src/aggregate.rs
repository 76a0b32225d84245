//! Country histogram over the download log.

use serde::{
    ser::{SerializeMap, Serializer},
    Serialize,
};

use crate::event::DownloadEvent;

/// Download counts per country, most downloaded first.
///
/// Serializes as a JSON object whose keys follow this order. Countries with
/// equal counts keep the order in which they were first seen in the log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryHistogram(Vec<(String, u64)>);

impl CountryHistogram {
    pub fn entries(&self) -> &[(String, u64)] {
        &self.0
    }

    /// Sum of all buckets.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, n)| n).sum()
    }
}

impl Serialize for CountryHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (country, count) in &self.0 {
            map.serialize_entry(country, count)?;
        }
        map.end()
    }
}

/// Response body for the country summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySummary {
    pub countries: CountryHistogram,
    pub total_downloads: u64,
}

/// Count downloads per country.
pub fn summarize(events: &[DownloadEvent]) -> CountrySummary {
    // Linear lookup keeps first-seen order; the number of countries is small.
    let mut counts: Vec<(String, u64)> = Vec::new();
    for ev in events {
        let country = ev.country_or_unknown();
        match counts.iter_mut().find(|(c, _)| c == country) {
            Some((_, n)) => *n += 1,
            None => counts.push((country.to_string(), 1)),
        }
    }
    // `sort_by` is stable, so ties stay in first-seen order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let countries = CountryHistogram(counts);
    debug_assert_eq!(countries.total(), events.len() as u64);
    CountrySummary {
        countries,
        total_downloads: events.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn count(h: &CountryHistogram, country: &str) -> Option<u64> {
        h.entries().iter().find(|(c, _)| c == country).map(|(_, n)| *n)
    }

    fn ev(country: &str) -> DownloadEvent {
        DownloadEvent {
            time: Utc::now(),
            ip: "127.0.0.1".into(),
            country: country.into(),
        }
    }

    #[test]
    fn empty_log_is_empty_summary() {
        let s = summarize(&[]);
        assert!(s.countries.entries().is_empty());
        assert_eq!(s.total_downloads, 0);
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            serde_json::json!({ "countries": {}, "totalDownloads": 0 })
        );
    }

    #[test]
    fn totals_match_log_length() {
        let events: Vec<_> = ["ES", "MX", "ES", "", "AR", "MX", "ES"]
            .iter()
            .map(|c| ev(c))
            .collect();
        let s = summarize(&events);
        assert_eq!(s.total_downloads, events.len() as u64);
        assert_eq!(s.countries.total(), events.len() as u64);
    }

    #[test]
    fn sorted_descending_with_first_seen_ties() {
        let events: Vec<_> = ["AR", "CL", "ES", "CL", "ES", "ES", "PE"]
            .iter()
            .map(|c| ev(c))
            .collect();
        let s = summarize(&events);
        let order: Vec<_> = s.countries.entries().iter().map(|(c, n)| (c.as_str(), *n)).collect();
        assert_eq!(order, vec![("ES", 3), ("CL", 2), ("AR", 1), ("PE", 1)]);
    }

    #[test]
    fn blank_country_counts_as_unknown() {
        let s = summarize(&[ev(""), ev("UNKNOWN"), ev("ES")]);
        assert_eq!(count(&s.countries, "UNKNOWN"), Some(2));
        assert_eq!(count(&s.countries, "ES"), Some(1));
    }

    #[test]
    fn null_country_counts_as_unknown() {
        let events: Vec<DownloadEvent> = serde_json::from_str(
            r#"[
              {"time":"2025-06-18T09:30:00Z","ip":"1.1.1.1","country":"ES"},
              {"time":"2025-06-18T09:31:00Z","ip":"1.1.1.2","country":null}
            ]"#,
        )
        .unwrap();
        let s = summarize(&events);
        assert_eq!(count(&s.countries, "ES"), Some(1));
        assert_eq!(count(&s.countries, "UNKNOWN"), Some(1));
        assert_eq!(s.total_downloads, 2);
    }

    #[test]
    fn serialized_keys_keep_histogram_order() {
        let s = summarize(&[ev("US"), ev("BR"), ev("BR")]);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"countries":{"BR":2,"US":1},"totalDownloads":3}"#);
    }
}
