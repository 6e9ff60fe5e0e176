use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointRecord;
use crate::dates::is_upcoming;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Upcoming,
}

/// Client-side narrowing applied before records reach the map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub mode: FilterMode,
    #[serde(default)]
    pub search: Option<String>,
}

impl RecordFilter {
    pub fn upcoming() -> Self {
        Self {
            mode: FilterMode::Upcoming,
            search: None,
        }
    }

    pub fn matches(&self, record: &CheckpointRecord, today: NaiveDate) -> bool {
        if self.mode == FilterMode::Upcoming && !is_upcoming(record.date.as_deref(), today) {
            return false;
        }

        let Some(query) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
        else {
            return true;
        };
        let query = query.to_lowercase();
        let contains = |field: Option<&str>| {
            field.is_some_and(|value| value.to_lowercase().contains(&query))
        };

        contains(record.city.as_deref())
            || contains(record.county.as_deref())
            || contains(Some(record.location.as_str()))
    }

    /// Matching records ordered by date text, undated records last.
    pub fn apply<'a>(
        &self,
        records: &'a [CheckpointRecord],
        today: NaiveDate,
    ) -> Vec<&'a CheckpointRecord> {
        let mut matched: Vec<&CheckpointRecord> = records
            .iter()
            .filter(|record| self.matches(record, today))
            .collect();
        matched.sort_by(|a, b| compare_dates(a.date.as_deref(), b.date.as_deref()));
        matched
    }
}

fn compare_dates(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{FilterMode, RecordFilter};
    use crate::checkpoint::CheckpointRecord;

    fn record(id: &str, city: Option<&str>, county: Option<&str>, date: Option<&str>) -> CheckpointRecord {
        CheckpointRecord {
            id: id.to_string(),
            state: "CA".to_string(),
            city: city.map(str::to_string),
            county: county.map(str::to_string),
            date: date.map(str::to_string),
            location: "Main St".to_string(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
    }

    #[test]
    fn upcoming_mode_drops_past_and_undated_records() {
        let records = vec![
            record("1", Some("Fresno"), None, Some("2025-01-01")),
            record("2", None, Some("Alameda"), Some("2099-01-01")),
            record("3", Some("Lincoln"), None, None),
            record("4", Some("Vacaville"), None, Some("2025-06-01")),
        ];

        let ids: Vec<&str> = RecordFilter::upcoming()
            .apply(&records, today())
            .into_iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["4", "2"]);
    }

    #[test]
    fn search_matches_city_county_or_location_case_insensitively() {
        let mut by_location = record("3", None, None, None);
        by_location.location = "Near FRESNO fairgrounds".to_string();
        let records = vec![
            record("1", Some("Fresno"), None, None),
            record("2", None, Some("fresno county"), None),
            by_location,
            record("4", Some("Oceanside"), Some("San diego"), None),
        ];
        let filter = RecordFilter {
            mode: FilterMode::All,
            search: Some("  Fresno ".to_string()),
        };

        let mut ids: Vec<&str> = filter
            .apply(&records, today())
            .into_iter()
            .map(|r| r.id.as_str())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn undated_records_sort_last() {
        let records = vec![
            record("a", None, None, None),
            record("b", None, None, Some("2025-03-01")),
            record("c", None, None, Some("2025-02-01")),
        ];
        let ids: Vec<&str> = RecordFilter::default()
            .apply(&records, today())
            .into_iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn filter_mode_deserializes_lowercase() {
        let filter: RecordFilter =
            serde_json::from_str(r#"{"mode":"upcoming","search":"oak"}"#).expect("valid filter");
        assert_eq!(filter.mode, FilterMode::Upcoming);
        assert_eq!(filter.search.as_deref(), Some("oak"));
    }
}
