use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Named list filters sent as query parameters. Blank values are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    values: BTreeMap<String, String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(term: impl Into<String>) -> Self {
        Self::new().with("search", term)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns true when the filter actually changed.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let value = value.into();
        if self.values.get(&name) == Some(&value) {
            return false;
        }
        self.values.insert(name, value);
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.values.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(|v| v.trim().is_empty())
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Date window of the attendance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttendanceRange {
    #[default]
    ThisMonth,
    LastMonth,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl AttendanceRange {
    pub fn filter_type(&self) -> &'static str {
        match self {
            AttendanceRange::ThisMonth => "thisMonth",
            AttendanceRange::LastMonth => "lastMonth",
            AttendanceRange::Custom { .. } => "custom",
        }
    }

    pub fn apply(&self, filter: &mut Filter) {
        filter.set("filterType", self.filter_type());
        match self {
            AttendanceRange::Custom { start, end } => {
                filter.set("start_date", start.format("%Y-%m-%d").to_string());
                filter.set("end_date", end.format("%Y-%m-%d").to_string());
            }
            _ => {
                filter.remove("start_date");
                filter.remove("end_date");
            }
        }
    }

    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new();
        self.apply(&mut filter);
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_not_sent() {
        let filter = Filter::search("").with("department", "Sales");
        assert_eq!(
            filter.query_pairs(),
            vec![("department".to_string(), "Sales".to_string())]
        );
        assert!(Filter::search("  ").is_empty());
    }

    #[test]
    fn set_reports_changes() {
        let mut filter = Filter::new();
        assert!(filter.set("search", "asha"));
        assert!(!filter.set("search", "asha"));
        assert!(filter.remove("search"));
        assert!(!filter.remove("search"));
    }

    #[test]
    fn custom_range_writes_dates_and_presets_clear_them() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).expect("date");
        let end = NaiveDate::from_ymd_opt(2024, 2, 29).expect("date");
        let mut filter = AttendanceRange::Custom { start, end }.to_filter();
        assert_eq!(filter.get("filterType"), Some("custom"));
        assert_eq!(filter.get("start_date"), Some("2024-02-01"));
        assert_eq!(filter.get("end_date"), Some("2024-02-29"));

        AttendanceRange::LastMonth.apply(&mut filter);
        assert_eq!(filter.get("filterType"), Some("lastMonth"));
        assert_eq!(filter.get("start_date"), None);
    }
}
