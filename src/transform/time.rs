//! Date and time merging.
//!
//! Source tables store the calendar date and the time of day in separate
//! columns, and several dependent times (registration, end of visit, lab
//! result) only carry a time of day. Those are anchored on a reference
//! timestamp and pushed to the next calendar day when they would otherwise
//! precede it.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Accepted formats for date, time and combined timestamp strings
#[derive(Debug, Clone)]
pub struct TimeMerger {
    /// Formats tried, in order, for date-only strings
    pub date_formats: Vec<String>,
    /// Formats tried, in order, for time-of-day strings
    pub time_formats: Vec<String>,
    /// Formats tried, in order, for full timestamps
    pub datetime_formats: Vec<String>,
}

impl Default for TimeMerger {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y-%m-%d".to_string(), // ISO: 2022-01-15
                "%Y%m%d".to_string(),   // Compact: 20220115
                "%d-%m-%Y".to_string(), // Dutch: 15-01-2022
                "%Y/%m/%d".to_string(),
                "%d/%m/%Y".to_string(),
            ],
            time_formats: vec!["%H:%M:%S".to_string(), "%H:%M".to_string()],
            datetime_formats: vec![
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y-%m-%d %H:%M:%S%.f".to_string(),
                "%Y-%m-%d %H:%M".to_string(),
                "%d-%m-%Y %H:%M:%S".to_string(),
                "%d-%m-%Y %H:%M".to_string(),
            ],
        }
    }
}

impl TimeMerger {
    /// Create a merger with the default hospital formats
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a date string, also accepting a full timestamp (its date part is used)
    #[must_use]
    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        self.date_formats
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
            .or_else(|| self.parse_datetime(s).map(|dt| dt.date()))
    }

    /// Parse a time-of-day string
    #[must_use]
    pub fn parse_time(&self, raw: &str) -> Option<NaiveTime> {
        let s = raw.trim();
        self.time_formats
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
    }

    /// Parse a full timestamp string
    #[must_use]
    pub fn parse_datetime(&self, raw: &str) -> Option<NaiveDateTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        self.datetime_formats
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
            .or_else(|| {
                // A bare date is midnight of that day
                self.date_formats
                    .iter()
                    .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
    }

    /// Combine a date and a same-day time of day into one timestamp
    ///
    /// Returns `None` when either part is absent or malformed.
    #[must_use]
    pub fn merge(&self, date: Option<&str>, time: Option<&str>) -> Option<NaiveDateTime> {
        let date = self.parse_date(date?)?;
        let time = self.parse_time(time?)?;
        Some(date.and_time(time))
    }

    /// Anchor a dependent time of day on a reference timestamp
    ///
    /// The time is placed on the reference's calendar day; when that lands
    /// strictly before the reference it happened on the following day.
    #[must_use]
    pub fn resolve_after(&self, reference: NaiveDateTime, time: Option<&str>) -> Option<NaiveDateTime> {
        let time = self.parse_time(time?)?;
        let naive = reference.date().and_time(time);

        if naive < reference {
            Some(naive + Duration::days(1))
        } else {
            Some(naive)
        }
    }

    /// Anchor several dependent times on the same reference, each independently
    #[must_use]
    pub fn resolve_all_after(
        &self,
        reference: NaiveDateTime,
        times: &[Option<&str>],
    ) -> Vec<Option<NaiveDateTime>> {
        times
            .iter()
            .map(|time| self.resolve_after(reference, *time))
            .collect()
    }
}
