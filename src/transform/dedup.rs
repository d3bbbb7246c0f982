//! Keep the most recent observation per (patient, metric).

use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;

/// A timestamped observation of one metric for one patient
pub trait Observation {
    fn patient_id(&self) -> &str;
    fn metric(&self) -> &str;
    /// Time used to order observations; `None` sorts before every timestamp
    fn observed_at(&self) -> Option<NaiveDateTime>;
}

/// Collapse each (patient, metric) group to its latest observation
///
/// Observations are stably sorted by time and the last one of each group
/// wins, so identical timestamps resolve to the row that came last in the
/// input. Output is ordered by patient, then metric.
pub fn latest_per_group<T: Observation>(mut observations: Vec<T>) -> Vec<T> {
    observations.sort_by_key(|obs| obs.observed_at());

    let mut latest: FxHashMap<(String, String), T> = FxHashMap::default();
    for obs in observations {
        latest.insert((obs.patient_id().to_string(), obs.metric().to_string()), obs);
    }

    let mut groups: Vec<((String, String), T)> = latest.into_iter().collect();
    groups.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
    groups.into_iter().map(|(_, obs)| obs).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[derive(Debug, Clone, PartialEq)]
    struct Reading {
        patient: &'static str,
        metric: &'static str,
        at: Option<NaiveDateTime>,
        value: f64,
    }

    impl Observation for Reading {
        fn patient_id(&self) -> &str {
            self.patient
        }
        fn metric(&self) -> &str {
            self.metric
        }
        fn observed_at(&self) -> Option<NaiveDateTime> {
            self.at
        }
    }

    fn at(hour: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2022, 5, 1).and_then(|d| d.and_hms_opt(hour, 0, 0))
    }

    fn reading(patient: &'static str, metric: &'static str, hour: u32, value: f64) -> Reading {
        Reading {
            patient,
            metric,
            at: at(hour),
            value,
        }
    }

    #[test]
    fn test_latest_reading_wins() {
        let readings = vec![
            reading("7", "HR", 10, 80.0),
            reading("7", "HR", 12, 95.0),
            reading("7", "HR", 8, 70.0),
            reading("7", "Temp", 9, 37.0),
        ];

        let latest = latest_per_group(readings);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].metric, "HR");
        assert_eq!(latest[0].value, 95.0);
        assert_eq!(latest[1].metric, "Temp");
    }

    #[test]
    fn test_ties_resolve_to_last_input_row() {
        let readings = vec![reading("1", "HR", 10, 1.0), reading("1", "HR", 10, 2.0)];
        assert_eq!(latest_per_group(readings)[0].value, 2.0);
    }

    #[test]
    fn test_untimed_readings_sort_first() {
        let mut untimed = reading("1", "HR", 0, 1.0);
        untimed.at = None;
        let readings = vec![reading("1", "HR", 3, 2.0), untimed];

        assert_eq!(latest_per_group(readings)[0].value, 2.0);
    }
}
