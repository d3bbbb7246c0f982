//! Cleaned long-format rows written by the training pipelines.

use arrow::datatypes::{DataType, Field, Schema};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::arrow::ArrowRow;

/// Textual timestamp layout of every output file
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Serde adapter writing optional timestamps as [`TIMESTAMP_FORMAT`] text
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_some(&ts.format(TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| NaiveDateTime::parse_from_str(&t, TIMESTAMP_FORMAT))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

/// One cleaned and scaled lab result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabObservation {
    #[serde(rename = "SEHID")]
    pub visit_id: Option<String>,
    #[serde(rename = "PATIENTNR")]
    pub patient_id: String,
    #[serde(rename = "BEPCODE")]
    pub code: String,
    /// Canonical label
    #[serde(rename = "DESC")]
    pub label: String,
    #[serde(rename = "UITSLAG")]
    pub value: Option<f64>,
    #[serde(rename = "AANKOMST_TIJDSTIP", with = "timestamp")]
    pub arrival: Option<NaiveDateTime>,
    #[serde(rename = "AFNAME_TIJDSTIP", with = "timestamp")]
    pub drawn: Option<NaiveDateTime>,
    #[serde(rename = "UITSLAG_TIJDSTIP", with = "timestamp")]
    pub reported: Option<NaiveDateTime>,
}

/// One cleaned and scaled vital sign reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalObservation {
    #[serde(rename = "PATIENTNR")]
    pub patient_id: String,
    /// Canonical label
    #[serde(rename = "LABEL")]
    pub label: String,
    #[serde(rename = "Value1")]
    pub value: f64,
    #[serde(rename = "DateTime", with = "timestamp")]
    pub recorded_at: Option<NaiveDateTime>,
    #[serde(rename = "AANKOMST", with = "timestamp")]
    pub arrival: Option<NaiveDateTime>,
}

/// Resolved timestamps of one visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitTimes {
    #[serde(rename = "SEHID")]
    pub visit_id: String,
    #[serde(rename = "AANKOMST", with = "timestamp")]
    pub arrival: Option<NaiveDateTime>,
    #[serde(rename = "TRIAGE", with = "timestamp")]
    pub triage: Option<NaiveDateTime>,
    #[serde(rename = "REGISTRATIE", with = "timestamp")]
    pub registration: Option<NaiveDateTime>,
    #[serde(rename = "EIND", with = "timestamp")]
    pub end: Option<NaiveDateTime>,
}

/// One normalized radiology report with its visit outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiologyReport {
    #[serde(rename = "SEHID")]
    pub visit_id: Option<String>,
    #[serde(rename = "PATIENTNR")]
    pub patient_id: Option<String>,
    #[serde(rename = "AANKOMST", with = "timestamp")]
    pub arrival: Option<NaiveDateTime>,
    #[serde(rename = "ACCORD", with = "timestamp")]
    pub accorded: Option<NaiveDateTime>,
    /// Space-joined normalized tokens
    #[serde(rename = "RAD_REPORT")]
    pub report: String,
    /// Admission target, absent in transform-only runs
    #[serde(rename = "OPNAME")]
    pub admitted: Option<u8>,
}

fn text(name: &str, nullable: bool) -> Field {
    Field::new(name, DataType::Utf8, nullable)
}

/// Timestamps are written as [`TIMESTAMP_FORMAT`] text
fn timestamp_field(name: &str) -> Field {
    text(name, true)
}

impl ArrowRow for LabObservation {
    fn schema() -> Schema {
        Schema::new(vec![
            text("SEHID", true),
            text("PATIENTNR", false),
            text("BEPCODE", false),
            text("DESC", false),
            Field::new("UITSLAG", DataType::Float64, true),
            timestamp_field("AANKOMST_TIJDSTIP"),
            timestamp_field("AFNAME_TIJDSTIP"),
            timestamp_field("UITSLAG_TIJDSTIP"),
        ])
    }
}

impl ArrowRow for VitalObservation {
    fn schema() -> Schema {
        Schema::new(vec![
            text("PATIENTNR", false),
            text("LABEL", false),
            Field::new("Value1", DataType::Float64, false),
            timestamp_field("DateTime"),
            timestamp_field("AANKOMST"),
        ])
    }
}

impl ArrowRow for VisitTimes {
    fn schema() -> Schema {
        Schema::new(vec![
            text("SEHID", false),
            timestamp_field("AANKOMST"),
            timestamp_field("TRIAGE"),
            timestamp_field("REGISTRATIE"),
            timestamp_field("EIND"),
        ])
    }
}

impl ArrowRow for RadiologyReport {
    fn schema() -> Schema {
        Schema::new(vec![
            text("SEHID", true),
            text("PATIENTNR", true),
            timestamp_field("AANKOMST"),
            timestamp_field("ACCORD"),
            text("RAD_REPORT", false),
            Field::new("OPNAME", DataType::UInt8, true),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_timestamps_serialize_as_text() {
        let times = VisitTimes {
            visit_id: "S1".to_string(),
            arrival: NaiveDate::from_ymd_opt(2022, 3, 1)
                .and_then(|d| d.and_hms_opt(23, 50, 0)),
            triage: None,
            registration: None,
            end: None,
        };

        let json = serde_json::to_string(&times).unwrap();
        assert!(json.contains(r#""AANKOMST":"2022-03-01 23:50:00""#));
        assert!(json.contains(r#""TRIAGE":null"#));
        assert_eq!(serde_json::from_str::<VisitTimes>(&json).unwrap(), times);
    }
}
