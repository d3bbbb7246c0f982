//! Raw input records
//!
//! One struct per source table. Field names follow the hospital export
//! columns. Every field is optional text: the pipelines decide which fields
//! are required and how they are parsed, so a bad value never fails
//! deserialization of the whole batch.
//!
//! The same structs are read from semicolon CSV files (through Arrow and
//! `serde_arrow`) and from JSON serving requests, where numbers may arrive as
//! JSON numbers instead of strings.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Deserialize a scalar of any type into trimmed text; empty text is `None`
fn flexible_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleTextVisitor;

    impl<'de> Visitor<'de> for FlexibleTextVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, a number, a boolean or null")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Self::Value, E> {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }

        fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Self::Value, E> {
            self.visit_str(&value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Self::Value, E> {
            Ok(value.is_finite().then(|| value.to_string()))
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2>(self, deserializer: D2) -> std::result::Result<Self::Value, D2::Error>
        where
            D2: Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }
    }

    deserializer.deserialize_option(FlexibleTextVisitor)
}

/// A raw source table
pub trait SourceRecord: for<'de> Deserialize<'de> {
    /// Domain name used in logs, errors and output file names
    const DOMAIN: &'static str;

    /// Columns a training file must carry
    const REQUIRED_COLUMNS: &'static [&'static str];
}

/// One lab result row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLabRow {
    #[serde(rename = "SEHID", default, deserialize_with = "flexible_text")]
    pub visit_id: Option<String>,
    #[serde(rename = "PATIENTNR", default, deserialize_with = "flexible_text")]
    pub patient_id: Option<String>,
    /// Raw result code
    #[serde(rename = "BEPCODE", default, deserialize_with = "flexible_text")]
    pub code: Option<String>,
    /// Raw result text
    #[serde(rename = "UITSLAG", default, deserialize_with = "flexible_text")]
    pub result: Option<String>,
    #[serde(rename = "AANKSDATUM", default, deserialize_with = "flexible_text")]
    pub arrival_date: Option<String>,
    #[serde(rename = "AANKSTIJD", default, deserialize_with = "flexible_text")]
    pub arrival_time: Option<String>,
    #[serde(rename = "AFDATUM", default, deserialize_with = "flexible_text")]
    pub draw_date: Option<String>,
    #[serde(rename = "AFTIJD", default, deserialize_with = "flexible_text")]
    pub draw_time: Option<String>,
    #[serde(rename = "UITDATUM", default, deserialize_with = "flexible_text")]
    pub result_date: Option<String>,
    #[serde(rename = "UITTIJD", default, deserialize_with = "flexible_text")]
    pub result_time: Option<String>,
}

impl SourceRecord for RawLabRow {
    const DOMAIN: &'static str = "LAB";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "PATIENTNR",
        "BEPCODE",
        "UITSLAG",
        "AANKSDATUM",
        "AANKSTIJD",
        "AFDATUM",
        "AFTIJD",
        "UITTIJD",
    ];
}

/// One vital sign reading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVitalRow {
    #[serde(rename = "PATIENTNR", default, deserialize_with = "flexible_text")]
    pub patient_id: Option<String>,
    #[serde(rename = "LABEL", default, deserialize_with = "flexible_text")]
    pub label: Option<String>,
    /// Reading, possibly with a decimal comma
    #[serde(rename = "Value1", default, deserialize_with = "flexible_text")]
    pub value: Option<String>,
    /// Time the reading was recorded
    #[serde(rename = "DateTime", default, deserialize_with = "flexible_text")]
    pub recorded_at: Option<String>,
    #[serde(rename = "AANKSDATUM", default, deserialize_with = "flexible_text")]
    pub arrival_date: Option<String>,
    #[serde(rename = "AANKSTIJD", default, deserialize_with = "flexible_text")]
    pub arrival_time: Option<String>,
}

impl SourceRecord for RawVitalRow {
    const DOMAIN: &'static str = "VITALS";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["PATIENTNR", "LABEL", "Value1", "DateTime"];
}

/// One emergency-department visit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVisitRow {
    #[serde(rename = "SEHID", default, deserialize_with = "flexible_text")]
    pub visit_id: Option<String>,
    #[serde(rename = "PATIENTNR", default, deserialize_with = "flexible_text")]
    pub patient_id: Option<String>,
    #[serde(rename = "AANKSDATUM", default, deserialize_with = "flexible_text")]
    pub arrival_date: Option<String>,
    #[serde(rename = "AANKSTIJD", default, deserialize_with = "flexible_text")]
    pub arrival_time: Option<String>,
    #[serde(rename = "TRIADATUM", default, deserialize_with = "flexible_text")]
    pub triage_date: Option<String>,
    #[serde(rename = "TRIAGETIJD", default, deserialize_with = "flexible_text")]
    pub triage_time: Option<String>,
    #[serde(rename = "REGTIJD", default, deserialize_with = "flexible_text")]
    pub registration_time: Option<String>,
    #[serde(rename = "EINDTIJD", default, deserialize_with = "flexible_text")]
    pub end_time: Option<String>,
    #[serde(rename = "GESLACHT", default, deserialize_with = "flexible_text")]
    pub sex: Option<String>,
    /// Age in years; serving payloads call it `LEEFTIJD`
    #[serde(
        rename = "AGE",
        alias = "LEEFTIJD",
        default,
        deserialize_with = "flexible_text"
    )]
    pub age: Option<String>,
    /// Triage code such as `U2`
    #[serde(rename = "TRIANIVCOD", default, deserialize_with = "flexible_text")]
    pub triage_code: Option<String>,
    /// Arrival mode (ambulance, own transport, ...)
    #[serde(rename = "VVCODE", default, deserialize_with = "flexible_text")]
    pub arrival_mode: Option<String>,
    #[serde(rename = "SPECIALISM", default, deserialize_with = "flexible_text")]
    pub specialism: Option<String>,
    /// Free-text complaint
    #[serde(rename = "KLACHT", default, deserialize_with = "flexible_text")]
    pub complaint: Option<String>,
    /// Disposition code
    #[serde(rename = "BESTEMMING", default, deserialize_with = "flexible_text")]
    pub disposition: Option<String>,
    #[serde(rename = "POSTCODE", default, deserialize_with = "flexible_text")]
    pub postcode: Option<String>,
    #[serde(rename = "PreviousVisits", default, deserialize_with = "flexible_text")]
    pub previous_visits: Option<String>,
    #[serde(
        rename = "PrevAdmissionPercentage",
        default,
        deserialize_with = "flexible_text"
    )]
    pub previous_admission_percentage: Option<String>,
}

impl SourceRecord for RawVisitRow {
    const DOMAIN: &'static str = "SEH";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "SEHID",
        "PATIENTNR",
        "AANKSDATUM",
        "AANKSTIJD",
        "TRIADATUM",
        "TRIAGETIJD",
        "GESLACHT",
        "AGE",
        "TRIANIVCOD",
        "VVCODE",
        "SPECIALISM",
        "KLACHT",
        "BESTEMMING",
    ];
}

/// One radiology report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRadiologyRow {
    #[serde(rename = "SEHID", default, deserialize_with = "flexible_text")]
    pub visit_id: Option<String>,
    #[serde(rename = "PATIENTNR", default, deserialize_with = "flexible_text")]
    pub patient_id: Option<String>,
    #[serde(rename = "AANKSDATUM", default, deserialize_with = "flexible_text")]
    pub arrival_date: Option<String>,
    #[serde(rename = "AANKSTIJD", default, deserialize_with = "flexible_text")]
    pub arrival_time: Option<String>,
    /// Date the report was authorised
    #[serde(rename = "ACCDATUM", default, deserialize_with = "flexible_text")]
    pub accorded_date: Option<String>,
    #[serde(rename = "ACCTIJD", default, deserialize_with = "flexible_text")]
    pub accorded_time: Option<String>,
    /// Report text
    #[serde(rename = "TRANSTEXT", default, deserialize_with = "flexible_text")]
    pub report: Option<String>,
    #[serde(rename = "BESTEMMING", default, deserialize_with = "flexible_text")]
    pub disposition: Option<String>,
}

impl SourceRecord for RawRadiologyRow {
    const DOMAIN: &'static str = "RAD";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["SEHID", "PATIENTNR", "ACCDATUM", "ACCTIJD", "TRANSTEXT", "BESTEMMING"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_numbers_become_text() {
        let row: RawVitalRow = serde_json::from_str(
            r#"{"PATIENTNR": 1234, "LABEL": "HR", "Value1": 80.5, "DateTime": null}"#,
        )
        .unwrap();

        assert_eq!(row.patient_id.as_deref(), Some("1234"));
        assert_eq!(row.value.as_deref(), Some("80.5"));
        assert_eq!(row.recorded_at, None);
        assert_eq!(row.arrival_date, None);
    }

    #[test]
    fn test_blank_text_is_missing() {
        let row: RawLabRow =
            serde_json::from_str(r#"{"PATIENTNR": " 7 ", "UITSLAG": "   "}"#).unwrap();
        assert_eq!(row.patient_id.as_deref(), Some("7"));
        assert_eq!(row.result, None);
    }

    #[test]
    fn test_age_alias() {
        let row: RawVisitRow = serde_json::from_str(r#"{"SEHID": "A1", "LEEFTIJD": 67}"#).unwrap();
        assert_eq!(row.age.as_deref(), Some("67"));
    }
}
