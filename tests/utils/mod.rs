//! Shared builders for the integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use admission_features::models::{RawLabRow, RawVisitRow, RawVitalRow};

fn text(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// A complete visit row; tests blank out fields as needed
#[must_use]
pub fn visit_row(visit_id: &str, patient_id: &str, arrival_date: &str, arrival_time: &str) -> RawVisitRow {
    RawVisitRow {
        visit_id: text(visit_id),
        patient_id: text(patient_id),
        arrival_date: text(arrival_date),
        arrival_time: text(arrival_time),
        triage_date: text(arrival_date),
        triage_time: text(arrival_time),
        registration_time: text(arrival_time),
        end_time: None,
        sex: text("M"),
        age: text("50"),
        triage_code: text("U3"),
        arrival_mode: text("AMB"),
        specialism: text("INT"),
        complaint: text("Pijn op de borst"),
        disposition: text("OPN"),
        postcode: text("7512AB"),
        previous_visits: text("1"),
        previous_admission_percentage: text("0"),
    }
}

/// A lab result drawn on `date` at `draw_time`, reported half an hour later
#[must_use]
pub fn lab_row(patient_id: &str, code: &str, result: &str, date: &str, draw_time: &str) -> RawLabRow {
    RawLabRow {
        visit_id: None,
        patient_id: text(patient_id),
        code: text(code),
        result: text(result),
        arrival_date: text(date),
        arrival_time: text("08:00:00"),
        draw_date: text(date),
        draw_time: text(draw_time),
        result_date: None,
        result_time: None,
    }
}

/// A vital sign reading
#[must_use]
pub fn vital_row(patient_id: &str, label: &str, value: &str, recorded_at: &str) -> RawVitalRow {
    RawVitalRow {
        patient_id: text(patient_id),
        label: text(label),
        value: text(value),
        recorded_at: text(recorded_at),
        arrival_date: None,
        arrival_time: None,
    }
}

/// Write a semicolon-delimited file under `dir`
pub fn write_csv(dir: &Path, name: &str, header: &[&str], rows: &[Vec<&str>]) -> PathBuf {
    let mut content = header.join(";");
    content.push('\n');
    for row in rows {
        content.push_str(&row.join(";"));
        content.push('\n');
    }
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Index of a column, panicking with the column list when absent
#[must_use]
pub fn column(columns: &[String], name: &str) -> usize {
    columns
        .iter()
        .position(|c| c == name)
        .unwrap_or_else(|| panic!("no column {name} in {columns:?}"))
}
