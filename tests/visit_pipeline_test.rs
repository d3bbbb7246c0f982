//! Tests for the SEH pipeline in both modes

mod utils;

use admission_features::encoding::{EncoderRegistry, TransformKey, TransformSource};
use admission_features::{CodeBook, PipelineOptions, VisitPipeline};
use utils::{column, visit_row};

fn options() -> PipelineOptions {
    PipelineOptions::default().with_one_hot_min_count(1)
}

fn training_visits() -> Vec<admission_features::models::RawVisitRow> {
    // Saturday afternoon, admitted; the visit ends after midnight
    let mut admitted = visit_row("S1", "P1", "2022-03-05", "14:30:00");
    admitted.triage_time = Some("14:40:00".to_string());
    admitted.end_time = Some("01:10:00".to_string());
    admitted.age = Some("67".to_string());
    admitted.triage_code = Some("U2".to_string());
    admitted.specialism = Some("CHI".to_string());
    admitted.previous_admission_percentage = Some("0,5".to_string());

    // Monday night, sent home
    let mut home = visit_row("S2", "P2", "2022-03-07", "03:10:00");
    home.sex = Some("V".to_string());
    home.age = Some("23".to_string());
    home.arrival_mode = Some("EV".to_string());
    home.complaint = Some("val van trap".to_string());
    home.disposition = Some("HUIS".to_string());

    let mut deceased = visit_row("S3", "P3", "2022-03-07", "05:00:00");
    deceased.disposition = Some("MOR".to_string());

    let after_cutoff = visit_row("S4", "P4", "2023-02-01", "10:00:00");

    let mut no_complaint = visit_row("S5", "P5", "2022-03-08", "10:00:00");
    no_complaint.complaint = None;

    vec![admitted, home, deceased, after_cutoff, no_complaint]
}

#[test]
fn test_fit_builds_features_and_target() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = VisitPipeline::new(&codebook)
        .with_options(options())
        .run(training_visits(), &mut TransformSource::Fit(&mut registry))
        .unwrap();

    let features = &output.features;
    let ids: Vec<&str> = features.rows.iter().map(|r| r.visit_id.as_str()).collect();
    assert_eq!(ids, vec!["S1", "S2"]);

    let cols = &features.columns;
    let s1 = &features.rows[0];
    assert_eq!(s1.values[column(cols, "AANKSTIJD")], Some(2.0));
    assert_eq!(s1.values[column(cols, "WEEKEND")], Some(1.0));
    assert_eq!(s1.values[column(cols, "AGE")], Some(13.0));
    assert_eq!(s1.values[column(cols, "TRIANIVCOD")], Some(2.0));
    assert_eq!(s1.values[column(cols, "PrevAdmissionPercentage")], Some(0.5));
    assert_eq!(s1.values[column(cols, "VVCODE_AMB")], Some(1.0));
    assert_eq!(s1.values[column(cols, "VVCODE_EV")], Some(0.0));
    assert_eq!(s1.values[column(cols, "SPECIALISM_CHI")], Some(1.0));
    // Classes sort as [M, V]
    assert_eq!(s1.values[column(cols, "GESLACHT")], Some(0.0));
    assert_eq!(s1.admitted, Some(1));

    let s2 = &features.rows[1];
    assert_eq!(s2.values[column(cols, "AANKSTIJD")], Some(0.0));
    assert_eq!(s2.values[column(cols, "WEEKEND")], Some(0.0));
    assert_eq!(s2.values[column(cols, "GESLACHT")], Some(1.0));
    assert_eq!(s2.admitted, Some(0));

    // Visit-level columns come first, triage last
    assert_eq!(cols[0], "AANKSTIJD");
    assert_eq!(cols.last().map(String::as_str), Some("TRIANIVCOD"));

    assert_eq!(registry.len(), 3);
    assert!(registry.get(&TransformKey::label_encoder("GESLACHT")).is_some());
}

#[test]
fn test_visit_times_roll_over_midnight() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = VisitPipeline::new(&codebook)
        .with_options(options())
        .run(training_visits(), &mut TransformSource::Fit(&mut registry))
        .unwrap();

    assert_eq!(output.times.len(), 2);
    let end = output.times[0].end.map(|t| t.format("%Y-%m-%d %H:%M").to_string());
    assert_eq!(end, Some("2022-03-06 01:10".to_string()));
    let triage = output.times[0].triage.map(|t| t.format("%H:%M").to_string());
    assert_eq!(triage, Some("14:40".to_string()));
}

#[test]
fn test_transform_only_reuses_fitted_vocabularies() {
    let codebook = CodeBook::default();
    let pipeline = VisitPipeline::new(&codebook).with_options(options());

    let mut registry = EncoderRegistry::new("unused");
    let fitted = pipeline
        .run(training_visits(), &mut TransformSource::Fit(&mut registry))
        .unwrap();

    // Unseen arrival mode and sex; no disposition in live data
    let mut live = visit_row("L1", "P9", "2024-06-01", "09:15:00");
    live.arrival_mode = Some("HELI".to_string());
    live.sex = Some("X".to_string());
    live.disposition = None;

    let output = pipeline
        .run(vec![live], &mut TransformSource::Fitted(&registry))
        .unwrap();

    assert_eq!(output.features.columns, fitted.features.columns);
    let cols = &output.features.columns;
    let row = &output.features.rows[0];
    assert_eq!(row.values[column(cols, "VVCODE_AMB")], Some(0.0));
    assert_eq!(row.values[column(cols, "VVCODE_EV")], Some(0.0));
    assert_eq!(row.values[column(cols, "GESLACHT")], None);
    assert_eq!(row.admitted, None);
}

#[test]
fn test_rare_categories_are_pruned() {
    let codebook = CodeBook::default();
    let visits: Vec<_> = ["AMB", "AMB", "EV"]
        .iter()
        .enumerate()
        .map(|(i, mode)| {
            let mut row = visit_row(&format!("S{i}"), &format!("P{i}"), "2022-01-10", "10:00:00");
            row.arrival_mode = Some((*mode).to_string());
            row
        })
        .collect();

    let mut registry = EncoderRegistry::new("unused");
    let output = VisitPipeline::new(&codebook)
        .with_options(PipelineOptions::default().with_one_hot_min_count(2))
        .run(visits, &mut TransformSource::Fit(&mut registry))
        .unwrap();

    let vvcode: Vec<&String> = output
        .features
        .columns
        .iter()
        .filter(|c| c.starts_with("VVCODE_"))
        .collect();
    assert_eq!(vvcode, vec!["VVCODE_AMB"]);
    // SPECIALISM has three INT visits, above the threshold
    assert!(output.features.columns.contains(&"SPECIALISM_INT".to_string()));
}

#[test]
fn test_record_batch_carries_target_only_when_fitted() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = VisitPipeline::new(&codebook)
        .with_options(options())
        .run(training_visits(), &mut TransformSource::Fit(&mut registry))
        .unwrap();

    let batch = output.features.to_record_batch().unwrap();
    let schema = batch.schema();
    assert_eq!(schema.field(0).name(), "SEHID");
    assert_eq!(schema.field(1).name(), "PATIENTNR");
    assert!(schema.index_of("KLACHT").is_ok());
    assert!(schema.index_of("OPNAME").is_ok());
    assert!(schema.index_of("POSTCODE").is_err());
    assert_eq!(batch.num_rows(), 2);
}
