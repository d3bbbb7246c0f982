//! Tests for the VITALS pipeline

mod utils;

use admission_features::encoding::{EncoderRegistry, TransformSource};
use admission_features::utils::io::{OutputFormat, read_csv};
use admission_features::{CodeBook, VitalsPipeline};
use utils::vital_row;

#[test]
fn test_out_of_range_reading_is_dropped_and_latest_kept() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = VitalsPipeline::new(&codebook)
        .run(
            vec![
                vital_row("7", "HR", "45", "2022-04-01 10:00:00"),
                vital_row("7", "HR", "999", "2022-04-01 10:10:00"),
                vital_row("7", "HR", "80", "2022-04-01 10:05:00"),
            ],
            &mut TransformSource::Fit(&mut registry),
        )
        .unwrap();

    // 999 is outside [30, 200]
    assert_eq!(output.observations.len(), 2);
    let mut scaled: Vec<f64> = output.observations.iter().map(|o| o.value).collect();
    scaled.sort_by(f64::total_cmp);
    assert_eq!(scaled, vec![0.0, 1.0]);

    // The 10:05 reading (80) is the latest survivor
    assert_eq!(output.features.len(), 1);
    assert_eq!(output.features.value("7", "HR"), Some(1.0));
    assert_eq!(output.features.value("7", "Temp"), None);

    let scaler = registry.scaler("HR").unwrap();
    assert_eq!((scaler.data_min, scaler.data_max), (45.0, 80.0));
}

#[test]
fn test_unknown_labels_are_dropped() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = VitalsPipeline::new(&codebook)
        .run(
            vec![
                vital_row("1", "Gewicht", "80", "2022-04-01 10:00:00"),
                vital_row("1", "Resp", "18", "2022-04-01 10:00:00"),
            ],
            &mut TransformSource::Fit(&mut registry),
        )
        .unwrap();

    assert_eq!(output.observations.len(), 1);
    assert_eq!(output.features.columns(), codebook.vital_labels().as_slice());
}

#[test]
fn test_transform_only_uses_fitted_range() {
    let codebook = CodeBook::default();
    let pipeline = VitalsPipeline::new(&codebook);

    let mut registry = EncoderRegistry::new("unused");
    pipeline
        .run(
            vec![
                vital_row("1", "Temp", "36,0", "2022-04-01 10:00:00"),
                vital_row("2", "Temp", "40,0", "2022-04-01 10:00:00"),
            ],
            &mut TransformSource::Fit(&mut registry),
        )
        .unwrap();

    let output = pipeline
        .run(
            vec![vital_row("3", "Temp", "41", "2024-01-01 12:00:00")],
            &mut TransformSource::Fitted(&registry),
        )
        .unwrap();

    // Not clamped to the fitted range
    assert_eq!(output.features.value("3", "Temp"), Some(1.25));
}

#[test]
fn test_observations_written_in_batches_with_one_header() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let rows: Vec<_> = (0..25)
        .map(|i| vital_row(&i.to_string(), "NIBP", &(100 + i).to_string(), "2022-04-01 10:00:00"))
        .collect();
    let output = VitalsPipeline::new(&codebook)
        .run(rows, &mut TransformSource::Fit(&mut registry))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vitals.csv");
    let written = output
        .write_observations(&path, 10, OutputFormat::Csv)
        .unwrap();
    assert_eq!(written, 25);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().filter(|l| l.starts_with("PATIENTNR")).count(), 1);

    let batches = read_csv(&path).unwrap();
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 25);
}

#[test]
fn test_empty_observations_still_write_a_header() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = VitalsPipeline::new(&codebook)
        .run(
            vec![vital_row("1", "Gewicht", "80", "2022-04-01 10:00:00")],
            &mut TransformSource::Fit(&mut registry),
        )
        .unwrap();
    assert!(output.observations.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vitals.csv");
    let written = output
        .write_observations(&path, 10, OutputFormat::Csv)
        .unwrap();
    assert_eq!(written, 0);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().next(), Some("PATIENTNR;LABEL;Value1;DateTime;AANKOMST"));
    assert_eq!(content.lines().count(), 1);
}
