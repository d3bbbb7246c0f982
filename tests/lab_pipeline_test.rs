//! Tests for the LAB pipeline

mod utils;

use admission_features::encoding::{EncoderRegistry, TransformSource};
use admission_features::{CodeBook, LabPipeline};
use utils::lab_row;

#[test]
fn test_panel_codes_share_one_column() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = LabPipeline::new(&codebook)
        .run(
            vec![
                // Two codes of the POC glucose group
                lab_row("1", "CS000267", "5.0", "2022-02-01", "09:00:00"),
                lab_row("2", "CS002485", "9.0", "2022-02-01", "09:00:00"),
                // Not in any group
                lab_row("1", "XX999999", "1.0", "2022-02-01", "09:00:00"),
            ],
            &mut TransformSource::Fit(&mut registry),
        )
        .unwrap();

    assert_eq!(output.observations.len(), 2);
    assert!(output.observations.iter().all(|o| o.label == "Glucose (POC)"));
    assert_eq!(output.features.value("1", "Glucose (POC)"), Some(0.0));
    assert_eq!(output.features.value("2", "Glucose (POC)"), Some(1.0));
}

#[test]
fn test_tidy_output_has_every_lab_column() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = LabPipeline::new(&codebook)
        .run(
            vec![
                lab_row("1", "CS000251", "6.1", "2022-02-01", "09:00:00"),
                lab_row("2", "CS000251", "7.3", "2022-02-01", "09:00:00"),
            ],
            &mut TransformSource::Fit(&mut registry),
        )
        .unwrap();

    let features = &output.features;
    assert_eq!(features.columns().len(), 26);
    let row = features.row("1").unwrap();
    let missing = row.values.iter().filter(|v| v.is_none()).count();
    assert_eq!(missing, 25);
    assert!(features.value("1", "Glucose").is_some());
}

#[test]
fn test_result_strings_are_normalized() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = LabPipeline::new(&codebook)
        .run(
            vec![
                lab_row("1", "CS000277", "<5", "2022-02-01", "09:00:00"),
                lab_row("2", "CS000277", "negatief", "2022-02-01", "09:00:00"),
                lab_row("3", "CS000277", "15", "2022-02-01", "09:00:00"),
                lab_row("4", "CS000277", "onleesbaar", "2022-02-01", "09:00:00"),
                // Pending results are not values when fitting
                lab_row("5", "CS000277", "-volgt-", "2022-02-01", "09:00:00"),
            ],
            &mut TransformSource::Fit(&mut registry),
        )
        .unwrap();

    let crp = |patient: &str| output.features.value(patient, "CRP");
    // Fitted on {5, 0, 15}
    assert!((crp("1").unwrap() - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(crp("2"), Some(0.0));
    assert_eq!(crp("3"), Some(1.0));
    assert_eq!(crp("4"), None);
    assert_eq!(crp("5"), None);
}

#[test]
fn test_latest_result_wins() {
    let codebook = CodeBook::default();
    let mut registry = EncoderRegistry::new("unused");
    let output = LabPipeline::new(&codebook)
        .run(
            vec![
                lab_row("1", "CS000165", "140", "2022-02-01", "09:00:00"),
                lab_row("1", "CS000165", "130", "2022-02-01", "11:00:00"),
                lab_row("1", "CS000165", "150", "2022-02-01", "10:00:00"),
            ],
            &mut TransformSource::Fit(&mut registry),
        )
        .unwrap();

    assert_eq!(output.observations.len(), 3);
    assert_eq!(output.features.value("1", "Natrium"), Some(0.0));
}
