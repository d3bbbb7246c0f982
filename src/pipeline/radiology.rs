//! RAD pipeline: radiology report text per visit.

use crate::codebook::CodeBook;
use crate::encoding::Mode;
use crate::error::Result;
use crate::models::{RadiologyReport, RawRadiologyRow, SourceRecord};
use crate::pipeline::{PipelineOptions, RequiredField, before_cutoff, present, retain_required};
use crate::transform::{TextNormalizer, TimeMerger};
use crate::utils::logging::log_stage;

const DOMAIN: &str = RawRadiologyRow::DOMAIN;

/// Radiology report cleaning for one codebook
#[derive(Debug)]
pub struct RadiologyPipeline<'a> {
    codebook: &'a CodeBook,
    times: TimeMerger,
    report_text: TextNormalizer,
    options: PipelineOptions,
}

impl<'a> RadiologyPipeline<'a> {
    #[must_use]
    pub fn new(codebook: &'a CodeBook) -> Self {
        Self {
            codebook,
            times: TimeMerger::default(),
            report_text: TextNormalizer::dutch(&codebook.preserved_acronym),
            options: PipelineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every stage
    ///
    /// Fit runs label each report with the admission target of its visit
    /// and drop excluded dispositions.
    pub fn run(&self, rows: Vec<RawRadiologyRow>, mode: Mode) -> Result<Vec<RadiologyReport>> {
        log_stage(DOMAIN, "loading", rows.len());

        let required: [RequiredField<RawRadiologyRow>; 2] = [
            ("TRANSTEXT", |r| r.report.as_ref()),
            ("ACCDATUM", |r| r.accorded_date.as_ref()),
        ];
        let mut rows = retain_required(DOMAIN, rows, &required);
        if mode == Mode::Fit {
            let target: [RequiredField<RawRadiologyRow>; 1] =
                [("BESTEMMING", |r| r.disposition.as_ref())];
            rows = retain_required(DOMAIN, rows, &target);
        }

        rows.retain(|row| {
            before_cutoff(
                mode,
                &self.times,
                present(row.arrival_date.as_ref()),
                self.options.arrival_cutoff,
            )
        });
        log_stage(DOMAIN, "arrival cutoff", rows.len());

        let reports: Vec<RadiologyReport> = rows
            .into_iter()
            .filter_map(|row| {
                let admitted = match mode {
                    Mode::Fit => Some(
                        self.codebook
                            .dispositions
                            .target(present(row.disposition.as_ref()).unwrap_or_default())?,
                    ),
                    Mode::TransformOnly => None,
                };
                let report = self
                    .report_text
                    .normalize_to_string(present(row.report.as_ref()).unwrap_or_default());

                Some(RadiologyReport {
                    arrival: self.times.merge(
                        present(row.arrival_date.as_ref()),
                        present(row.arrival_time.as_ref()),
                    ),
                    accorded: self.times.merge(
                        present(row.accorded_date.as_ref()),
                        present(row.accorded_time.as_ref()),
                    ),
                    visit_id: row.visit_id,
                    patient_id: row.patient_id,
                    report,
                    admitted,
                })
            })
            .collect();
        log_stage(DOMAIN, "report text", reports.len());

        Ok(reports)
    }
}
