//! Domain pipelines
//!
//! One pipeline per source table (LAB, VITALS, SEH, RAD). Each is a fixed
//! sequence of whole-table stages; rows that fail a filter are dropped and
//! every stage logs how many rows survived it. The same pipeline runs in fit
//! and transform-only mode: the [`TransformSource`] it is given decides
//! whether encoders and scalers are fitted or loaded.

pub mod lab;
pub mod radiology;
pub mod visit;
pub mod vitals;

use std::fmt;

use chrono::NaiveDate;

use crate::config::TrainingConfig;
use crate::encoding::{Mode, TransformSource};
use crate::error::Result;
use crate::transform::TimeMerger;
use crate::utils::logging::log_stage;

pub use lab::{LabOutput, LabPipeline};
pub use radiology::RadiologyPipeline;
pub use visit::{VisitFeatureRow, VisitFeatures, VisitOutput, VisitPipeline};
pub use vitals::{VitalsOutput, VitalsPipeline};

/// Options shared by the pipelines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Fit runs drop visits that arrived on or after this date
    pub arrival_cutoff: Option<NaiveDate>,
    /// One-hot categories seen fewer times are pruned when fitting
    pub one_hot_min_count: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for PipelineOptions {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            arrival_cutoff: config.arrival_cutoff,
            one_hot_min_count: config.one_hot_min_count,
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub const fn with_arrival_cutoff(mut self, cutoff: Option<NaiveDate>) -> Self {
        self.arrival_cutoff = cutoff;
        self
    }

    #[must_use]
    pub const fn with_one_hot_min_count(mut self, min_count: usize) -> Self {
        self.one_hot_min_count = min_count;
        self
    }
}

impl fmt::Display for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arrival_cutoff {
            Some(cutoff) => write!(f, "arrival before {cutoff}")?,
            None => write!(f, "no arrival cutoff")?,
        }
        write!(f, ", one-hot minimum count {}", self.one_hot_min_count)
    }
}

/// Text the hospital exports use for an absent value
const MISSING_MARKERS: &[&str] = &["NA", "N/A", "NaN", "nan", "NULL", "null", "None"];

/// Present, non-placeholder text of an optional field
pub(crate) fn present(value: Option<&String>) -> Option<&str> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !MISSING_MARKERS.contains(v))
}

/// Accessor for a field that must be present
pub(crate) type RequiredField<R> = (&'static str, fn(&R) -> Option<&String>);

/// Drop rows missing any required field, logging the count after each field
pub(crate) fn retain_required<R>(
    domain: &str,
    mut rows: Vec<R>,
    fields: &[RequiredField<R>],
) -> Vec<R> {
    for (column, field) in fields {
        rows.retain(|row| present(field(row)).is_some());
        log_stage(domain, column, rows.len());
    }
    rows
}

/// Whether a row passes the arrival cutoff of a fit run
///
/// Transform-only runs and rows without a parseable arrival date always pass.
pub(crate) fn before_cutoff(
    mode: Mode,
    times: &TimeMerger,
    arrival_date: Option<&str>,
    cutoff: Option<NaiveDate>,
) -> bool {
    if mode != Mode::Fit {
        return true;
    }
    match (cutoff, arrival_date.and_then(|d| times.parse_date(d))) {
        (Some(cutoff), Some(date)) => date < cutoff,
        _ => true,
    }
}

/// A row carrying one scalable value of a metric
pub(crate) trait Scalable {
    fn metric(&self) -> &str;
    /// Value to fit on and scale; `None` for missing or excluded values
    fn scalable_value(&self) -> Option<f64>;
    fn set_value(&mut self, value: f64);
}

/// Fit or look up one min-max scaler per metric and apply it in place
///
/// A metric without any value is skipped: there is nothing to fit on and
/// nothing to scale.
pub(crate) fn scale_per_metric<T: Scalable>(
    domain: &str,
    rows: &mut [T],
    metrics: &[String],
    source: &mut TransformSource<'_>,
) -> Result<()> {
    for metric in metrics {
        let observed: Vec<f64> = rows
            .iter()
            .filter(|row| row.metric() == metric)
            .filter_map(Scalable::scalable_value)
            .collect();

        if observed.is_empty() {
            if source.mode() == Mode::Fit {
                log::warn!("[{domain}] no values for {metric}; no scaler fitted");
            }
            continue;
        }

        let scaler = source.min_max_scaler(metric, &observed)?;
        for row in rows.iter_mut().filter(|row| row.metric() == metric) {
            if let Some(value) = row.scalable_value() {
                row.set_value(scaler.transform(value));
            }
        }
    }
    log_stage(domain, "scaling", rows.len());
    Ok(())
}
