//! Data model of the pipelines
//!
//! Raw records as exported by the hospital, cleaned long-format
//! observations and the tidy per-patient feature table.

pub mod feature_table;
pub mod observations;
pub mod records;

pub use feature_table::{FeatureRow, FeatureTable};
pub use observations::{LabObservation, RadiologyReport, VisitTimes, VitalObservation};
pub use records::{RawLabRow, RawRadiologyRow, RawVisitRow, RawVitalRow, SourceRecord};
