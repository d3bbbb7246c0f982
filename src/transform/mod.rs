//! Building blocks shared by the domain pipelines.

pub mod codes;
pub mod dedup;
pub mod reshape;
pub mod text;
pub mod time;
pub mod values;

pub use codes::CodeResolver;
pub use dedup::{Observation, latest_per_group};
pub use reshape::pivot;
pub use text::TextNormalizer;
pub use time::TimeMerger;
pub use values::{PENDING_VALUE, ValueNormalizer, parse_decimal_comma};
