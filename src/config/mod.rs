//! Run configuration loaded from YAML.
//!
//! Paths are taken as given; the only check is that serving directories
//! exist when the engine starts.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::codebook::CodeBook;
use crate::error::Result;
use crate::error::util::safe_read_to_string;
use crate::utils::io::OutputFormat;

/// Locations of everything the inference engine loads at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Visit encoders (GESLACHT, VVCODE, SPECIALISM)
    pub feature_encoders_dir: PathBuf,
    /// One scaler per lab label
    pub lab_scalers_dir: PathBuf,
    /// One scaler per scaled vital label
    pub vitals_scaler_dir: PathBuf,
    /// Bucketed tabular models (`<minutes>_min_xgboost.json`)
    pub model_dir: PathBuf,
    /// Complaint text classifier
    pub nlp_model: PathBuf,
    /// Width of one elapsed-time bucket in minutes
    #[serde(default = "default_bucket_minutes")]
    pub bucket_minutes: u32,
    /// Largest bucket; longer stays use this bucket's model
    #[serde(default = "default_max_bucket_minutes")]
    pub max_bucket_minutes: u32,
}

const fn default_bucket_minutes() -> u32 {
    10
}

const fn default_max_bucket_minutes() -> u32 {
    180
}

impl ServingConfig {
    /// All serving paths under one root, using the conventional sub-directory names
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            feature_encoders_dir: root.join("encoders"),
            lab_scalers_dir: root.join("lab_scalers"),
            vitals_scaler_dir: root.join("vitals_scalers"),
            model_dir: root.join("models"),
            nlp_model: root.join("models").join("klacht_nlp.json"),
            bucket_minutes: default_bucket_minutes(),
            max_bucket_minutes: default_max_bucket_minutes(),
        }
    }
}

/// Settings of the training runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Output directory; `<input dir>/processed` when absent
    pub output_dir: Option<PathBuf>,
    /// Visits on or after this date are left out of fitting
    pub arrival_cutoff: Option<NaiveDate>,
    /// One-hot categories seen fewer times are pruned
    pub one_hot_min_count: usize,
    /// Rows per batch for the vitals output
    pub vitals_batch_size: usize,
    pub output_format: OutputFormat,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            arrival_cutoff: NaiveDate::from_ymd_opt(2023, 1, 1),
            one_hot_min_count: 500,
            vitals_batch_size: 10_000,
            output_format: OutputFormat::Csv,
        }
    }
}

impl TrainingConfig {
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

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

    #[must_use]
    pub const fn with_vitals_batch_size(mut self, batch_size: usize) -> Self {
        self.vitals_batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub serving: ServingConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    /// YAML codebook replacing the built-in hospital codebook
    #[serde(default)]
    pub codebook: Option<PathBuf>,
}

impl Config {
    /// Load a configuration file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = safe_read_to_string(path, "configuration")?;
        let mut config: Self = serde_yaml::from_str(&content)?;

        // Relative paths are relative to the configuration file
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.serving.feature_encoders_dir);
        rebase(&mut self.serving.lab_scalers_dir);
        rebase(&mut self.serving.vitals_scaler_dir);
        rebase(&mut self.serving.model_dir);
        rebase(&mut self.serving.nlp_model);
        if let Some(dir) = self.training.output_dir.as_mut() {
            rebase(dir);
        }
        if let Some(codebook) = self.codebook.as_mut() {
            rebase(codebook);
        }
    }

    /// The configured codebook, or the built-in one
    pub fn load_codebook(&self) -> Result<CodeBook> {
        match &self.codebook {
            Some(path) => {
                log::info!("Loading codebook from {}", path.display());
                CodeBook::from_yaml_file(path)
            }
            None => Ok(CodeBook::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let yaml = r"
serving:
  feature_encoders_dir: /srv/encoders
  lab_scalers_dir: /srv/lab
  vitals_scaler_dir: /srv/vitals
  model_dir: /srv/models
  nlp_model: /srv/models/nlp.json
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.serving.bucket_minutes, 10);
        assert_eq!(config.serving.max_bucket_minutes, 180);
        assert_eq!(config.training.one_hot_min_count, 500);
        assert_eq!(config.training.vitals_batch_size, 10_000);
        assert_eq!(config.training.output_format, OutputFormat::Csv);
        assert_eq!(
            config.training.arrival_cutoff,
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );
        assert!(config.codebook.is_none());
    }

    #[test]
    fn test_relative_paths_follow_config_file() {
        let mut config = Config {
            serving: ServingConfig::rooted_at("deploy"),
            training: TrainingConfig::default().with_output_dir("out"),
            codebook: None,
        };
        config.resolve_relative_to(Path::new("/etc/admission"));

        assert_eq!(
            config.serving.model_dir,
            PathBuf::from("/etc/admission/deploy/models")
        );
        assert_eq!(
            config.training.output_dir,
            Some(PathBuf::from("/etc/admission/out"))
        );
    }
}
