//! Fitted transforms and their persisted registry.
//!
//! A fit run creates every encoder and scaler from the training data and
//! persists them as one JSON file per key. Transform-only runs load the same
//! files and apply them without refitting, so training and serving see
//! identical vocabularies and ranges.
//!
//! Pipelines never talk to a registry directly. They receive a
//! [`TransformSource`], which fits-and-records in fit mode and looks up in
//! transform-only mode, so one pipeline definition serves both modes.

pub mod label;
pub mod one_hot;
pub mod scaler;

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::util::{ensure_directory, safe_open_file, validate_directory};
use crate::error::{FeatureError, Result};

pub use label::LabelEncoder;
pub use one_hot::OneHotEncoder;
pub use scaler::MinMaxScaler;

/// Pipeline mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fit and persist every transform
    Fit,
    /// Apply previously persisted transforms
    TransformOnly,
}

/// Kind of fitted transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformKind {
    LabelEncoder,
    OneHotEncoder,
    MinMaxScaler,
}

impl TransformKind {
    const fn file_suffix(self) -> &'static str {
        match self {
            Self::LabelEncoder => "label_encoder",
            Self::OneHotEncoder => "one_hot_encoder",
            Self::MinMaxScaler => "scaler",
        }
    }
}

/// Column or metric name plus the kind of transform fitted for it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformKey {
    pub name: String,
    pub kind: TransformKind,
}

impl TransformKey {
    pub fn new(name: impl Into<String>, kind: TransformKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    #[must_use]
    pub fn label_encoder(name: &str) -> Self {
        Self::new(name, TransformKind::LabelEncoder)
    }

    #[must_use]
    pub fn one_hot_encoder(name: &str) -> Self {
        Self::new(name, TransformKind::OneHotEncoder)
    }

    #[must_use]
    pub fn scaler(name: &str) -> Self {
        Self::new(name, TransformKind::MinMaxScaler)
    }

    /// Deterministic file name: `<name>_<kind>.json`, spaces as underscores
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            self.name.replace(' ', "_"),
            self.kind.file_suffix()
        )
    }
}

impl std::fmt::Display for TransformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.kind.file_suffix())
    }
}

/// A fitted encoder or scaler as persisted on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedTransform {
    LabelEncoder(LabelEncoder),
    OneHotEncoder(OneHotEncoder),
    MinMaxScaler(MinMaxScaler),
}

impl FittedTransform {
    #[must_use]
    pub const fn kind(&self) -> TransformKind {
        match self {
            Self::LabelEncoder(_) => TransformKind::LabelEncoder,
            Self::OneHotEncoder(_) => TransformKind::OneHotEncoder,
            Self::MinMaxScaler(_) => TransformKind::MinMaxScaler,
        }
    }
}

/// Fitted transforms of one domain, keyed by column or metric
#[derive(Debug, Clone, Default)]
pub struct EncoderRegistry {
    dir: PathBuf,
    transforms: FxHashMap<TransformKey, FittedTransform>,
}

impl EncoderRegistry {
    /// Empty registry that persists into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            transforms: FxHashMap::default(),
        }
    }

    /// Load the transforms for `required` keys from `dir`
    ///
    /// Every missing file is collected first, so a broken deployment reports
    /// all of its gaps at once.
    pub fn load(dir: impl Into<PathBuf>, required: &[TransformKey]) -> Result<Self> {
        let dir = dir.into();
        validate_directory(&dir, "transform registry")?;

        let mut registry = Self::new(dir);
        let mut missing = Vec::new();

        for key in required {
            let path = registry.path_for(key);
            if !path.is_file() {
                missing.push((key.clone(), path));
                continue;
            }
            let transform = read_transform(&path)?;
            if transform.kind() != key.kind {
                return Err(FeatureError::Config(format!(
                    "{} holds a {:?}, expected {:?}",
                    path.display(),
                    transform.kind(),
                    key.kind
                )));
            }
            registry.transforms.insert(key.clone(), transform);
        }

        if missing.len() > 1 {
            return Err(FeatureError::MissingTransforms(
                missing
                    .iter()
                    .map(|(_, path)| path.display().to_string())
                    .collect(),
            ));
        }
        if let Some((key, path)) = missing.pop() {
            return Err(FeatureError::MissingTransform {
                key: key.to_string(),
                path,
            });
        }

        log::info!(
            "Loaded {} fitted transforms from {}",
            registry.len(),
            registry.dir.display()
        );
        Ok(registry)
    }

    /// Write every transform to its file in the registry directory
    pub fn persist(&self) -> Result<()> {
        ensure_directory(&self.dir)?;

        for key in self.keys() {
            let path = self.path_for(key);
            let file = fs::File::create(&path).map_err(|e| FeatureError::io(&path, e))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &self.transforms[key])?;
            log::debug!("Persisted {key} to {}", path.display());
        }

        log::info!(
            "Persisted {} fitted transforms to {}",
            self.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Path of the file holding `key`
    #[must_use]
    pub fn path_for(&self, key: &TransformKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn insert(&mut self, key: TransformKey, transform: FittedTransform) {
        self.transforms.insert(key, transform);
    }

    #[must_use]
    pub fn get(&self, key: &TransformKey) -> Option<&FittedTransform> {
        self.transforms.get(key)
    }

    /// Keys in sorted order
    #[must_use]
    pub fn keys(&self) -> Vec<&TransformKey> {
        let mut keys: Vec<&TransformKey> = self.transforms.keys().collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    fn missing(&self, key: &TransformKey) -> FeatureError {
        FeatureError::MissingTransform {
            key: key.to_string(),
            path: self.path_for(key),
        }
    }

    pub fn label_encoder(&self, name: &str) -> Result<&LabelEncoder> {
        let key = TransformKey::label_encoder(name);
        match self.transforms.get(&key) {
            Some(FittedTransform::LabelEncoder(encoder)) => Ok(encoder),
            _ => Err(self.missing(&key)),
        }
    }

    pub fn one_hot_encoder(&self, name: &str) -> Result<&OneHotEncoder> {
        let key = TransformKey::one_hot_encoder(name);
        match self.transforms.get(&key) {
            Some(FittedTransform::OneHotEncoder(encoder)) => Ok(encoder),
            _ => Err(self.missing(&key)),
        }
    }

    pub fn scaler(&self, name: &str) -> Result<&MinMaxScaler> {
        let key = TransformKey::scaler(name);
        match self.transforms.get(&key) {
            Some(FittedTransform::MinMaxScaler(scaler)) => Ok(scaler),
            _ => Err(self.missing(&key)),
        }
    }
}

fn read_transform(path: &Path) -> Result<FittedTransform> {
    let file = safe_open_file(path, "fitted transform")?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Where a pipeline gets its transforms from
///
/// In fit mode every request fits a new transform on the observed values
/// and records it; in transform-only mode the observed values are ignored
/// and the persisted transform is returned.
#[derive(Debug)]
pub enum TransformSource<'a> {
    Fit(&'a mut EncoderRegistry),
    Fitted(&'a EncoderRegistry),
}

impl TransformSource<'_> {
    #[must_use]
    pub const fn mode(&self) -> Mode {
        match self {
            Self::Fit(_) => Mode::Fit,
            Self::Fitted(_) => Mode::TransformOnly,
        }
    }

    /// Min-max scaler for a metric
    pub fn min_max_scaler(&mut self, name: &str, observed: &[f64]) -> Result<MinMaxScaler> {
        match self {
            Self::Fit(registry) => {
                let scaler = MinMaxScaler::fit(name, observed)?;
                registry.insert(
                    TransformKey::scaler(name),
                    FittedTransform::MinMaxScaler(scaler.clone()),
                );
                Ok(scaler)
            }
            Self::Fitted(registry) => registry.scaler(name).cloned(),
        }
    }

    /// Label encoder for a column
    pub fn label_encoder<'v, I>(&mut self, name: &str, observed: I) -> Result<LabelEncoder>
    where
        I: IntoIterator<Item = &'v str>,
    {
        match self {
            Self::Fit(registry) => {
                let encoder = LabelEncoder::fit(name, observed)?;
                registry.insert(
                    TransformKey::label_encoder(name),
                    FittedTransform::LabelEncoder(encoder.clone()),
                );
                Ok(encoder)
            }
            Self::Fitted(registry) => registry.label_encoder(name).cloned(),
        }
    }

    /// One-hot encoder for a column, pruning rare categories when fitting
    pub fn one_hot_encoder<'v, I>(
        &mut self,
        name: &str,
        observed: I,
        min_count: usize,
    ) -> Result<OneHotEncoder>
    where
        I: IntoIterator<Item = Option<&'v str>>,
    {
        match self {
            Self::Fit(registry) => {
                let encoder = OneHotEncoder::fit(name, observed, min_count)?;
                registry.insert(
                    TransformKey::one_hot_encoder(name),
                    FittedTransform::OneHotEncoder(encoder.clone()),
                );
                Ok(encoder)
            }
            Self::Fitted(registry) => registry.one_hot_encoder(name).cloned(),
        }
    }
}
