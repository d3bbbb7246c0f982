//! Hospital codebook
//!
//! Code lists, label aliases, valid ranges and disposition codes for the
//! emergency-department dataset. The codebook is loaded once at process
//! start and passed by reference into every pipeline, so tests can run a
//! pipeline against a synthetic codebook.

use std::path::Path;

use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::error::Result;
use crate::error::util::safe_read_to_string;

/// Raw lab codes that resolve to a single canonical label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabCodeGroup {
    /// Canonical label written to the output
    pub label: String,
    /// Raw result codes (`BEPCODE`) belonging to the label
    pub codes: SmallVec<[String; 2]>,
}

impl LabCodeGroup {
    fn new(label: &str, codes: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            codes: codes.iter().map(|code| (*code).to_string()).collect(),
        }
    }
}

/// Cleaning rules for one vital sign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSpec {
    /// Canonical label
    pub label: String,
    /// Other raw labels that denote the same signal
    #[serde(default)]
    pub aliases: SmallVec<[String; 2]>,
    /// Lowest physiologically possible value (inclusive)
    pub min: f64,
    /// Highest physiologically possible value (inclusive)
    pub max: f64,
    /// Whether the value is min-max scaled
    #[serde(default = "default_scaled")]
    pub scaled: bool,
}

const fn default_scaled() -> bool {
    true
}

impl VitalSpec {
    fn new(label: &str, min: f64, max: f64) -> Self {
        Self {
            label: label.to_string(),
            aliases: SmallVec::new(),
            min,
            max,
            scaled: true,
        }
    }

    /// Whether a value lies inside the valid range
    #[must_use]
    pub fn in_range(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Disposition (`BESTEMMING`) codes used to build the target label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionCodes {
    /// Visits with these dispositions are removed from the dataset
    pub excluded: Vec<String>,
    /// Dispositions counted as hospital admission
    pub admitted: Vec<String>,
}

impl Default for DispositionCodes {
    fn default() -> Self {
        Self {
            excluded: vec![
                "NHTA".to_string(), // home against medical advice
                "MOR".to_string(),  // mortuary
                "OVNH".to_string(), // deceased, sent home
            ],
            admitted: vec![
                "OPN".to_string(),  // admission
                "OVER".to_string(), // transfer to another hospital
            ],
        }
    }
}

impl DispositionCodes {
    /// Target label for a disposition: `None` when the visit is excluded
    #[must_use]
    pub fn target(&self, disposition: &str) -> Option<u8> {
        let code = disposition.trim();
        if self.excluded.iter().any(|c| c == code) {
            None
        } else if self.admitted.iter().any(|c| c == code) {
            Some(1)
        } else {
            Some(0)
        }
    }
}

/// All hospital-specific coding used by the pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBook {
    /// Lab groups in resolution priority order (later groups win)
    pub lab_groups: Vec<LabCodeGroup>,
    /// Vital signs kept by the vitals pipeline, in output column order
    pub vitals: Vec<VitalSpec>,
    /// Disposition codes for the admission target
    #[serde(default)]
    pub dispositions: DispositionCodes,
    /// All-caps acronym that keeps its casing in free text
    #[serde(default = "default_acronym")]
    pub preserved_acronym: String,
}

fn default_acronym() -> String {
    // Hoog-Energetisch Trauma; lowercased it is the stopword "het"
    "HET".to_string()
}

impl Default for CodeBook {
    fn default() -> Self {
        let lab_groups = vec![
            LabCodeGroup::new("Glucose", &["@0002464", "CS000251"]),
            LabCodeGroup::new("Trombocyten", &["CS000009"]),
            LabCodeGroup::new("Hematocriet", &["CS000002"]),
            LabCodeGroup::new("Kalium", &["CS000168"]),
            LabCodeGroup::new("CRP", &["CS000277"]),
            LabCodeGroup::new("Leucocyten", &["CS000013"]),
            LabCodeGroup::new("Kreatinine", &["CS000187"]),
            LabCodeGroup::new("Hemoglobine", &["CS000001"]),
            LabCodeGroup::new("Natrium", &["CS000165"]),
            LabCodeGroup::new("Bilirubine Totaal", &["CS000197"]),
            LabCodeGroup::new("Alkalische Fosfatase (AF)", &["CS000203"]),
            LabCodeGroup::new("ASAT", &["CS000208"]),
            LabCodeGroup::new("ALAT", &["CS000211"]),
            LabCodeGroup::new("LD", &["CS000214"]),
            LabCodeGroup::new("GGT", &["CS000205"]),
            LabCodeGroup::new("Ureum", &["CS000184"]),
            LabCodeGroup::new("Glucose (POC)", &["CS000267", "CS002485"]),
            LabCodeGroup::new("Leukocyten", &["CS003762"]),
            LabCodeGroup::new("Lactaat", &["CS001401"]),
            LabCodeGroup::new("NT-proBNP", &["ZGT00473"]),
            LabCodeGroup::new("hsTroponine T", &["ZGT00324"]),
            LabCodeGroup::new("kalium (POC)", &["ZGT01265", "ZGT01264"]),
            LabCodeGroup::new("Natrium (POC)", &["ZGT01448", "ZGT01452"]),
            LabCodeGroup::new("Lactaat (POC)", &["@0002710", "ZGT01324"]),
            LabCodeGroup::new("Ureum (POC)", &["ZGT01761", "ZGT01766"]),
            LabCodeGroup::new("Kreat (POC)", &["ZGT01318", "ZGT01321"]),
        ];

        let mut heart_rate = VitalSpec::new("HR", 30.0, 200.0);
        heart_rate.aliases = smallvec!["POLS".to_string()];
        let mut mews = VitalSpec::new("MEWS score", 0.0, 3.0);
        mews.scaled = false;

        Self {
            lab_groups,
            vitals: vec![
                VitalSpec::new("Temp", 25.0, 45.0),
                VitalSpec::new("Resp", 3.0, 50.0),
                VitalSpec::new("NIBP", 50.0, 250.0),
                mews,
                heart_rate,
            ],
            dispositions: DispositionCodes::default(),
            preserved_acronym: default_acronym(),
        }
    }
}

impl CodeBook {
    /// Load a codebook from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = safe_read_to_string(path, "codebook")?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Canonical lab labels in output column order
    #[must_use]
    pub fn lab_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::with_capacity(self.lab_groups.len());
        for group in &self.lab_groups {
            if !labels.contains(&group.label) {
                labels.push(group.label.clone());
            }
        }
        labels
    }

    /// Canonical vital labels in output column order
    #[must_use]
    pub fn vital_labels(&self) -> Vec<String> {
        self.vitals.iter().map(|v| v.label.clone()).collect()
    }

    /// Spec for a canonical vital label
    #[must_use]
    pub fn vital(&self, label: &str) -> Option<&VitalSpec> {
        self.vitals.iter().find(|v| v.label == label)
    }

    /// Map a raw vital label onto its canonical label, if it is known
    #[must_use]
    pub fn canonical_vital_label(&self, raw: &str) -> Option<&str> {
        let raw = raw.trim();
        self.vitals
            .iter()
            .find(|v| v.label == raw || v.aliases.iter().any(|a| a == raw))
            .map(|v| v.label.as_str())
    }

    /// Vital labels that carry a fitted scaler
    #[must_use]
    pub fn scaled_vital_labels(&self) -> Vec<String> {
        self.vitals
            .iter()
            .filter(|v| v.scaled)
            .map(|v| v.label.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lab_labels() {
        let codebook = CodeBook::default();
        let labels = codebook.lab_labels();

        assert_eq!(labels.len(), 26);
        assert_eq!(labels[0], "Glucose");
        assert_eq!(labels[25], "Kreat (POC)");
    }

    #[test]
    fn test_vital_aliases() {
        let codebook = CodeBook::default();
        assert_eq!(codebook.canonical_vital_label("POLS"), Some("HR"));
        assert_eq!(codebook.canonical_vital_label("HR"), Some("HR"));
        assert_eq!(codebook.canonical_vital_label("SpO2"), None);
        assert!(!codebook.scaled_vital_labels().contains(&"MEWS score".to_string()));
    }

    #[test]
    fn test_disposition_target() {
        let codes = DispositionCodes::default();
        assert_eq!(codes.target("OPN"), Some(1));
        assert_eq!(codes.target("OVER"), Some(1));
        assert_eq!(codes.target("HUIS"), Some(0));
        assert_eq!(codes.target("MOR"), None);
    }

    #[test]
    fn test_yaml_round_trip() {
        let codebook = CodeBook::default();
        let yaml = serde_yaml::to_string(&codebook).unwrap();
        let parsed: CodeBook = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, codebook);
    }
}
