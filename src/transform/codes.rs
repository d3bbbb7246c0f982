//! Resolution of hospital result codes onto canonical labels.

use rustc_hash::FxHashMap;

use crate::codebook::LabCodeGroup;

/// Maps raw result codes onto canonical labels (many codes to one label)
#[derive(Debug, Clone)]
pub struct CodeResolver {
    index: FxHashMap<String, String>,
}

impl CodeResolver {
    /// Build the lookup from groups listed in priority order
    ///
    /// A code listed in several groups resolves to the last one.
    #[must_use]
    pub fn new(groups: &[LabCodeGroup]) -> Self {
        let mut index = FxHashMap::default();
        for group in groups {
            for code in &group.codes {
                index.insert(code.trim().to_string(), group.label.clone());
            }
        }
        Self { index }
    }

    /// Canonical label for a raw code
    #[must_use]
    pub fn resolve(&self, code: &str) -> Option<&str> {
        self.index.get(code.trim()).map(String::as_str)
    }

    /// Attach canonical labels to rows, dropping rows whose code is unmapped
    pub fn resolve_rows<T, F>(&self, rows: Vec<T>, code_of: F) -> Vec<(T, String)>
    where
        F: Fn(&T) -> &str,
    {
        rows.into_iter()
            .filter_map(|row| {
                let label = self.resolve(code_of(&row))?.to_string();
                Some((row, label))
            })
            .collect()
    }

    /// Number of raw codes known to the resolver
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the resolver knows no codes at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
