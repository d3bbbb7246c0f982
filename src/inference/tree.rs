//! Gradient-boosted tree ensembles from an XGBoost JSON dump.
//!
//! The model file holds the trees as dumped by XGBoost
//! (`get_dump(dump_format="json")`) together with the base score:
//!
//! ```json
//! { "base_score": 0.5,
//!   "feature_names": ["AANKSTIJD", "GESLACHT"],
//!   "trees": [ { "nodeid": 0, "split": "f1", "split_condition": 0.5,
//!                "yes": 1, "no": 2, "missing": 1,
//!                "children": [ { "nodeid": 1, "leaf": -0.2 },
//!                              { "nodeid": 2, "leaf": 0.3 } ] } ] }
//! ```
//!
//! Split features are resolved to positions in the engine's feature layout
//! when the model is loaded, so a model trained on a subset of the columns
//! scores the full vector.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::util::safe_read_to_string;
use crate::error::{FeatureError, Result};

/// Node as it appears in the dump
#[derive(Debug, Deserialize)]
struct DumpNode {
    nodeid: usize,
    #[serde(default)]
    split: Option<String>,
    #[serde(default)]
    split_condition: Option<f64>,
    #[serde(default)]
    yes: Option<usize>,
    #[serde(default)]
    no: Option<usize>,
    #[serde(default)]
    missing: Option<usize>,
    #[serde(default)]
    leaf: Option<f64>,
    #[serde(default)]
    children: Vec<DumpNode>,
}

#[derive(Debug, Deserialize)]
struct DumpModel {
    #[serde(default = "default_base_score")]
    base_score: f64,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    trees: Vec<DumpNode>,
}

const fn default_base_score() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
        missing: usize,
    },
    Leaf(f64),
}

/// One tree, nodes indexed by node id
#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn score(&self, features: &[Option<f64>]) -> Option<f64> {
        let mut id = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(id)? {
                Node::Leaf(value) => return Some(*value),
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing,
                } => {
                    id = match features.get(*feature)? {
                        Some(value) if *value < *threshold => *yes,
                        Some(_) => *no,
                        None => *missing,
                    };
                }
            }
        }
        None
    }
}

/// Binary classifier made of boosted regression trees
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    base_margin: f64,
    trees: Vec<Tree>,
    width: usize,
}

impl TreeEnsemble {
    /// Load a dumped model and bind its split features to `layout`
    pub fn from_json_file(path: &Path, layout: &[String]) -> Result<Self> {
        let content = safe_read_to_string(path, "tree model")?;
        Self::from_json_str(&content, layout).map_err(|e| match e {
            FeatureError::InvalidModel { reason, .. } => FeatureError::InvalidModel {
                path: path.to_path_buf(),
                reason,
            },
            FeatureError::Json(source) => FeatureError::InvalidModel {
                path: path.to_path_buf(),
                reason: source.to_string(),
            },
            other => other,
        })
    }

    /// Parse a dumped model from a JSON string
    pub fn from_json_str(content: &str, layout: &[String]) -> Result<Self> {
        let dump: DumpModel = serde_json::from_str(content)?;
        let invalid = |reason: String| FeatureError::InvalidModel {
            path: "<inline>".into(),
            reason,
        };

        if !(dump.base_score > 0.0 && dump.base_score < 1.0) {
            return Err(invalid(format!(
                "base_score {} is not a probability",
                dump.base_score
            )));
        }

        let positions: FxHashMap<&str, usize> = layout
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let resolve = |split: &str| -> std::result::Result<usize, String> {
            let index = split.strip_prefix('f').and_then(|i| i.parse::<usize>().ok());
            let name = match (index, &dump.feature_names) {
                (Some(index), Some(names)) => names
                    .get(index)
                    .map(String::as_str)
                    .ok_or_else(|| format!("feature index {index} out of range"))?,
                (Some(index), None) if index < layout.len() => return Ok(index),
                (Some(index), None) => return Err(format!("feature index {index} out of range")),
                (None, _) => split,
            };
            positions
                .get(name)
                .copied()
                .ok_or_else(|| format!("unknown feature {name}"))
        };

        let mut trees = Vec::with_capacity(dump.trees.len());
        for root in &dump.trees {
            let mut flat: FxHashMap<usize, Node> = FxHashMap::default();
            flatten(root, &resolve, &mut flat).map_err(invalid)?;

            let mut nodes = Vec::with_capacity(flat.len());
            for id in 0..flat.len() {
                let node = flat
                    .remove(&id)
                    .ok_or_else(|| invalid(format!("node ids are not contiguous at {id}")))?;
                nodes.push(node);
            }
            trees.push(Tree { nodes });
        }

        Ok(Self {
            base_margin: logit(dump.base_score),
            trees,
            width: layout.len(),
        })
    }

    /// Number of trees
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Probability of the positive class for one feature vector
    pub fn predict_proba(&self, features: &[Option<f64>]) -> std::result::Result<f64, String> {
        if features.len() != self.width {
            return Err(format!(
                "expected {} features, got {}",
                self.width,
                features.len()
            ));
        }
        let mut margin = self.base_margin;
        for (i, tree) in self.trees.iter().enumerate() {
            margin += tree
                .score(features)
                .ok_or_else(|| format!("tree {i} does not reach a leaf"))?;
        }
        Ok(sigmoid(margin))
    }
}

fn flatten<F>(
    node: &DumpNode,
    resolve: &F,
    out: &mut FxHashMap<usize, Node>,
) -> std::result::Result<(), String>
where
    F: Fn(&str) -> std::result::Result<usize, String>,
{
    let parsed = match (node.leaf, &node.split) {
        (Some(value), _) => Node::Leaf(value),
        (None, Some(split)) => {
            let missing_field = |field: &str| format!("node {} has no {field}", node.nodeid);
            Node::Split {
                feature: resolve(split)?,
                threshold: node
                    .split_condition
                    .ok_or_else(|| missing_field("split_condition"))?,
                yes: node.yes.ok_or_else(|| missing_field("yes"))?,
                no: node.no.ok_or_else(|| missing_field("no"))?,
                missing: node.missing.or(node.yes).ok_or_else(|| missing_field("missing"))?,
            }
        }
        (None, None) => return Err(format!("node {} is neither split nor leaf", node.nodeid)),
    };
    if out.insert(node.nodeid, parsed).is_some() {
        return Err(format!("duplicate node id {}", node.nodeid));
    }
    for child in &node.children {
        flatten(child, resolve, out)?;
    }
    Ok(())
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}
