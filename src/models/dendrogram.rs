use serde::{Deserialize, Serialize};

use super::cluster::ClassSet;

/// Serializable view of a dendrogram subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DendrogramView {
    pub members: ClassSet,
    pub height: f64,
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DendrogramView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DendrogramResult {
    pub class_count: usize,
    /// Leaves in tree order (left subtree first)
    pub leaves: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<DendrogramView>,
}
