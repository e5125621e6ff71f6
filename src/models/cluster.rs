use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A set of class names. `BTreeSet` keeps it canonical, so equal sets compare
/// and hash equal regardless of insertion order.
pub type ClassSet = BTreeSet<String>;

/// Sorted members joined by commas, e.g. `"Cart,Item"`.
pub fn canonical_key(set: &ClassSet) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Size descending, then canonical key ascending.
pub fn partition_order(a: &ClassSet, b: &ClassSet) -> Ordering {
    b.len()
        .cmp(&a.len())
        .then_with(|| canonical_key(a).cmp(&canonical_key(b)))
}

/// One agglomeration event: `left` and `right` as they were before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeStep {
    pub left: ClassSet,
    pub right: ClassSet,
    /// Average-link similarity at the time of the merge
    pub score: f64,
}

impl MergeStep {
    pub fn merged(&self) -> ClassSet {
        self.left.union(&self.right).cloned().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    /// Final partition, size descending then lexicographic
    pub clusters: Vec<ClassSet>,
    /// Ordered merge sequence (the dendrogram encoding)
    pub merges: Vec<MergeStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClustersResult {
    pub class_count: usize,
    /// Number of merges replayed to obtain `clusters`
    pub steps: usize,
    pub clusters: Vec<ClassSet>,
    pub merges: Vec<MergeStep>,
}
