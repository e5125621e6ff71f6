use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::cluster::ClassSet;

/// Direction of the dendrogram cut.
///
/// Merge scores are similarities, so `Similarity` keeps a node when its height
/// is at least CP. `Distance` inverts the test for distance-like scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CutMode {
    #[default]
    Similarity,
    Distance,
}

impl CutMode {
    pub fn passes(self, height: f64, cp: f64) -> bool {
        match self {
            Self::Similarity => height >= cp,
            Self::Distance => height <= cp,
        }
    }
}

impl std::fmt::Display for CutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Similarity => write!(f, "similarity"),
            Self::Distance => write!(f, "distance"),
        }
    }
}

/// A cohesive group of classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub classes: ClassSet,
    pub avg_coupling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesResult {
    pub cp: f64,
    pub mode: CutMode,
    /// Classes covered by the dendrogram (M)
    pub class_count: usize,
    /// max(1, M / 2)
    pub max_modules: usize,
    pub modules: Vec<Module>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_keeps_heights_at_or_above_cp() {
        assert!(CutMode::Similarity.passes(0.2, 0.2));
        assert!(CutMode::Similarity.passes(0.3, 0.2));
        assert!(!CutMode::Similarity.passes(0.1, 0.2));
    }

    #[test]
    fn distance_inverts_the_test() {
        assert!(CutMode::Distance.passes(0.2, 0.2));
        assert!(CutMode::Distance.passes(0.1, 0.2));
        assert!(!CutMode::Distance.passes(0.3, 0.2));
    }

    #[test]
    fn default_is_similarity() {
        assert_eq!(CutMode::default(), CutMode::Similarity);
        assert_eq!(
            serde_json::to_string(&CutMode::Distance).unwrap(),
            r#""distance""#
        );
    }
}
