use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::pair::UnorderedPair;

/// Raw traffic and normalized weight of one class pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairCoupling {
    /// callsAtoB + callsBtoA
    pub calls: u64,
    /// calls / total_calls, or 0.0 when the project has no cross-class traffic
    pub weight: f64,
}

/// Symmetric, normalized coupling weights keyed by unordered class pair.
///
/// Every pair of distinct classes has an explicit entry, zeros included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouplingWeights {
    pairs: BTreeMap<UnorderedPair<String>, PairCoupling>,
    total_calls: u64,
}

impl CouplingWeights {
    pub fn new(pairs: BTreeMap<UnorderedPair<String>, PairCoupling>, total_calls: u64) -> Self {
        Self { pairs, total_calls }
    }

    /// Build from plain weights (calls are left at zero).
    pub fn from_weights<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, S, f64)>,
        S: Into<String>,
    {
        let pairs = weights
            .into_iter()
            .map(|(a, b, weight)| {
                (
                    UnorderedPair::new(a.into(), b.into()),
                    PairCoupling { calls: 0, weight },
                )
            })
            .collect();
        Self {
            pairs,
            total_calls: 0,
        }
    }

    /// Weight of the pair; absent pairs weigh 0.0.
    pub fn get(&self, a: &str, b: &str) -> f64 {
        self.entry(a, b).map(|p| p.weight).unwrap_or(0.0)
    }

    pub fn entry(&self, a: &str, b: &str) -> Option<&PairCoupling> {
        self.pairs.get(&UnorderedPair::of(a, b))
    }

    /// Sum of pairCount over every distinct pair.
    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    /// Classes appearing in at least one pair, sorted.
    pub fn classes(&self) -> BTreeSet<String> {
        self.pairs
            .keys()
            .flat_map(|p| [p.first().clone(), p.second().clone()])
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnorderedPair<String>, &PairCoupling)> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn max_weight(&self) -> f64 {
        self.pairs.values().map(|p| p.weight).fold(0.0, f64::max)
    }
}

/// One row of the weight listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightEntry {
    pub a: String,
    pub b: String,
    pub calls: u64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsResult {
    pub total_calls: u64,
    pub classes: Vec<String>,
    /// Every pair, in pair order
    pub pairs: Vec<WeightEntry>,
    /// Pairs above the display threshold, heaviest first
    pub edges: Vec<WeightEntry>,
}

/// Ad hoc coupling between two named classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    pub class_a: String,
    pub class_b: String,
    pub calls_a_to_b: u64,
    pub calls_b_to_a: u64,
    pub total_calls: u64,
    pub coupling: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_symmetric_and_absent_is_zero() {
        let weights = CouplingWeights::from_weights([("A", "B", 0.75), ("B", "C", 0.25)]);
        assert_eq!(weights.get("A", "B"), 0.75);
        assert_eq!(weights.get("B", "A"), 0.75);
        assert_eq!(weights.get("A", "C"), 0.0);
        assert_eq!(weights.max_weight(), 0.75);
    }

    #[test]
    fn classes_are_the_pair_domain() {
        let weights = CouplingWeights::from_weights([("C", "A", 0.0), ("B", "A", 1.0)]);
        let classes: Vec<_> = weights.classes().into_iter().collect();
        assert_eq!(classes, vec!["A", "B", "C"]);
    }
}
