use anyhow::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::LensError;
use crate::models::coupling::{CouplingWeights, PairCoupling, PairReport, WeightEntry};
use crate::models::fact::ClassFact;
use crate::models::pair::UnorderedPair;

/// Compute the normalized coupling weight of every pair of distinct classes.
///
/// `weight(A, B) = (callsAtoB + callsBtoA) / totalCount`, where `totalCount`
/// sums the same quantity over all pairs. With no cross-class traffic every
/// weight is 0.0. The first fact wins when two facts share a name.
pub fn build_weights(facts: &[ClassFact]) -> CouplingWeights {
    let classes = unique_classes(facts);

    // receiver -> count, per class; turns each directed lookup into O(1)
    let outgoing: Vec<HashMap<&str, u64>> = classes
        .iter()
        .map(|fact| {
            let mut counts: HashMap<&str, u64> = HashMap::new();
            for call in fact.calls() {
                *counts.entry(call.receiver.as_str()).or_insert(0) += 1;
            }
            counts
        })
        .collect();

    let mut counts: BTreeMap<UnorderedPair<String>, u64> = BTreeMap::new();
    let mut total_calls: u64 = 0;
    for i in 0..classes.len() {
        for j in (i + 1)..classes.len() {
            let a_to_b = outgoing[i].get(classes[j].name.as_str()).copied().unwrap_or(0);
            let b_to_a = outgoing[j].get(classes[i].name.as_str()).copied().unwrap_or(0);
            let pair_calls = a_to_b + b_to_a;
            total_calls += pair_calls;
            counts.insert(
                UnorderedPair::of(&classes[i].name, &classes[j].name),
                pair_calls,
            );
        }
    }

    let pairs = counts
        .into_iter()
        .map(|(pair, calls)| {
            let weight = if total_calls == 0 {
                0.0
            } else {
                calls as f64 / total_calls as f64
            };
            (pair, PairCoupling { calls, weight })
        })
        .collect();

    debug!(
        classes = classes.len(),
        total_calls = total_calls,
        "coupling weights built"
    );
    CouplingWeights::new(pairs, total_calls)
}

/// Coupling report for two classes looked up by case-insensitive name.
///
/// `total_calls` is the normalizer of the weight map built from the same facts.
pub fn pair_report(
    facts: &[ClassFact],
    total_calls: u64,
    a: &str,
    b: &str,
) -> Result<PairReport> {
    let classes = unique_classes(facts);
    let find = |name: &str| {
        classes
            .iter()
            .copied()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| LensError::class_not_found(name))
    };
    let class_a = find(a)?;
    let class_b = find(b)?;

    let calls_a_to_b = class_a.calls_to(&class_b.name);
    let calls_b_to_a = class_b.calls_to(&class_a.name);
    let coupling = if total_calls == 0 {
        0.0
    } else {
        (calls_a_to_b + calls_b_to_a) as f64 / total_calls as f64
    };

    Ok(PairReport {
        class_a: class_a.name.clone(),
        class_b: class_b.name.clone(),
        calls_a_to_b,
        calls_b_to_a,
        total_calls,
        coupling,
    })
}

/// Every pair as a flat row, in pair order.
pub fn weight_entries(weights: &CouplingWeights) -> Vec<WeightEntry> {
    weights
        .iter()
        .map(|(pair, p)| WeightEntry {
            a: pair.first().clone(),
            b: pair.second().clone(),
            calls: p.calls,
            weight: p.weight,
        })
        .collect()
}

/// Pairs worth drawing as graph edges: nonzero and strictly above
/// `min_percent` of the heaviest pair. Heaviest first.
pub fn weighted_edges(weights: &CouplingWeights, min_percent: f64) -> Vec<WeightEntry> {
    let threshold = (min_percent / 100.0) * weights.max_weight();
    let mut edges: Vec<WeightEntry> = weight_entries(weights)
        .into_iter()
        .filter(|e| e.weight > 0.0 && e.weight > threshold)
        .collect();
    edges.sort_by(|x, y| {
        y.weight
            .total_cmp(&x.weight)
            .then_with(|| x.a.cmp(&y.a))
            .then_with(|| x.b.cmp(&y.b))
    });
    edges
}

fn unique_classes(facts: &[ClassFact]) -> Vec<&ClassFact> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut classes = Vec::with_capacity(facts.len());
    for fact in facts {
        if seen.insert(fact.name.as_str()) {
            classes.push(fact);
        } else {
            warn!(
                class = fact.name.as_str(),
                path = fact.path.as_str(),
                "duplicate class name ignored"
            );
        }
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fact::{CallFact, MethodFact};

    fn class(name: &str, receivers: &[&str]) -> ClassFact {
        let mut fact = ClassFact::new(name);
        fact.methods.push(MethodFact {
            name: "run".into(),
            params: 0,
            lines: 1,
            calls: receivers
                .iter()
                .map(|r| CallFact {
                    method: "call".into(),
                    receiver: r.to_string(),
                    line: 0,
                })
                .collect(),
        });
        fact
    }

    /// A→B: 2, B→A: 1, B→C: 3.
    fn scenario_a() -> Vec<ClassFact> {
        vec![
            class("A", &["B", "B"]),
            class("B", &["A", "C", "C", "C"]),
            class("C", &[]),
        ]
    }

    #[test]
    fn normalizes_by_global_total() {
        let weights = build_weights(&scenario_a());
        assert_eq!(weights.total_calls(), 6);
        assert_eq!(weights.get("A", "B"), 0.5);
        assert_eq!(weights.get("B", "C"), 0.5);
        assert_eq!(weights.get("A", "C"), 0.0);
        assert_eq!(weights.entry("A", "B").unwrap().calls, 3);
    }

    #[test]
    fn weights_are_symmetric() {
        let weights = build_weights(&scenario_a());
        for a in ["A", "B", "C"] {
            for b in ["A", "B", "C"] {
                if a != b {
                    assert_eq!(weights.get(a, b), weights.get(b, a));
                }
            }
        }
    }

    #[test]
    fn weights_sum_to_one_with_traffic() {
        let facts = vec![
            class("Alpha", &["Beta", "Gamma", "Delta"]),
            class("Beta", &["Gamma", "Gamma", "Unknown"]),
            class("Gamma", &["Alpha", "Gamma"]),
            class("Delta", &["String", "Beta"]),
        ];
        let weights = build_weights(&facts);
        let sum: f64 = weights.iter().map(|(_, p)| p.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9, "sum was {sum}");
        assert!(weights.iter().all(|(_, p)| p.weight >= 0.0));
    }

    #[test]
    fn zero_traffic_gives_explicit_zero_entries() {
        let facts = vec![class("A", &["A"]), class("B", &["String"]), class("C", &[])];
        let weights = build_weights(&facts);
        assert_eq!(weights.total_calls(), 0);
        assert_eq!(weights.len(), 3);
        assert!(weights.iter().all(|(_, p)| p.weight == 0.0));
        assert!(weights.entry("A", "C").is_some());
    }

    #[test]
    fn self_calls_are_not_coupling() {
        let facts = vec![class("A", &["A", "A", "B"]), class("B", &[])];
        let weights = build_weights(&facts);
        assert_eq!(weights.total_calls(), 1);
        assert_eq!(weights.get("A", "B"), 1.0);
    }

    #[test]
    fn empty_and_single_class_have_no_pairs() {
        assert!(build_weights(&[]).is_empty());
        assert!(build_weights(&[class("Solo", &["Solo"])]).is_empty());
    }

    #[test]
    fn duplicate_names_use_first_fact() {
        let facts = vec![class("A", &["B"]), class("A", &["B", "B", "B"]), class("B", &[])];
        let weights = build_weights(&facts);
        assert_eq!(weights.len(), 1);
        assert_eq!(weights.total_calls(), 1);
    }

    #[test]
    fn pair_report_is_case_insensitive() {
        let facts = scenario_a();
        let total = build_weights(&facts).total_calls();
        let report = pair_report(&facts, total, "a", "B").unwrap();
        assert_eq!(report.class_a, "A");
        assert_eq!(report.calls_a_to_b, 2);
        assert_eq!(report.calls_b_to_a, 1);
        assert_eq!(report.total_calls, 6);
        assert_eq!(report.coupling, 0.5);
    }

    #[test]
    fn pair_report_uses_given_total() {
        let report = pair_report(&scenario_a(), 12, "B", "C").unwrap();
        assert_eq!(report.total_calls, 12);
        assert_eq!(report.calls_a_to_b, 3);
        assert_eq!(report.coupling, 0.25);
    }

    #[test]
    fn pair_report_zero_total_is_zero_coupling() {
        let facts = vec![class("A", &[]), class("B", &[])];
        let report = pair_report(&facts, 0, "A", "B").unwrap();
        assert_eq!(report.coupling, 0.0);
    }

    #[test]
    fn pair_report_unknown_class_is_error() {
        let err = pair_report(&scenario_a(), 6, "A", "Nope").unwrap_err();
        let lens = err.downcast_ref::<LensError>().unwrap();
        assert_eq!(lens.code, crate::error::ErrorCode::ClassNotFound);
    }

    #[test]
    fn edges_filter_by_percent_of_max() {
        let weights = CouplingWeights::from_weights([
            ("A", "B", 0.6),
            ("B", "C", 0.3),
            ("A", "C", 0.1),
            ("C", "D", 0.0),
        ]);
        let all = weighted_edges(&weights, 0.0);
        assert_eq!(all.len(), 3);
        assert_eq!((all[0].a.as_str(), all[0].b.as_str()), ("A", "B"));

        let heavy = weighted_edges(&weights, 50.0);
        assert_eq!(heavy.len(), 1);
    }
}
