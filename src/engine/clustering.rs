//! Average-link agglomerative clustering over coupling weights.
//!
//! Similarity between two clusters is the mean weight over every cross pair,
//! with missing pairs counted as 0.0. Growing a cluster with unrelated members
//! therefore lowers its similarity to everything else.

use std::cmp::Ordering;
use tracing::debug;

use crate::models::cluster::{ClassSet, ClusteringResult, MergeStep, canonical_key, partition_order};
use crate::models::coupling::CouplingWeights;

/// Cluster every class in the weight map's domain down to a single cluster.
///
/// Returns the N−1 merge steps in order plus the final partition. An empty
/// weight map yields an empty result.
pub fn cluster(weights: &CouplingWeights) -> ClusteringResult {
    if weights.is_empty() {
        return ClusteringResult::default();
    }

    // Sorted singletons. Replacing the lower index with the union and removing
    // the higher one keeps the list ordered by smallest member.
    let mut clusters: Vec<ClassSet> = weights
        .classes()
        .into_iter()
        .map(|name| ClassSet::from([name]))
        .collect();
    let mut merges = Vec::with_capacity(clusters.len().saturating_sub(1));

    while clusters.len() > 1 {
        let Some(best) = best_pair(&clusters, weights) else {
            break;
        };

        let right = clusters.remove(best.right);
        let left = clusters[best.left].clone();
        debug!(
            left = %canonical_key(&left),
            right = %canonical_key(&right),
            score = best.score,
            "merge"
        );
        clusters[best.left].extend(right.iter().cloned());
        merges.push(MergeStep {
            left,
            right,
            score: best.score,
        });
    }

    clusters.sort_by(partition_order);
    ClusteringResult { clusters, merges }
}

/// Mean weight over all `a ∈ left, b ∈ right`; 0.0 when either side is empty.
pub fn average_link(left: &ClassSet, right: &ClassSet, weights: &CouplingWeights) -> f64 {
    let count = left.len() * right.len();
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = left
        .iter()
        .flat_map(|a| right.iter().map(move |b| weights.get(a, b)))
        .sum();
    sum / count as f64
}

/// Partition after replaying the first `steps` merges over `classes`.
///
/// `steps` larger than the sequence replays everything.
pub fn replay_partition(classes: &ClassSet, merges: &[MergeStep], steps: usize) -> Vec<ClassSet> {
    let mut partition: Vec<ClassSet> = classes.iter().map(|c| ClassSet::from([c.clone()])).collect();

    for step in merges.iter().take(steps) {
        partition.retain(|set| *set != step.left && *set != step.right);
        partition.push(step.merged());
    }

    partition.sort_by(partition_order);
    partition
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    left: usize,
    right: usize,
    score: f64,
    size: usize,
}

/// Scan every pair of current clusters and pick the winner.
///
/// Higher score wins; ties go to the larger combined size, then to the
/// lexicographically smaller `"left|right"` key. The comparison is a total
/// order over pairs, so the scan order cannot change the outcome.
fn best_pair(clusters: &[ClassSet], weights: &CouplingWeights) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for i in 0..clusters.len() {
        for j in (i + 1)..clusters.len() {
            let candidate = Candidate {
                left: i,
                right: j,
                score: average_link(&clusters[i], &clusters[j], weights),
                size: clusters[i].len() + clusters[j].len(),
            };
            best = match best {
                Some(current) if compare(&candidate, &current, clusters) != Ordering::Greater => {
                    Some(current)
                }
                _ => Some(candidate),
            };
        }
    }

    best
}

/// `Greater` means `a` should be merged before `b`.
fn compare(a: &Candidate, b: &Candidate, clusters: &[ClassSet]) -> Ordering {
    a.score
        .partial_cmp(&b.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.size.cmp(&b.size))
        .then_with(|| {
            // smaller key wins, so compare reversed
            pair_key(&clusters[b.left], &clusters[b.right])
                .cmp(&pair_key(&clusters[a.left], &clusters[a.right]))
        })
}

fn pair_key(left: &ClassSet, right: &ClassSet) -> String {
    format!("{}|{}", canonical_key(left), canonical_key(right))
}
