use anyhow::Result;
use std::cmp::Ordering;
use tracing::debug;

use crate::engine::dendrogram::{DendrogramTree, NodeId};
use crate::models::cluster::{MergeStep, canonical_key};
use crate::models::coupling::CouplingWeights;
use crate::models::module::{CutMode, Module};

/// Identify modules by cutting the dendrogram encoded by `merges` at `cp`.
///
/// An empty merge sequence yields no modules. A corrupt sequence is an error.
pub fn extract_modules(
    merges: &[MergeStep],
    weights: &CouplingWeights,
    cp: f64,
    mode: CutMode,
) -> Result<Vec<Module>> {
    if merges.is_empty() {
        return Ok(Vec::new());
    }
    let tree = DendrogramTree::from_merges(merges)?;
    Ok(extract_from_tree(&tree, weights, cp, mode))
}

/// Same as [`extract_modules`] over an already rebuilt tree.
///
/// 1. take the maximal subtrees whose height passes the cut,
/// 2. keep those whose full-pair average coupling is strictly above `cp`,
/// 3. keep at most `max(1, M / 2)` of them, best first.
pub fn extract_from_tree(
    tree: &DendrogramTree,
    weights: &CouplingWeights,
    cp: f64,
    mode: CutMode,
) -> Vec<Module> {
    let Some(root) = tree.root() else {
        return Vec::new();
    };

    let candidates = select_maximal(tree, root, cp, mode);
    let mut modules: Vec<Module> = candidates
        .into_iter()
        .filter_map(|id| {
            let classes = tree.members(id);
            let avg = avg_intra(classes.iter().map(String::as_str), weights);
            (avg > cp).then(|| Module {
                classes: classes.clone(),
                avg_coupling: avg,
            })
        })
        .collect();

    modules.sort_by(module_order);
    let limit = max_modules(tree.class_count());
    modules.truncate(limit);

    debug!(
        cp = cp,
        mode = %mode,
        modules = modules.len(),
        limit = limit,
        "modules extracted"
    );
    modules
}

/// Upper bound on returned modules for `class_count` classes.
pub fn max_modules(class_count: usize) -> usize {
    (class_count / 2).max(1)
}

/// Maximal non-leaf subtrees passing the cut, left to right.
///
/// A selected node is never descended into, and a failing node is split into
/// its two children, so no two selections are nested.
pub fn select_maximal(tree: &DendrogramTree, root: NodeId, cp: f64, mode: CutMode) -> Vec<NodeId> {
    let mut selected = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some((left, right)) = tree.children(id) else {
            continue;
        };
        if mode.passes(tree.height(id), cp) {
            selected.push(id);
        } else {
            stack.push(right);
            stack.push(left);
        }
    }
    selected
}

/// Mean weight over every unordered pair of `classes`, absent pairs as 0.0.
///
/// Fewer than two classes gives 0.0.
pub fn avg_intra<'a>(classes: impl IntoIterator<Item = &'a str>, weights: &CouplingWeights) -> f64 {
    let members: Vec<&str> = classes.into_iter().collect();
    let mut sum = 0.0;
    let mut count = 0usize;
    for (i, a) in members.iter().enumerate() {
        for b in &members[i + 1..] {
            sum += weights.get(a, b);
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn module_order(a: &Module, b: &Module) -> Ordering {
    b.avg_coupling
        .partial_cmp(&a.avg_coupling)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.classes.len().cmp(&a.classes.len()))
        .then_with(|| canonical_key(&a.classes).cmp(&canonical_key(&b.classes)))
}
