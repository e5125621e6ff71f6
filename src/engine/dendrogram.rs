use anyhow::{Result, bail};
use std::collections::BTreeMap;

use crate::error::LensError;
use crate::models::cluster::{ClassSet, MergeStep, canonical_key};
use crate::models::dendrogram::DendrogramView;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct DendrogramNode {
    pub members: ClassSet,
    /// Score of the merge that created the node; 0.0 for leaves
    pub height: f64,
    /// Leaf depth is 0, a parent is one more than its deepest child
    pub depth: usize,
    pub children: Option<(NodeId, NodeId)>,
}

impl DendrogramNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Binary tree rebuilt from an ordered merge sequence.
///
/// Nodes live in an arena; children are always created before their parent.
#[derive(Debug, Clone, Default)]
pub struct DendrogramTree {
    nodes: Vec<DendrogramNode>,
    root: Option<NodeId>,
}

impl DendrogramTree {
    /// Replay `merges`, keyed by canonical member set.
    ///
    /// Fails when a step references a set that is not a current cluster or
    /// when its two sides overlap; either means the sequence is corrupt.
    pub fn from_merges(merges: &[MergeStep]) -> Result<Self> {
        let mut nodes: Vec<DendrogramNode> = Vec::new();
        let mut current: BTreeMap<ClassSet, NodeId> = BTreeMap::new();

        for step in merges {
            for name in step.left.iter().chain(step.right.iter()) {
                let leaf = ClassSet::from([name.clone()]);
                if !current.contains_key(&leaf) {
                    nodes.push(DendrogramNode {
                        members: leaf.clone(),
                        height: 0.0,
                        depth: 0,
                        children: None,
                    });
                    current.insert(leaf, nodes.len() - 1);
                }
            }
        }

        for (index, step) in merges.iter().enumerate() {
            if !step.left.is_disjoint(&step.right) {
                bail!(LensError::inconsistent_dendrogram(
                    index,
                    format!(
                        "sides overlap ({} | {})",
                        canonical_key(&step.left),
                        canonical_key(&step.right)
                    ),
                ));
            }
            let left = take_current(&mut current, &step.left, index)?;
            let right = take_current(&mut current, &step.right, index)?;

            let members = step.merged();
            nodes.push(DendrogramNode {
                members: members.clone(),
                height: step.score,
                depth: 1 + nodes[left].depth.max(nodes[right].depth),
                children: Some((left, right)),
            });
            current.insert(members, nodes.len() - 1);
        }

        // Largest member set; the latest node wins a size tie.
        let root = nodes
            .iter()
            .enumerate()
            .max_by_key(|(id, n)| (n.members.len(), *id))
            .map(|(id, _)| id);

        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &DendrogramNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Members of the subtree rooted at `id`.
    pub fn members(&self, id: NodeId) -> &ClassSet {
        &self.nodes[id].members
    }

    pub fn height(&self, id: NodeId) -> f64 {
        self.nodes[id].height
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.nodes[id].depth
    }

    pub fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        self.nodes[id].children
    }

    /// Number of classes under the root (M).
    pub fn class_count(&self) -> usize {
        self.root.map(|r| self.nodes[r].members.len()).unwrap_or(0)
    }

    /// Leaves under `id`, left subtree before right subtree.
    pub fn leaves(&self, id: NodeId) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            match self.nodes[n].children {
                Some((left, right)) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => out.extend(self.nodes[n].members.iter().map(String::as_str)),
            }
        }
        out
    }

    /// Serializable copy of the subtree at `id`.
    pub fn to_view(&self, id: NodeId) -> DendrogramView {
        let node = &self.nodes[id];
        let children = match node.children {
            Some((left, right)) => vec![self.to_view(left), self.to_view(right)],
            None => Vec::new(),
        };
        DendrogramView {
            members: node.members.clone(),
            height: node.height,
            depth: node.depth,
            children,
        }
    }
}

fn take_current(
    current: &mut BTreeMap<ClassSet, NodeId>,
    set: &ClassSet,
    step: usize,
) -> Result<NodeId> {
    current.remove(set).ok_or_else(|| {
        LensError::inconsistent_dendrogram(
            step,
            format!("{{{}}} is not a current cluster", canonical_key(set)),
        )
        .into()
    })
}
