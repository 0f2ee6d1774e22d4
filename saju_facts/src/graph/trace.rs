//! Audit trace of a graph evaluation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::NodeId;
use crate::value::Value;

/// One audit record per node computed in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceNode {
    pub id: NodeId,
    pub deps: Vec<NodeId>,
    pub formula: String,
    pub explain: String,
    /// Every input the computation saw, declared or looked up on demand.
    pub input: BTreeMap<NodeId, Value>,
    pub output: Value,
}

/// A `from -> to` dependency edge: `to` consumed `from`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceEdge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Nodes in completion order plus deduplicated edges in discovery order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trace {
    pub nodes: Vec<TraceNode>,
    pub edges: Vec<TraceEdge>,
}

impl Trace {
    /// Get the record of a node.
    pub fn node(&self, id: &NodeId) -> Option<&TraceNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Direct inputs of a node according to the recorded edges.
    pub fn inputs_of(&self, id: &NodeId) -> Vec<&NodeId> {
        self.edges
            .iter()
            .filter(|e| &e.to == id)
            .map(|e| &e.from)
            .collect()
    }

    /// Every node the given node transitively depended on, sorted by id.
    pub fn lineage(&self, id: &NodeId) -> Vec<NodeId> {
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        let mut pending = vec![id.clone()];

        while let Some(current) = pending.pop() {
            for upstream in self.inputs_of(&current) {
                if seen.insert(upstream.clone()) {
                    pending.push(upstream.clone());
                }
            }
        }

        seen.remove(id);
        seen.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn edge(from: &str, to: &str) -> TraceEdge {
        TraceEdge {
            from: from.into(),
            to: to.into(),
        }
    }

    #[test]
    fn test_lineage() {
        let trace = Trace {
            nodes: vec![],
            edges: vec![
                edge("a", "b"),
                edge("a", "c"),
                edge("b", "c"),
                edge("c", "d"),
                edge("x", "y"),
            ],
        };

        let lineage: Vec<_> = trace
            .lineage(&"d".into())
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(lineage, vec!["a", "b", "c"]);
        assert!(trace.lineage(&"a".into()).is_empty());
    }

    #[test]
    fn test_inputs_of() {
        let trace = Trace {
            nodes: vec![],
            edges: vec![edge("a", "c"), edge("b", "c"), edge("a", "b")],
        };
        let inputs: Vec<_> = trace.inputs_of(&"c".into()).into_iter().cloned().collect();
        assert_eq!(inputs, vec![NodeId::from("a"), NodeId::from("b")]);
    }
}
