//! Error types for graph and expression evaluation.

use thiserror::Error;

use crate::graph::NodeId;

/// Failures raised while resolving the fact graph.
///
/// All of these indicate a wiring bug in the graph definition rather than bad
/// input, so the current request is aborted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unknown graph node '{0}'")]
    UnknownNode(NodeId),

    #[error("cycle detected at graph node '{0}'")]
    CycleDetected(NodeId),

    #[error("node '{node}' failed to compute: {message}")]
    Compute { node: NodeId, message: String },

    /// Handed to a computation that looked up a node not computed yet. The
    /// evaluator resolves that node and runs the computation again, so this
    /// never escapes an evaluation.
    #[error("lookup of graph node '{0}' deferred until it is resolved")]
    Deferred(NodeId),
}

impl GraphError {
    /// Build a compute failure for a node.
    pub fn compute(node: impl Into<NodeId>, message: impl Into<String>) -> Self {
        GraphError::Compute {
            node: node.into(),
            message: message.into(),
        }
    }
}

/// Failures raised by the expression evaluator.
///
/// Missing facts are not errors; they evaluate to `Value::Missing`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("operator '{op}' expects {expected} argument(s), got {found}")]
    Arity {
        op: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("operator '{op}' expects {expected}, got {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

pub type GraphResult<T> = Result<T, GraphError>;
pub type EvalResult<T> = Result<T, EvalError>;
