//! Error types for rule compilation and scoring.

use saju_facts::{EvalError, GraphError};
use thiserror::Error;

/// Configuration errors raised while compiling macros or composing rule specs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("unknown macro kind '{0}'")]
    UnknownMacroKind(String),

    #[error("invalid '{kind}' macro: {reason}")]
    InvalidMacro { kind: String, reason: String },

    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),

    #[error("failed to parse rule spec: {0}")]
    Parse(String),
}

/// A single rule that could not be scored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("rule '{rule_id}' failed to evaluate: {source}")]
    Eval { rule_id: String, source: EvalError },

    #[error("rule '{rule_id}' scored {found} for '{category}', expected a number")]
    NonNumericScore {
        rule_id: String,
        category: String,
        found: &'static str,
    },
}

impl ScoreError {
    /// The id of the rule that failed.
    pub fn rule_id(&self) -> &str {
        match self {
            ScoreError::Eval { rule_id, .. } | ScoreError::NonNumericScore { rule_id, .. } => {
                rule_id
            }
        }
    }
}

/// Failures of a full analysis run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Score error: {0}")]
    Score(#[from] ScoreError),
}

pub type CompileResult<T> = Result<T, CompileError>;
