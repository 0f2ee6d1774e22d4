//! Score specifications and per-iteration template bindings.

use saju_facts::template::render_with;
use saju_facts::Expr;
use serde::{Deserialize, Serialize};

/// How much a generated rule scores.
///
/// In data form either a bare number or `{ base = 4.0, scale_by = "path" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreSpec {
    /// A fixed amount.
    Constant(f64),

    /// A fixed amount multiplied by a fact, so partial matches score proportionally.
    Scaled { base: f64, scale_by: String },
}

impl ScoreSpec {
    /// Build the score expression, filling `scale_by` from the bindings.
    pub fn to_expr(&self, bindings: &Bindings) -> Expr {
        match self {
            ScoreSpec::Constant(amount) => Expr::lit(*amount),
            ScoreSpec::Scaled { base, scale_by } => {
                Expr::mul(vec![Expr::lit(*base), Expr::var(bindings.fill(scale_by))])
            }
        }
    }

    /// The same spec with its base amount negated in magnitude (always <= 0).
    pub fn as_penalty(&self) -> ScoreSpec {
        match self {
            ScoreSpec::Constant(amount) => ScoreSpec::Constant(-amount.abs()),
            ScoreSpec::Scaled { base, scale_by } => ScoreSpec::Scaled {
                base: -base.abs(),
                scale_by: scale_by.clone(),
            },
        }
    }
}

/// Iteration keys bound during one expansion step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: Vec<(&'static str, String)>,
}

impl Bindings {
    /// Bind a placeholder name to a value.
    pub fn bind(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.entries.push((name, value.into()));
        self
    }

    /// Substitute bound placeholders. Unbound ones stay verbatim.
    pub fn fill(&self, template: &str) -> String {
        let pairs: Vec<(&str, &str)> = self
            .entries
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        render_with(template, &pairs)
    }

    /// `prefix.key1.key2...` in binding order.
    pub fn rule_id(&self, prefix: &str) -> String {
        let mut id = prefix.to_string();
        for (_, value) in &self.entries {
            id.push('.');
            id.push_str(value);
        }
        id
    }
}
