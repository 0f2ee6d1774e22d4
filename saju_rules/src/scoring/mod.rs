//! Rule evaluator - applies a compiled rule set to a populated context.
//!
//! Rules run in rule-set order. A rule whose gate is truthy adds every score
//! expression to its category and appends one rendered explanation there.
//!
//! Each rule is all-or-nothing: the gate and every score expression are
//! evaluated before any amount is committed, so a failing rule never leaves a
//! partial contribution behind. What happens to the failure is decided by
//! [`RuleErrorPolicy`].
//!
//! # Explanations
//!
//! Explanation templates may use `{amount}`, `{category}`, `{rule_id}` and
//! `{=some.fact.path}` (the fact's current value). Anything else, including a
//! fact that is missing, is kept verbatim.

mod aggregate;

pub use aggregate::*;

use saju_facts::template::render;
use saju_facts::{Context, FactPath, Value};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, instrument, warn};

use crate::error::ScoreError;
use crate::rule::{CategoryKey, Rule, RuleSet};

/// What to do with a rule that fails to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleErrorPolicy {
    /// Drop the rule's contribution and record a diagnostic.
    #[default]
    Skip,

    /// Stop scoring and return the error.
    Abort,
}

/// Configuration for the rule evaluator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub error_policy: RuleErrorPolicy,
}

/// Scores rule sets against contexts.
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator {
    config: ScoringConfig,
}

impl RuleEvaluator {
    /// Create a new evaluator with the given configuration.
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Create an evaluator with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ScoringConfig::default())
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score every rule of the set against the context.
    ///
    /// Only fails under [`RuleErrorPolicy::Abort`].
    #[instrument(level = "debug", skip_all, fields(rule_set = %rule_set.id, rules = rule_set.len()))]
    pub fn evaluate(
        &self,
        rule_set: &RuleSet,
        ctx: &Context,
    ) -> Result<AggregatedScore, ScoreError> {
        score_rule_set(rule_set, ctx, |rule, err, aggregated| {
            match self.config.error_policy {
                RuleErrorPolicy::Abort => Err(err),
                RuleErrorPolicy::Skip => {
                    skip_rule(rule, err, aggregated);
                    Ok(())
                }
            }
        })
    }
}

/// Score a rule set with the default configuration.
///
/// Failing rules are skipped and listed in [`AggregatedScore::diagnostics`].
pub fn evaluate_rules(rule_set: &RuleSet, ctx: &Context) -> AggregatedScore {
    let outcome = score_rule_set(rule_set, ctx, |rule, err, aggregated| {
        skip_rule(rule, err, aggregated);
        Ok::<(), Infallible>(())
    });
    match outcome {
        Ok(aggregated) => aggregated,
        Err(never) => match never {},
    }
}

/// The scoring loop shared by every entry point. `on_failure` decides whether
/// a failing rule stops the pass.
fn score_rule_set<E>(
    rule_set: &RuleSet,
    ctx: &Context,
    mut on_failure: impl FnMut(&Rule, ScoreError, &mut AggregatedScore) -> Result<(), E>,
) -> Result<AggregatedScore, E> {
    let mut aggregated = AggregatedScore::new();
    let mut fired = 0usize;

    for rule in &rule_set.rules {
        match apply_rule(rule, ctx, &mut aggregated) {
            Ok(true) => fired += 1,
            Ok(false) => {}
            Err(err) => on_failure(rule, err, &mut aggregated)?,
        }
    }

    debug!(
        fired,
        categories = aggregated.len(),
        skipped = aggregated.diagnostics.len(),
        "Scored rule set"
    );
    Ok(aggregated)
}

/// Commit a rule's contributions. Returns whether the gate opened.
fn apply_rule(
    rule: &Rule,
    ctx: &Context,
    aggregated: &mut AggregatedScore,
) -> Result<bool, ScoreError> {
    let Some(amounts) = score_rule(rule, ctx)? else {
        return Ok(false);
    };
    for (key, amount) in amounts {
        let explain = render_explain(rule, &key, amount, ctx);
        aggregated.add(
            key,
            Contribution {
                rule_id: rule.id.clone(),
                amount,
                explain,
            },
        );
    }
    Ok(true)
}

fn skip_rule(rule: &Rule, err: ScoreError, aggregated: &mut AggregatedScore) {
    warn!(rule = %rule.id, error = %err, "Skipping rule");
    aggregated.diagnostics.push(RuleDiagnostic {
        rule_id: rule.id.clone(),
        message: err.to_string(),
    });
}

/// Evaluate one rule completely.
///
/// `None` when the gate is not truthy, otherwise every amount in key order.
fn score_rule(
    rule: &Rule,
    ctx: &Context,
) -> Result<Option<Vec<(CategoryKey, f64)>>, ScoreError> {
    let gate = rule.when.evaluate(ctx).map_err(|source| ScoreError::Eval {
        rule_id: rule.id.clone(),
        source,
    })?;
    if !gate.is_truthy() {
        return Ok(None);
    }

    let mut amounts = Vec::with_capacity(rule.score.len());
    for (key, expr) in &rule.score {
        let value = expr.evaluate(ctx).map_err(|source| ScoreError::Eval {
            rule_id: rule.id.clone(),
            source,
        })?;
        match value {
            Value::Number(amount) => amounts.push((key.clone(), amount)),
            other => {
                return Err(ScoreError::NonNumericScore {
                    rule_id: rule.id.clone(),
                    category: key.to_string(),
                    found: other.type_name(),
                })
            }
        }
    }
    Ok(Some(amounts))
}

fn render_explain(rule: &Rule, key: &CategoryKey, amount: f64, ctx: &Context) -> String {
    render(&rule.explain, |name| match name {
        "amount" => Some(amount.to_string()),
        "category" => Some(key.to_string()),
        "rule_id" => Some(rule.id.clone()),
        _ => {
            let path = name.strip_prefix('=')?;
            ctx.lookup(&FactPath::new(path))
                .filter(|v| !v.is_missing())
                .map(|v| v.to_string())
        }
    })
}
