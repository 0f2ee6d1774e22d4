//! Analysis pipeline - fact graph evaluation followed by rule scoring.
//!
//! The pipeline works as follows:
//! 1. **Seed**: Start from the caller's context of known facts
//! 2. **Derive**: Evaluate the wanted graph nodes against the seed
//! 3. **Publish**: Write every computed node into the context at its id
//! 4. **Score**: Apply the rule set to the populated context

use saju_facts::{Context, Graph, NodeId, Trace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::AnalysisError;
use crate::rule::RuleSet;
use crate::scoring::{AggregatedScore, RuleEvaluator, ScoringConfig};

/// Everything one analysis produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// The seed plus every derived fact.
    pub context: Context,
    pub trace: Trace,
    pub scores: AggregatedScore,
}

/// A graph and a compiled rule set, reusable across requests.
#[derive(Debug, Clone)]
pub struct Analysis {
    graph: Graph,
    rule_set: Arc<RuleSet>,
    evaluator: RuleEvaluator,
}

impl Analysis {
    pub fn new(graph: Graph, rule_set: impl Into<Arc<RuleSet>>) -> Self {
        Self {
            graph,
            rule_set: rule_set.into(),
            evaluator: RuleEvaluator::with_defaults(),
        }
    }

    /// Use a specific scoring configuration.
    pub fn with_scoring(mut self, config: ScoringConfig) -> Self {
        self.evaluator = RuleEvaluator::new(config);
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    /// Run one analysis. Per-request state is created here and dropped on return.
    #[instrument(level = "debug", skip_all, fields(rule_set = %self.rule_set.id))]
    pub fn run<I, T>(&self, seed: Context, wanted: I) -> Result<AnalysisReport, AnalysisError>
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        let evaluation = self.graph.evaluate(&seed, wanted)?;

        let mut context = seed;
        evaluation.write_into(&mut context);
        debug!(derived = evaluation.results.len(), "Published derived facts");

        let scores = self.evaluator.evaluate(&self.rule_set, &context)?;

        Ok(AnalysisReport {
            context,
            trace: evaluation.trace,
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::builtin_rule_set;
    use crate::error::ScoreError;
    use crate::rule::Rule;
    use crate::scoring::RuleErrorPolicy;
    use saju_facts::{Expr, GraphError, GraphNode, Value};
    use serde_json::json;

    fn seed() -> Context {
        Context::from_json(json!({
            "month": { "gyeok": {
                "pattern": "siksin",
                "element": "earth",
                "quality": {
                    "confidence": 0.8,
                    "clarity": 0.7,
                    "broken": false,
                    "mixed": false,
                    "grade": "high"
                }
            } },
            "ten_gods": { "siksin": { "count": 2 } },
            "roles": { "yongsin": "water" }
        }))
    }

    fn graph() -> Graph {
        Graph::new()
            .with_node(GraphNode::from_context(
                "raw.confidence",
                "month.gyeok.quality.confidence",
            ))
            .with_node(
                GraphNode::new("month.gyeok.quality.multiplier", |_, inputs| {
                    let confidence = inputs.number("raw.confidence")?;
                    Ok(Value::Number(0.5 + confidence / 2.0))
                })
                .with_deps(["raw.confidence"])
                .with_formula("0.5 + confidence / 2")
                .with_explain("Confidence-weighted gyeok multiplier"),
            )
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_end_to_end_with_builtin_rules() {
        let analysis = Analysis::new(graph(), builtin_rule_set().unwrap().clone());
        let report = analysis
            .run(seed(), ["month.gyeok.quality.multiplier"])
            .unwrap();

        let multiplier = report
            .context
            .get(&"month.gyeok.quality.multiplier".into())
            .as_number()
            .unwrap();
        assert!(approx(multiplier, 0.9));
        assert_eq!(report.trace.nodes.len(), 2);

        let scores = &report.scores;
        // base 10 x 0.9, clear gyeok 4, two siksin at 1.5 each
        assert!(approx(scores.total("siksin"), 16.0));
        assert!(approx(scores.total("element.earth"), 2.0));
        assert!(approx(scores.total("element.water"), 3.0));
        assert!(approx(scores.total("quality"), 4.0));
        assert_eq!(scores.len(), 4);
        assert!(scores.diagnostics.is_empty());
        assert_eq!(scores.leader().map(|(k, _)| k.as_str()), Some("siksin"));

        let ids: Vec<_> = scores
            .get("siksin")
            .unwrap()
            .contributions
            .iter()
            .map(|c| c.rule_id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["gyeok.base.siksin", "gyeok.clear.siksin", "tengod.siksin"]
        );
    }

    #[test]
    fn test_suppression_and_penalties() {
        let mut ctx = seed();
        ctx.set(&"patterns.jongwang.strength".into(), 0.75);
        ctx.set(&"month.gyeok.quality.mixed".into(), true);
        ctx.set(&"month.gyeok.quality.mixed_ratio".into(), 0.5);

        let analysis = Analysis::new(graph(), builtin_rule_set().unwrap().clone());
        let report = analysis
            .run(ctx, ["month.gyeok.quality.multiplier"])
            .unwrap();

        // 16 - 8 x 0.75
        assert!(approx(report.scores.total("siksin"), 10.0));
        // high grade 4, mixed penalty -3 x 0.5
        assert!(approx(report.scores.total("quality"), 2.5));
        assert!(report.scores.get("jongwang").is_none());
    }

    #[test]
    fn test_graph_errors_abort() {
        let analysis = Analysis::new(graph(), RuleSet::empty());
        let err = analysis.run(seed(), ["nope"]).unwrap_err();
        assert_eq!(err, AnalysisError::Graph(GraphError::UnknownNode("nope".into())));
    }

    #[test]
    fn test_score_errors_follow_policy() {
        let rules = RuleSet::new(
            "test",
            "1",
            vec![Rule::new("bad", Expr::lit(true)).with_score("a", Expr::var("nothing"))],
        );

        let lenient = Analysis::new(Graph::new(), rules.clone());
        let report = lenient.run(Context::new(), Vec::<NodeId>::new()).unwrap();
        assert_eq!(report.scores.diagnostics.len(), 1);

        let strict = Analysis::new(Graph::new(), rules).with_scoring(ScoringConfig {
            error_policy: RuleErrorPolicy::Abort,
        });
        let err = strict.run(Context::new(), Vec::<NodeId>::new()).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Score(ScoreError::NonNumericScore { .. })
        ));
    }
}
