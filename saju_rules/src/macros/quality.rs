//! Quality gate - optional clauses shared by the pattern-level macros.

use saju_facts::{Expr, FactPath, Grade};
use serde::{Deserialize, Serialize};

use super::Bindings;

/// Where the quality facts of the current gyeok live unless overridden.
pub const DEFAULT_QUALITY_PATH: &str = "month.gyeok.quality";

/// Optional quality preconditions.
///
/// Each field adds exactly one clause when supplied and nothing when omitted,
/// so an empty gate leaves the macro's own gate untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityGate {
    /// Base path of the quality facts (template).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_clarity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_integrity: Option<f64>,

    /// Require `broken` to be present and false.
    #[serde(default)]
    pub forbid_broken: bool,

    /// Require `mixed` to be present and false.
    #[serde(default)]
    pub forbid_mixed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_grade: Option<Grade>,
}

impl QualityGate {
    /// Check if no constraint is configured.
    pub fn is_empty(&self) -> bool {
        self.clauses(&Bindings::default()).is_empty()
    }

    /// The clauses this gate contributes, in a fixed order.
    pub fn clauses(&self, bindings: &Bindings) -> Vec<Expr> {
        let base = FactPath::new(
            self.path
                .as_deref()
                .map(|p| bindings.fill(p))
                .unwrap_or_else(|| DEFAULT_QUALITY_PATH.to_string()),
        );
        let fact = |name: &str| Expr::var(base.join(name));

        let mut clauses = Vec::new();
        let minimums = [
            ("confidence", self.min_confidence),
            ("clarity", self.min_clarity),
            ("integrity", self.min_integrity),
        ];
        for (name, minimum) in minimums {
            if let Some(minimum) = minimum {
                clauses.push(Expr::gte(fact(name), Expr::lit(minimum)));
            }
        }
        if self.forbid_broken {
            clauses.push(Expr::eq(fact("broken"), Expr::lit(false)));
        }
        if self.forbid_mixed {
            clauses.push(Expr::eq(fact("mixed"), Expr::lit(false)));
        }
        if let Some(grade) = self.required_grade {
            clauses.push(Expr::eq(fact("grade"), Expr::lit(grade.to_string())));
        }
        clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use saju_facts::{Context, Value};
    use serde_json::json;

    #[test]
    fn test_empty_gate_has_no_clauses() {
        let gate = QualityGate::default();
        assert!(gate.is_empty());
        assert!(gate.clauses(&Bindings::default()).is_empty());
    }

    #[test]
    fn test_clauses_only_for_supplied_fields() {
        let gate = QualityGate {
            min_clarity: Some(0.6),
            forbid_broken: true,
            ..Default::default()
        };

        assert_eq!(
            gate.clauses(&Bindings::default()),
            vec![
                Expr::gte(Expr::var("month.gyeok.quality.clarity"), Expr::lit(0.6)),
                Expr::eq(Expr::var("month.gyeok.quality.broken"), Expr::lit(false)),
            ]
        );
    }

    #[test]
    fn test_custom_path_template() {
        let gate = QualityGate {
            path: Some("patterns.{pattern}.quality".to_string()),
            required_grade: Some(Grade::High),
            ..Default::default()
        };
        let bindings = Bindings::default().bind("pattern", "siksin");

        assert_eq!(
            gate.clauses(&bindings),
            vec![Expr::eq(
                Expr::var("patterns.siksin.quality.grade"),
                Expr::lit("high")
            )]
        );
    }

    #[test]
    fn test_gate_semantics() {
        let gate = QualityGate {
            min_confidence: Some(0.5),
            forbid_mixed: true,
            ..Default::default()
        };
        let gate = Expr::all(gate.clauses(&Bindings::default()));

        let passing = Context::from_json(json!({
            "month": { "gyeok": { "quality": { "confidence": 0.8, "mixed": false } } }
        }));
        let absent_flag = Context::from_json(json!({
            "month": { "gyeok": { "quality": { "confidence": 0.8 } } }
        }));

        assert_eq!(gate.evaluate(&passing).unwrap(), Value::Bool(true));
        assert_eq!(gate.evaluate(&absent_flag).unwrap(), Value::Bool(false));
    }
}
