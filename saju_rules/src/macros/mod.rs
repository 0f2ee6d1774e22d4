//! Macro compiler - expansion of parameterized macro records into rules.
//!
//! A [`MacroRecord`] is plain data tagged by `kind`. Compilation dispatches on
//! the closed set of kinds, expands each record in input order, and rejects
//! duplicate rule ids across the whole batch.

mod kinds;
mod quality;
mod score;

pub use kinds::*;
pub use quality::*;
pub use score::*;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{debug, instrument};

use crate::error::{CompileError, CompileResult};
use crate::rule::{first_duplicate, Rule};

/// The closed set of macro kinds understood by the compiler.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum MacroKind {
    PatternScore,
    ElementMatch,
    RoleElement,
    TenGodPresence,
    GradeTable,
    Suppression,
    PenalizeWhen,
    Rule,
}

/// A kind-tagged macro declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MacroRecord {
    PatternScore(PatternScore),
    ElementMatch(ElementMatch),
    RoleElement(RoleElement),
    TenGodPresence(TenGodPresence),
    GradeTable(GradeTable),
    Suppression(Suppression),
    PenalizeWhen(PenalizeWhen),
    /// An explicit rule, passed through unchanged.
    Rule(Rule),
}

impl MacroRecord {
    pub fn kind(&self) -> MacroKind {
        match self {
            MacroRecord::PatternScore(_) => MacroKind::PatternScore,
            MacroRecord::ElementMatch(_) => MacroKind::ElementMatch,
            MacroRecord::RoleElement(_) => MacroKind::RoleElement,
            MacroRecord::TenGodPresence(_) => MacroKind::TenGodPresence,
            MacroRecord::GradeTable(_) => MacroKind::GradeTable,
            MacroRecord::Suppression(_) => MacroKind::Suppression,
            MacroRecord::PenalizeWhen(_) => MacroKind::PenalizeWhen,
            MacroRecord::Rule(_) => MacroKind::Rule,
        }
    }

    /// Expand this record into its rules, in a stable order.
    pub fn expand(&self) -> Vec<Rule> {
        let mut rules = match self {
            MacroRecord::PatternScore(m) => m.expand(),
            MacroRecord::ElementMatch(m) => m.expand(),
            MacroRecord::RoleElement(m) => m.expand(),
            MacroRecord::TenGodPresence(m) => m.expand(),
            MacroRecord::GradeTable(m) => m.expand(),
            MacroRecord::Suppression(m) => m.expand(),
            MacroRecord::PenalizeWhen(m) => m.expand(),
            MacroRecord::Rule(rule) => vec![rule.clone()],
        };

        let kind = self.kind();
        for rule in rules.iter_mut().filter(|r| r.explain.is_empty()) {
            rule.explain = default_explain(kind).to_string();
        }
        rules
    }
}

/// Explanation used when a macro does not supply one.
fn default_explain(kind: MacroKind) -> &'static str {
    match kind {
        MacroKind::PatternScore => "{category}: gyeok pattern matched ({amount})",
        MacroKind::ElementMatch => "{category}: element matched ({amount})",
        MacroKind::RoleElement => "{category}: role carried by element ({amount})",
        MacroKind::TenGodPresence => "{category}: ten god present ({amount})",
        MacroKind::GradeTable => "{category}: quality grade ({amount})",
        MacroKind::Suppression => "{category}: suppressed by a dominant pattern ({amount})",
        MacroKind::PenalizeWhen => "{category}: penalty ({amount})",
        MacroKind::Rule => "{rule_id} ({amount})",
    }
}

/// Compile typed macro records into a flat, ordered rule list.
#[instrument(level = "debug", skip_all, fields(macros = macros.len()))]
pub fn compile_macros(macros: &[MacroRecord]) -> CompileResult<Vec<Rule>> {
    let mut rules = Vec::new();
    for record in macros {
        let expanded = record.expand();
        debug!(kind = %record.kind(), rules = expanded.len(), "Expanded macro");
        rules.extend(expanded);
    }

    if let Some(id) = first_duplicate(&rules) {
        return Err(CompileError::DuplicateRuleId(id.to_string()));
    }

    debug!(rules = rules.len(), "Compiled macros");
    Ok(rules)
}

/// Parse one macro record from its data form.
///
/// The `kind` tag is checked first so an unknown kind is reported as such
/// rather than as a generic parse failure.
pub fn parse_macro_value(value: &serde_json::Value) -> CompileResult<MacroRecord> {
    let kind = match value.get("kind") {
        Some(serde_json::Value::String(kind)) => kind.as_str(),
        Some(other) => {
            return Err(CompileError::InvalidMacro {
                kind: other.to_string(),
                reason: "'kind' must be a string".to_string(),
            })
        }
        None => {
            return Err(CompileError::InvalidMacro {
                kind: String::new(),
                reason: "missing 'kind'".to_string(),
            })
        }
    };

    if kind.parse::<MacroKind>().is_err() {
        return Err(CompileError::UnknownMacroKind(kind.to_string()));
    }

    serde_json::from_value(value.clone()).map_err(|e| CompileError::InvalidMacro {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

/// Compile macro records given in their data form.
pub fn compile_macro_values(values: &[serde_json::Value]) -> CompileResult<Vec<Rule>> {
    let records = values
        .iter()
        .map(parse_macro_value)
        .collect::<CompileResult<Vec<_>>>()?;
    compile_macros(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use saju_facts::{Context, Expr, Pattern, Value};
    use serde_json::json;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    fn pattern_macro(quality: serde_json::Value) -> serde_json::Value {
        json!({
            "kind": "pattern_score",
            "id_prefix": "gyeok.base",
            "score": 10,
            "quality": quality,
        })
    }

    #[test]
    fn test_expansion_count_and_unique_ids() {
        let rules = compile_macro_values(&[pattern_macro(json!({}))]).unwrap();
        assert_eq!(rules.len(), Pattern::iter().count());

        let ids: HashSet<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn test_no_quality_parameters_leave_gate_untouched() {
        let rules = compile_macro_values(&[pattern_macro(json!({}))]).unwrap();
        for (rule, pattern) in rules.iter().zip(Pattern::iter()) {
            assert_eq!(
                rule.when,
                Expr::eq(
                    Expr::var("month.gyeok.pattern"),
                    Expr::lit(pattern.to_string())
                )
            );
        }
    }

    #[test]
    fn test_quality_parameters_add_clauses() {
        let rules = compile_macro_values(&[pattern_macro(json!({
            "min_confidence": 0.5,
            "forbid_broken": true,
            "required_grade": "high"
        }))])
        .unwrap();

        assert_eq!(
            rules[0].when,
            Expr::and(vec![
                Expr::gte(Expr::var("month.gyeok.quality.confidence"), Expr::lit(0.5)),
                Expr::eq(Expr::var("month.gyeok.quality.broken"), Expr::lit(false)),
                Expr::eq(Expr::var("month.gyeok.quality.grade"), Expr::lit("high")),
                Expr::eq(Expr::var("month.gyeok.pattern"), Expr::lit("jeonggwan")),
            ])
        );

        // Strict broken check: an absent flag fails the gate.
        let ctx = Context::from_json(json!({
            "month": { "gyeok": {
                "pattern": "jeonggwan",
                "quality": { "confidence": 0.9, "grade": "high" }
            } }
        }));
        assert_eq!(rules[0].when.evaluate(&ctx).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_suppression_never_targets_winner() {
        let rules = compile_macro_values(&[json!({
            "kind": "suppression",
            "id_prefix": "suppress.A",
            "winner": "A",
            "threshold": 0.5,
            "targets": ["A", "B", "C"],
        })])
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert!(rules
            .iter()
            .all(|r| r.score.keys().all(|k| k.as_str() != "A")));
        assert_eq!(rules[0].explain, default_explain(MacroKind::Suppression));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = compile_macro_values(&[json!({ "kind": "pattern_bonus", "id_prefix": "x" })])
            .unwrap_err();
        assert_eq!(err, CompileError::UnknownMacroKind("pattern_bonus".to_string()));

        let err = compile_macro_values(&[json!({ "id_prefix": "x" })]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidMacro { .. }));
    }

    #[test]
    fn test_malformed_body_is_invalid() {
        let err = compile_macro_values(&[json!({
            "kind": "grade_table",
            "id_prefix": "grade",
        })])
        .unwrap_err();
        match err {
            CompileError::InvalidMacro { kind, .. } => assert_eq!(kind, "grade_table"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = compile_macro_values(&[pattern_macro(json!({})), pattern_macro(json!({}))])
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::DuplicateRuleId("gyeok.base.jeonggwan".to_string())
        );
    }

    #[test]
    fn test_rule_passthrough() {
        let rules = compile_macro_values(&[json!({
            "kind": "rule",
            "id": "manual",
            "when": { "lit": true },
            "score": { "quality": { "lit": 1 } },
            "explain": "always"
        })])
        .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "manual");
        assert_eq!(rules[0].explain, "always");
    }

    #[test]
    fn test_every_kind_parses() {
        for kind in MacroKind::iter() {
            let name: &'static str = kind.into();
            assert_eq!(name.parse::<MacroKind>().unwrap(), kind);

            // The serde tag must agree with the kind name.
            let mut body = minimal_body(kind);
            body["kind"] = json!(name);
            let record = parse_macro_value(&body).unwrap();
            assert_eq!(record.kind(), kind);
        }
    }

    /// Smallest valid body of each kind, without its `kind` tag.
    fn minimal_body(kind: MacroKind) -> serde_json::Value {
        match kind {
            MacroKind::PatternScore
            | MacroKind::ElementMatch
            | MacroKind::RoleElement
            | MacroKind::TenGodPresence => json!({ "id_prefix": "p", "score": 1 }),
            MacroKind::GradeTable => json!({
                "id_prefix": "p",
                "category": "quality",
                "amounts": { "top": 1 }
            }),
            MacroKind::Suppression => json!({
                "id_prefix": "p",
                "winner": "a",
                "threshold": 0.5,
                "targets": ["b"]
            }),
            MacroKind::PenalizeWhen => json!({
                "id": "p",
                "when": { "lit": true },
                "categories": ["quality"],
                "amount": 1
            }),
            MacroKind::Rule => json!({ "id": "p", "when": { "lit": true } }),
        }
    }

    proptest! {
        #[test]
        fn test_compilation_is_deterministic(
            subset in proptest::sample::subsequence(Pattern::iter().collect::<Vec<_>>(), 0..15),
            base in -20.0f64..20.0,
        ) {
            let record = MacroRecord::PatternScore(PatternScore {
                id_prefix: "p".to_string(),
                pattern_path: "month.gyeok.pattern".to_string(),
                patterns: subset.clone(),
                category: "{pattern}".to_string(),
                score: ScoreSpec::Constant(base),
                quality: QualityGate::default(),
                when: None,
                explain: String::new(),
                tags: vec![],
            });

            let first = compile_macros(std::slice::from_ref(&record)).unwrap();
            let second = compile_macros(std::slice::from_ref(&record)).unwrap();
            prop_assert_eq!(&first, &second);

            let expected = if subset.is_empty() { Pattern::iter().count() } else { subset.len() };
            prop_assert_eq!(first.len(), expected);
        }
    }
}
