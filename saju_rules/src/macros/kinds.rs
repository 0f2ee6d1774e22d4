//! Macro kinds and their expansion into rules.
//!
//! Every string field documented as a template may use the iteration keys of
//! its kind (`{pattern}`, `{element}`, `{role}`, `{ten_god}`, `{grade}`,
//! `{winner}`, `{target}`). Explanations keep any other placeholder for the
//! scoring pass to fill.

use saju_facts::{Element, Expr, Grade, Pattern, Role, TenGod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

use super::{Bindings, QualityGate, ScoreSpec};
use crate::rule::Rule;

fn default_pattern_path() -> String {
    "month.gyeok.pattern".to_string()
}

fn default_pattern_category() -> String {
    "{pattern}".to_string()
}

fn default_element_path() -> String {
    "month.gyeok.element".to_string()
}

fn default_element_category() -> String {
    "element.{element}".to_string()
}

fn default_role_path() -> String {
    "roles.{role}".to_string()
}

fn default_role_category() -> String {
    "{role}.{element}".to_string()
}

fn default_ten_god_path() -> String {
    "ten_gods.{ten_god}.count".to_string()
}

fn default_ten_god_category() -> String {
    "{ten_god}".to_string()
}

fn default_grade_path() -> String {
    "month.gyeok.quality.grade".to_string()
}

fn default_strength_path() -> String {
    "patterns.{winner}.strength".to_string()
}

fn default_weight() -> f64 {
    1.0
}

/// The listed variants, or every variant when the list is empty.
fn selected<T: IntoEnumIterator + Copy>(listed: &[T]) -> Vec<T> {
    if listed.is_empty() {
        T::iter().collect()
    } else {
        listed.to_vec()
    }
}

/// Assemble one generated rule.
///
/// The gate is `when ∧ quality ∧ discriminator`, with absent parts left out.
fn generated(
    id: String,
    when: Option<&Expr>,
    quality: &QualityGate,
    discriminator: Expr,
    bindings: &Bindings,
    explain: &str,
    tags: &[String],
) -> Rule {
    let mut clauses: Vec<Expr> = when.cloned().into_iter().collect();
    clauses.extend(quality.clauses(bindings));
    clauses.push(discriminator);

    Rule {
        id,
        when: Expr::all(clauses),
        score: BTreeMap::new(),
        explain: bindings.fill(explain),
        tags: tags.to_vec(),
    }
}

/// Score each gyeok pattern when it is the observed pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternScore {
    pub id_prefix: String,

    #[serde(default = "default_pattern_path")]
    pub pattern_path: String,

    /// Patterns to enumerate; all when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<Pattern>,

    /// Category template.
    #[serde(default = "default_pattern_category")]
    pub category: String,

    pub score: ScoreSpec,

    #[serde(default)]
    pub quality: QualityGate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Expr>,

    #[serde(default)]
    pub explain: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl PatternScore {
    pub fn expand(&self) -> Vec<Rule> {
        selected(&self.patterns)
            .into_iter()
            .map(|pattern| {
                let bindings = Bindings::default().bind("pattern", pattern.to_string());
                let discriminator =
                    Expr::eq(Expr::var(self.pattern_path.as_str()), Expr::lit(pattern.to_string()));
                generated(
                    bindings.rule_id(&self.id_prefix),
                    self.when.as_ref(),
                    &self.quality,
                    discriminator,
                    &bindings,
                    &self.explain,
                    &self.tags,
                )
                .with_score(bindings.fill(&self.category), self.score.to_expr(&bindings))
            })
            .collect()
    }
}

/// Score each element when it is the observed (pattern) element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMatch {
    pub id_prefix: String,

    #[serde(default = "default_element_path")]
    pub element_path: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,

    #[serde(default = "default_element_category")]
    pub category: String,

    pub score: ScoreSpec,

    #[serde(default)]
    pub quality: QualityGate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Expr>,

    #[serde(default)]
    pub explain: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ElementMatch {
    pub fn expand(&self) -> Vec<Rule> {
        selected(&self.elements)
            .into_iter()
            .map(|element| {
                let bindings = Bindings::default().bind("element", element.to_string());
                let discriminator =
                    Expr::eq(Expr::var(self.element_path.as_str()), Expr::lit(element.to_string()));
                generated(
                    bindings.rule_id(&self.id_prefix),
                    self.when.as_ref(),
                    &self.quality,
                    discriminator,
                    &bindings,
                    &self.explain,
                    &self.tags,
                )
                .with_score(bindings.fill(&self.category), self.score.to_expr(&bindings))
            })
            .collect()
    }
}

/// Score every role × element pair where the role is carried by that element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleElement {
    pub id_prefix: String,

    /// Path template holding the element assigned to `{role}`.
    #[serde(default = "default_role_path")]
    pub role_path: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,

    #[serde(default = "default_role_category")]
    pub category: String,

    pub score: ScoreSpec,

    #[serde(default)]
    pub quality: QualityGate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Expr>,

    #[serde(default)]
    pub explain: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl RoleElement {
    pub fn expand(&self) -> Vec<Rule> {
        let elements = selected(&self.elements);
        let mut rules = Vec::new();
        for role in selected(&self.roles) {
            for element in &elements {
                let bindings = Bindings::default()
                    .bind("role", role.to_string())
                    .bind("element", element.to_string());
                let discriminator = Expr::eq(
                    Expr::var(bindings.fill(&self.role_path)),
                    Expr::lit(element.to_string()),
                );
                rules.push(
                    generated(
                        bindings.rule_id(&self.id_prefix),
                        self.when.as_ref(),
                        &self.quality,
                        discriminator,
                        &bindings,
                        &self.explain,
                        &self.tags,
                    )
                    .with_score(bindings.fill(&self.category), self.score.to_expr(&bindings)),
                );
            }
        }
        rules
    }
}

/// Score each ten god whose measure exceeds a minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenGodPresence {
    pub id_prefix: String,

    /// Path template of the measure compared against `min`.
    #[serde(default = "default_ten_god_path")]
    pub path: String,

    #[serde(default)]
    pub min: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ten_gods: Vec<TenGod>,

    #[serde(default = "default_ten_god_category")]
    pub category: String,

    pub score: ScoreSpec,

    #[serde(default)]
    pub quality: QualityGate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Expr>,

    #[serde(default)]
    pub explain: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TenGodPresence {
    pub fn expand(&self) -> Vec<Rule> {
        selected(&self.ten_gods)
            .into_iter()
            .map(|ten_god| {
                let bindings = Bindings::default().bind("ten_god", ten_god.to_string());
                let discriminator =
                    Expr::gt(Expr::var(bindings.fill(&self.path)), Expr::lit(self.min));
                generated(
                    bindings.rule_id(&self.id_prefix),
                    self.when.as_ref(),
                    &self.quality,
                    discriminator,
                    &bindings,
                    &self.explain,
                    &self.tags,
                )
                .with_score(bindings.fill(&self.category), self.score.to_expr(&bindings))
            })
            .collect()
    }
}

/// Fixed amounts per qualitative grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeTable {
    pub id_prefix: String,

    #[serde(default = "default_grade_path")]
    pub grade_path: String,

    /// Category template.
    pub category: String,

    /// Amount per grade; grades absent from the table generate no rule.
    pub amounts: BTreeMap<Grade, f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Expr>,

    #[serde(default)]
    pub explain: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl GradeTable {
    pub fn expand(&self) -> Vec<Rule> {
        Grade::iter()
            .filter_map(|grade| self.amounts.get(&grade).map(|amount| (grade, *amount)))
            .map(|(grade, amount)| {
                let bindings = Bindings::default().bind("grade", grade.to_string());
                let discriminator =
                    Expr::eq(Expr::var(self.grade_path.as_str()), Expr::lit(grade.to_string()));
                generated(
                    bindings.rule_id(&self.id_prefix),
                    self.when.as_ref(),
                    &QualityGate::default(),
                    discriminator,
                    &bindings,
                    &self.explain,
                    &self.tags,
                )
                .with_score(bindings.fill(&self.category), Expr::lit(amount))
            })
            .collect()
    }
}

/// Soft mutual exclusion: once the winner's strength passes a threshold,
/// every other target loses `weight × strength`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suppression {
    pub id_prefix: String,

    /// Category key of the dominant classification.
    pub winner: String,

    /// Path template of the winner's strength.
    #[serde(default = "default_strength_path")]
    pub strength_path: String,

    pub threshold: f64,

    /// Categories to suppress. The winner itself is never penalized.
    pub targets: Vec<String>,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub quality: QualityGate,

    #[serde(default)]
    pub explain: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Suppression {
    pub fn expand(&self) -> Vec<Rule> {
        self.targets
            .iter()
            .filter(|target| **target != self.winner)
            .map(|target| {
                let winner_only = Bindings::default().bind("winner", self.winner.as_str());
                let strength = Expr::var(winner_only.fill(&self.strength_path));
                let bindings = winner_only.bind("target", target.as_str());

                let discriminator = Expr::gt(strength.clone(), Expr::lit(self.threshold));
                generated(
                    Bindings::default()
                        .bind("target", target.as_str())
                        .rule_id(&self.id_prefix),
                    None,
                    &self.quality,
                    discriminator,
                    &bindings,
                    &self.explain,
                    &self.tags,
                )
                .with_score(
                    target.as_str(),
                    Expr::mul(vec![Expr::lit(-self.weight.abs()), strength]),
                )
            })
            .collect()
    }
}

/// An ad hoc penalty gated by an arbitrary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenalizeWhen {
    pub id: String,

    pub when: Expr,

    pub categories: Vec<String>,

    /// Penalty magnitude; always applied as a negative amount.
    pub amount: f64,

    /// Optional fact the penalty is multiplied by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_by: Option<String>,

    #[serde(default)]
    pub explain: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl PenalizeWhen {
    pub fn expand(&self) -> Vec<Rule> {
        let spec = match &self.scale_by {
            Some(path) => ScoreSpec::Scaled {
                base: self.amount,
                scale_by: path.clone(),
            },
            None => ScoreSpec::Constant(self.amount),
        }
        .as_penalty();

        let bindings = Bindings::default();
        let mut rule = Rule {
            id: self.id.clone(),
            when: self.when.clone(),
            score: BTreeMap::new(),
            explain: self.explain.clone(),
            tags: self.tags.clone(),
        };
        for category in &self.categories {
            rule = rule.with_score(category.as_str(), spec.to_expr(&bindings));
        }
        vec![rule]
    }
}
