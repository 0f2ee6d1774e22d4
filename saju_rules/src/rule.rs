//! Compiled rules and rule sets.

use saju_facts::{Expr, FactPath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// The named score bucket a rule contributes to (usually a pattern name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryKey(String);

impl CategoryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CategoryKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CategoryKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An atomic scoring rule: a gate, keyed score expressions, and an explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,

    /// Gate; the rule contributes only when this is truthy.
    pub when: Expr,

    /// Score expression per category. Iterated in key order.
    #[serde(default)]
    pub score: BTreeMap<CategoryKey, Expr>,

    /// Explanation template rendered per contribution.
    #[serde(default)]
    pub explain: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Rule {
    /// Create a rule with a gate and no score entries.
    pub fn new(id: impl Into<String>, when: Expr) -> Self {
        Self {
            id: id.into(),
            when,
            score: BTreeMap::new(),
            explain: String::new(),
            tags: Vec::new(),
        }
    }

    /// Add a score expression for a category.
    pub fn with_score(mut self, key: impl Into<CategoryKey>, expr: Expr) -> Self {
        self.score.insert(key.into(), expr);
        self
    }

    /// Set the explanation template.
    pub fn with_explain(mut self, explain: impl Into<String>) -> Self {
        self.explain = explain.into();
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Check if this rule carries a tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// An ordered, versioned collection of compiled rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(id: impl Into<String>, version: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            description: None,
            rules,
        }
    }

    /// A rule set with no rules.
    pub fn empty() -> Self {
        Self::new("empty", "0", Vec::new())
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Get a rule by id.
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Rule ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every category any rule can contribute to.
    pub fn categories(&self) -> BTreeSet<&CategoryKey> {
        self.rules.iter().flat_map(|r| r.score.keys()).collect()
    }

    /// Every fact path read by any gate or score expression.
    pub fn referenced_paths(&self) -> BTreeSet<FactPath> {
        let mut paths = BTreeSet::new();
        for rule in &self.rules {
            paths.extend(rule.when.paths());
            for expr in rule.score.values() {
                paths.extend(expr.paths());
            }
        }
        paths
    }

    /// Rules carrying a tag.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Rule> {
        self.rules.iter().filter(move |r| r.has_tag(tag))
    }

    /// First id that appears more than once, if any.
    pub fn first_duplicate_id(&self) -> Option<&str> {
        first_duplicate(&self.rules)
    }
}

pub(crate) fn first_duplicate(rules: &[Rule]) -> Option<&str> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .map(|r| r.id.as_str())
        .find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> RuleSet {
        RuleSet::new(
            "test",
            "1",
            vec![
                Rule::new("r1", Expr::var("month.gyeok.pattern"))
                    .with_score("jeonggwan", Expr::lit(5))
                    .with_tag("pattern"),
                Rule::new("r2", Expr::lit(true))
                    .with_score("siksin", Expr::var("ten_gods.siksin.count"))
                    .with_score("jeonggwan", Expr::lit(-2)),
            ],
        )
    }

    #[test]
    fn test_lookup_and_ids() {
        let set = sample();
        assert_eq!(set.len(), 2);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["r1", "r2"]);
        assert!(set.get("r2").is_some());
        assert!(set.get("r3").is_none());
        assert_eq!(set.tagged("pattern").count(), 1);
    }

    #[test]
    fn test_categories_and_paths() {
        let set = sample();
        let categories: Vec<_> = set.categories().into_iter().map(|c| c.as_str()).collect();
        assert_eq!(categories, vec!["jeonggwan", "siksin"]);

        let paths: Vec<_> = set
            .referenced_paths()
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(paths, vec!["month.gyeok.pattern", "ten_gods.siksin.count"]);
    }

    #[test]
    fn test_duplicate_detection() {
        let mut set = sample();
        assert_eq!(set.first_duplicate_id(), None);

        set.rules.push(Rule::new("r1", Expr::lit(false)));
        assert_eq!(set.first_duplicate_id(), Some("r1"));
    }

    #[test]
    fn test_rule_data_form() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "manual.bonus",
            "when": { "op": "eq", "args": [{ "var": "month.gyeok.broken" }, { "lit": false }] },
            "score": { "jeonggwan": { "lit": 2 } },
            "explain": "intact structure"
        }))
        .unwrap();

        assert_eq!(rule.id, "manual.bonus");
        assert_eq!(rule.score[&CategoryKey::from("jeonggwan")], Expr::lit(2));
        assert!(rule.tags.is_empty());
    }
}
