//! Per-category score accumulation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::rule::CategoryKey;

/// One rule's contribution to one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub rule_id: String,
    pub amount: f64,
    /// Rendered explanation.
    pub explain: String,
}

/// Running total of a category plus its contributions in rule order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryScore {
    pub total: f64,
    pub contributions: Vec<Contribution>,
}

/// A rule that was skipped during scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDiagnostic {
    pub rule_id: String,
    pub message: String,
}

/// Totals and explanations for every category touched by a scoring pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedScore {
    pub categories: BTreeMap<CategoryKey, CategoryScore>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<RuleDiagnostic>,
}

impl AggregatedScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an amount to a category (accumulates with the existing total).
    pub fn add(&mut self, key: CategoryKey, contribution: Contribution) {
        let entry = self.categories.entry(key).or_default();
        entry.total += contribution.amount;
        entry.contributions.push(contribution);
    }

    /// Get the score of a category.
    pub fn get(&self, key: &str) -> Option<&CategoryScore> {
        self.categories.get(&CategoryKey::from(key))
    }

    /// Total of a category, zero when nothing contributed.
    pub fn total(&self, key: &str) -> f64 {
        self.get(key).map(|s| s.total).unwrap_or(0.0)
    }

    /// Categories sorted by total (descending), ties broken by key.
    pub fn ranked(&self) -> Vec<(&CategoryKey, f64)> {
        let mut ranked: Vec<_> = self
            .categories
            .iter()
            .map(|(key, score)| (key, score.total))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked
    }

    /// The category with the highest total.
    pub fn leader(&self) -> Option<(&CategoryKey, f64)> {
        self.ranked().into_iter().next()
    }

    /// Number of categories with at least one contribution.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Every contribution made by a rule, across categories.
    pub fn contributions_of<'a>(
        &'a self,
        rule_id: &'a str,
    ) -> impl Iterator<Item = (&'a CategoryKey, &'a Contribution)> {
        self.categories.iter().flat_map(move |(key, score)| {
            score
                .contributions
                .iter()
                .filter(move |c| c.rule_id == rule_id)
                .map(move |c| (key, c))
        })
    }
}
