//! The built-in default rule set, shipped as TOML data.

use std::sync::OnceLock;
use tracing::debug;

use super::{compile_rule_spec, RuleSpec};
use crate::error::CompileResult;
use crate::rule::RuleSet;

/// Source of the built-in rule spec.
pub const BUILTIN_RULES: &str = include_str!("../../rules/default.toml");

static BUILTIN: OnceLock<CompileResult<RuleSet>> = OnceLock::new();

/// The built-in default rule set, compiled once per process.
pub fn builtin_rule_set() -> CompileResult<&'static RuleSet> {
    BUILTIN
        .get_or_init(|| {
            let spec = RuleSpec::from_toml_str(BUILTIN_RULES)?;
            let rule_set = compile_rule_spec(&spec)?;
            debug!(id = %rule_set.id, rules = rule_set.len(), "Compiled built-in rule set");
            Ok(rule_set)
        })
        .as_ref()
        .map_err(Clone::clone)
}
