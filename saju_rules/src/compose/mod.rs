//! Ruleset composer - folds compiled rule specs into a base rule set.
//!
//! A sequence of specs is folded left to right. The first spec picks the base
//! (built-in or empty) and merges into it with its own mode; every later spec
//! merges into the running list with its own mode. Ids and versions are
//! last-supplied-wins, descriptions accumulate one per line.

mod builtin;

pub use builtin::*;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{CompileError, CompileResult};
use crate::macros::{compile_macros, parse_macro_value, MacroRecord};
use crate::rule::{first_duplicate, Rule, RuleSet};

/// How compiled rules merge with the rules they are composed onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeMode {
    /// Base rules, then the new ones.
    #[default]
    Append,

    /// New rules, then the base ones.
    Prepend,

    /// Only the new rules.
    Replace,
}

impl ComposeMode {
    /// Merge compiled rules with base rules, preserving both orders.
    pub fn apply(self, base: Vec<Rule>, compiled: Vec<Rule>) -> Vec<Rule> {
        match self {
            ComposeMode::Append => {
                let mut rules = base;
                rules.extend(compiled);
                rules
            }
            ComposeMode::Prepend => {
                let mut rules = compiled;
                rules.extend(base);
                rules
            }
            ComposeMode::Replace => compiled,
        }
    }
}

/// The rule set a composition starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseSelector {
    /// The built-in default rule set.
    #[default]
    Builtin,

    /// No rules.
    Empty,
}

/// A declarative rule spec: metadata, a base, a mode, and macros.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawRuleSpec")]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Only honored on the first spec of a sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<BaseSelector>,

    #[serde(default)]
    pub mode: ComposeMode,

    #[serde(default)]
    pub macros: Vec<MacroRecord>,
}

/// Wire form of [`RuleSpec`]; macros stay untyped until their kind is checked.
#[derive(Debug, Deserialize)]
struct RawRuleSpec {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    base: Option<BaseSelector>,
    #[serde(default)]
    mode: ComposeMode,
    #[serde(default)]
    macros: Vec<serde_json::Value>,
}

impl TryFrom<RawRuleSpec> for RuleSpec {
    type Error = CompileError;

    fn try_from(raw: RawRuleSpec) -> CompileResult<Self> {
        let macros = raw
            .macros
            .iter()
            .map(parse_macro_value)
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Self {
            id: raw.id,
            version: raw.version,
            description: raw.description,
            base: raw.base,
            mode: raw.mode,
            macros,
        })
    }
}

impl RuleSpec {
    pub fn new(macros: Vec<MacroRecord>) -> Self {
        Self {
            macros,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_base(mut self, base: BaseSelector) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_mode(mut self, mode: ComposeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse a spec from JSON.
    ///
    /// Unknown macro kinds surface as [`CompileError::UnknownMacroKind`].
    pub fn from_json_str(json: &str) -> CompileResult<Self> {
        let raw: RawRuleSpec =
            serde_json::from_str(json).map_err(|e| CompileError::Parse(e.to_string()))?;
        Self::try_from(raw)
    }

    /// Parse a spec from TOML.
    pub fn from_toml_str(source: &str) -> CompileResult<Self> {
        let raw: RawRuleSpec =
            toml::from_str(source).map_err(|e| CompileError::Parse(e.to_string()))?;
        Self::try_from(raw)
    }
}

/// Compile a single spec onto its base.
pub fn compile_rule_spec(spec: &RuleSpec) -> CompileResult<RuleSet> {
    compile_rule_specs(std::slice::from_ref(spec))
}

/// Compile and fold a sequence of specs.
///
/// An empty sequence yields the built-in rule set unchanged.
#[instrument(level = "debug", skip_all, fields(specs = specs.len()))]
pub fn compile_rule_specs(specs: &[RuleSpec]) -> CompileResult<RuleSet> {
    let Some(first) = specs.first() else {
        return builtin_rule_set().cloned();
    };

    let base = match first.base.unwrap_or_default() {
        BaseSelector::Builtin => builtin_rule_set()?.clone(),
        BaseSelector::Empty => RuleSet::empty(),
    };
    debug!(base = %base.id, rules = base.len(), "Selected base rule set");

    let mut composed = RuleSet {
        rules: Vec::new(),
        ..base
    };
    let mut running = base.rules;

    for (index, spec) in specs.iter().enumerate() {
        if index > 0 && spec.base.is_some() {
            debug!(index, "Ignoring base selector of a non-leading spec");
        }

        let compiled = compile_macros(&spec.macros)?;
        debug!(index, mode = ?spec.mode, compiled = compiled.len(), "Folding spec");
        running = spec.mode.apply(running, compiled);
        fold_metadata(&mut composed, spec);
    }

    if let Some(id) = first_duplicate(&running) {
        return Err(CompileError::DuplicateRuleId(id.to_string()));
    }

    composed.rules = running;
    debug!(id = %composed.id, rules = composed.len(), "Composed rule set");
    Ok(composed)
}

fn fold_metadata(composed: &mut RuleSet, spec: &RuleSpec) {
    if let Some(id) = &spec.id {
        composed.id = id.clone();
    }
    if let Some(version) = &spec.version {
        composed.version = version.clone();
    }
    if let Some(description) = &spec.description {
        composed.description = Some(match composed.description.take() {
            Some(previous) => format!("{previous}\n{description}"),
            None => description.clone(),
        });
    }
}
