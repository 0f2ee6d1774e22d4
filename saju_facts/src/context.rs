//! Fact context - the nested collection of known and derived facts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::{FactPath, Value};

/// The complete set of facts available to graph nodes and rules.
///
/// Facts are stored as a nested map keyed by path segments. Reads never fail:
/// anything that does not resolve reads as [`Value::Missing`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    root: BTreeMap<String, Value>,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Non-object documents yield an empty context.
    pub fn from_json(json: serde_json::Value) -> Self {
        match Value::from(json) {
            Value::Map(root) => Self { root },
            _ => Self::default(),
        }
    }

    /// Resolve a dotted path.
    pub fn get(&self, path: &FactPath) -> Value {
        self.lookup(path).cloned().unwrap_or_default()
    }

    /// Resolve a dotted path without cloning.
    pub fn lookup(&self, path: &FactPath) -> Option<&Value> {
        let mut segments = path.segments();
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            match current {
                Value::Map(entries) => current = entries.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Check if a fact is present (and not explicitly missing).
    pub fn contains(&self, path: &FactPath) -> bool {
        self.lookup(path).is_some_and(|v| !v.is_missing())
    }

    /// Set a fact, creating intermediate maps along the path.
    ///
    /// A scalar sitting where an intermediate map is needed is replaced.
    pub fn set(&mut self, path: &FactPath, value: impl Into<Value>) {
        let segments: Vec<&str> = path.segments().collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut current = &mut self.root;
        for segment in parents {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            if !matches!(slot, Value::Map(_)) {
                *slot = Value::Map(BTreeMap::new());
            }
            current = match slot {
                Value::Map(next) => next,
                _ => return,
            };
        }
        current.insert(last.to_string(), value.into());
    }

    /// Store any serializable value (typically a typed fact struct) at a path.
    pub fn insert_serialized<T: Serialize>(
        &mut self,
        path: &FactPath,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(value)?;
        self.set(path, Value::from(json));
        Ok(())
    }

    /// Deep-merge another context into this one. Values from `other` win.
    pub fn merge(&mut self, other: &Context) {
        merge_maps(&mut self.root, &other.root);
    }

    /// Top-level fact names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.root.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

fn merge_maps(target: &mut BTreeMap<String, Value>, source: &BTreeMap<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Map(existing)), Value::Map(incoming)) => merge_maps(existing, incoming),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get_nested() {
        let mut ctx = Context::new();
        ctx.set(&"month.gyeok.pattern".into(), "jeonggwan");
        ctx.set(&"month.gyeok.quality.multiplier".into(), 0.8);

        assert_eq!(ctx.get(&"month.gyeok.pattern".into()), Value::from("jeonggwan"));
        assert_eq!(
            ctx.get(&"month.gyeok.quality.multiplier".into()),
            Value::Number(0.8)
        );
        assert!(matches!(ctx.get(&"month.gyeok".into()), Value::Map(_)));
    }

    #[test]
    fn test_missing_paths() {
        let ctx = Context::from_json(json!({ "month": { "stem": "gap" } }));

        assert_eq!(ctx.get(&"month.branch".into()), Value::Missing);
        assert_eq!(ctx.get(&"year".into()), Value::Missing);
        // Indexing through a scalar is absent, not an error.
        assert_eq!(ctx.get(&"month.stem.element".into()), Value::Missing);
        assert_eq!(ctx.get(&"".into()), Value::Missing);
    }

    #[test]
    fn test_set_replaces_scalar_parent() {
        let mut ctx = Context::new();
        ctx.set(&"day".into(), 3.0);
        ctx.set(&"day.stem".into(), "byeong");

        assert_eq!(ctx.get(&"day.stem".into()), Value::from("byeong"));
    }

    #[test]
    fn test_contains() {
        let ctx = Context::from_json(json!({ "a": { "b": null, "c": false } }));
        assert!(!ctx.contains(&"a.b".into()));
        assert!(ctx.contains(&"a.c".into()));
        assert!(!ctx.contains(&"a.d".into()));
    }

    #[test]
    fn test_insert_serialized() {
        #[derive(Serialize)]
        struct Quality {
            confidence: f64,
            broken: bool,
        }

        let mut ctx = Context::new();
        ctx.insert_serialized(
            &"month.gyeok.quality".into(),
            &Quality {
                confidence: 0.9,
                broken: false,
            },
        )
        .unwrap();

        assert_eq!(
            ctx.get(&"month.gyeok.quality.confidence".into()),
            Value::Number(0.9)
        );
        assert_eq!(
            ctx.get(&"month.gyeok.quality.broken".into()),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_merge() {
        let mut base = Context::from_json(json!({ "a": { "x": 1, "y": 2 }, "b": true }));
        let overlay = Context::from_json(json!({ "a": { "y": 3, "z": 4 } }));

        base.merge(&overlay);

        assert_eq!(base.get(&"a.x".into()), Value::Number(1.0));
        assert_eq!(base.get(&"a.y".into()), Value::Number(3.0));
        assert_eq!(base.get(&"a.z".into()), Value::Number(4.0));
        assert_eq!(base.get(&"b".into()), Value::Bool(true));
    }
}
