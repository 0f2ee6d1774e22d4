//! # Saju Facts
//!
//! The data layer of the scoring engine. This crate owns everything rules
//! read from and nothing about how rules are compiled or scored.
//!
//! ## Core Components
//!
//! - **value / context**: Dotted fact paths and the nested fact context
//! - **expr**: A small pure expression language evaluated against a context
//! - **graph**: Lazily evaluated, memoized fact graph with an audit trace
//! - **template**: Placeholder substitution for explanation strings
//! - **taxonomy**: Domain enumerations (elements, ten gods, patterns, ...)
//!
//! ## Design Philosophy
//!
//! - **Absent, not failing**: Unresolved facts read as `Value::Missing`
//! - **Per-request state**: Graph evaluation owns its memo and visit state for one call
//! - **Data first**: Expressions and values round-trip through serde so rules stay data

pub mod context;
pub mod error;
pub mod expr;
pub mod graph;
pub mod taxonomy;
pub mod template;
pub mod value;

pub use context::*;
pub use error::*;
pub use expr::*;
pub use graph::*;
pub use taxonomy::*;
pub use value::*;
