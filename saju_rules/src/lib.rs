//! # Saju Rules
//!
//! Turns declarative macro records into concrete scoring rules and applies
//! them to a populated fact context.
//!
//! ## Core Components
//!
//! - **rule**: Compiled rules and versioned rule sets
//! - **macros**: Expansion of parameterized macro records into rules
//! - **compose**: Merging rule specs with a base rule set (append/prepend/replace)
//! - **scoring**: Gate evaluation and per-category score aggregation
//! - **pipeline**: Fact graph evaluation followed by scoring, in one call
//!
//! ## Design Philosophy
//!
//! - **Compile once**: Rule sets are immutable data, shared across requests
//! - **Deterministic**: Fixed inputs yield the same rules, totals, and explanation order
//! - **Loud configuration errors**: Unknown macro kinds and duplicate ids never pass silently

pub mod compose;
pub mod error;
pub mod macros;
pub mod pipeline;
pub mod rule;
pub mod scoring;

pub use compose::*;
pub use error::*;
pub use macros::*;
pub use pipeline::*;
pub use rule::*;
pub use scoring::*;
