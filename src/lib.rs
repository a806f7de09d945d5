//! # Factlog
//!
//! An entity-attribute-value knowledge base with a forward-chaining
//! inference engine and truth maintenance. Clients assert facts of the
//! form `(entity, attribute, value)`; a static rule set derives
//! everything that logically follows, and the engine keeps the closure
//! consistent as base facts are asserted and retracted.
//!
//! ## Pipeline
//!
//! ```text
//! surface patterns (queries / rule declarations)
//!     ↓
//! [Schema Typing]        → typed clauses + variable types
//!     ↓
//! [Planner]              → clauses ordered by boundness
//!     ↓
//! [Evaluator]            → solutions (bindings + justifications)
//!
//! asserted facts
//!     ↓
//! [Supersession]         → cardinality-one conflicts removed
//!     ↓
//! [Rule Saturation]      → derived facts + justification rows
//!     ↓
//! [Garbage Collection]   → unsupported derived facts removed
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use factlog::{
//!     compile_rules, var, Attribute, AttributeSchema, Cardinality,
//!     KnowledgeBase, RuleDecl,
//! };
//!
//! let schema = AttributeSchema::new([
//!     Attribute::string("child_of", Cardinality::Many),
//!     Attribute::string("sibling_of", Cardinality::Many),
//! ]);
//! let rules = compile_rules(
//!     &schema,
//!     &[RuleDecl::new(
//!         "siblings",
//!         [
//!             (var("a"), "child_of", var("p")),
//!             (var("b"), "child_of", var("p")),
//!         ],
//!         [(var("a"), "sibling_of", var("b"))],
//!     )],
//! )?;
//!
//! let mut kb = KnowledgeBase::in_memory(schema, rules);
//! kb.bulk_add([
//!     ("brother", "child_of", "father"),
//!     ("sister", "child_of", "father"),
//! ])?;
//!
//! let siblings = kb.solve([(var("x"), "sibling_of", var("y"))])?;
//! assert_eq!(siblings.len(), 2);
//! # Ok::<(), factlog::Error>(())
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `value` | Ordinal values and ground facts |
//! | `schema` | Attribute declarations |
//! | `pattern` | Untyped surface patterns |
//! | `expr` | Typed expression algebra |
//! | `clause` | Triple patterns |
//! | `query` | Predicates, solutions, planner, evaluator |
//! | `rules` | Rule compilation, matching, persistent catalog |
//! | `store` | Fact store contract + in-memory bitemporal store |
//! | `engine` | Public API and the truth-maintenance write driver |
//! | `config` | Engine configuration |

pub mod clause;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod hash;
pub mod pattern;
pub mod query;
pub mod rules;
pub mod schema;
pub mod store;
pub mod value;

// Re-export the public surface for convenience
pub use crate::clause::Clause;
pub use crate::config::EngineConfig;
pub use crate::engine::KnowledgeBase;
pub use crate::error::{Error, Result};
pub use crate::expr::Context;
pub use crate::pattern::{
    any, is, one_of, var, CmpOp, Operand, Pattern, TriplePattern,
};
pub use crate::query::{Predicate, Solution};
pub use crate::rules::catalog::RuleCatalog;
pub use crate::rules::{compile_rules, Rule, RuleDecl, RuleId};
pub use crate::schema::{Attribute, AttributeSchema, Cardinality};
pub use crate::store::memory::MemoryStore;
pub use crate::store::{AsOf, FactStore, Lookup, StoreError, TxId};
pub use crate::value::{Fact, Ordinal, OrdinalType};
