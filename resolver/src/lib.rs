//! Resolution engine binding record schemas to command-line flags.
//!
//! Schemas from [`arg_schema_core`] are registered with a [`Session`],
//! which flattens them into a node tree, resolves flag-name conflicts
//! under a [`ConflictPolicy`], resolves polymorphic subgroup choices in
//! rounds, parses the token stream, and reconstructs nested instances
//! bottom-up as `serde_json::Value` records.
//!
//! # Example
//!
//! ```
//! use arg_schema_core::{FieldSpec, Schema, ValueKind};
//! use arg_schema_resolver::Session;
//! use serde_json::json;
//!
//! let schema = Schema::builder("Point")
//!     .field(FieldSpec::scalar("x", ValueKind::Int).with_default(json!(0)))
//!     .field(FieldSpec::scalar("y", ValueKind::Int).with_default(json!(0)))
//!     .build();
//!
//! let mut session = Session::default();
//! session.register(schema, "p")?;
//! let outcome = session.resolve_and_parse(&["--x".to_string(), "7".to_string()])?;
//! assert_eq!(outcome.instance("p"), Some(&json!({"x": 7, "y": 0})));
//! # Ok::<(), arg_schema_resolver::ResolveError>(())
//! ```

mod conflicts;
mod defaults;
mod engine;
mod error;
mod help;
mod instantiate;
mod node;
mod session;
mod subgroups;

pub use conflicts::ConflictPolicy;
pub use defaults::{load_defaults, merge_defaults};
pub use engine::{FlagEngine, FlagSpec, Namespace, StdFlagEngine};
pub use error::{ResolveError, Result};
pub use help::{HelpLookup, StaticHelp};
pub use node::{FieldNode, Node, NodeArena, NodeId};
pub use session::{Outcome, Session};
