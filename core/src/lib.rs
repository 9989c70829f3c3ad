//! Core record-schema types and value primitives for `arg-schema`.
//!
//! This crate defines the data model the resolution engine
//! (`arg-schema-resolver`) operates on:
//!
//! - [`Schema`] — a typed, named record: an ordered list of fields.
//! - [`FieldSpec`] — one field with a declared [`FieldKind`]
//!   (scalar, sequence, nested record, or polymorphic subgroup choice).
//! - [`SubgroupSpec`] — a closed enumeration of alternative record schemas,
//!   resolved from the command line at parse time.
//! - [`coerce_scalar`] / [`coerce_sequence`] — raw flag text to
//!   [`serde_json::Value`] coercion by declared kind.
//! - [`validate_schema`] — structural validation (empty or duplicate names,
//!   malformed subgroups) run before registration.
//!
//! Instances are represented as [`serde_json::Value`] trees end to end, so
//! defaults, file-loaded overrides, and constructed records all share one
//! representation and typed extraction is a plain serde step.
//!
//! # Example
//!
//! ```
//! use arg_schema_core::*;
//! use serde_json::json;
//!
//! let optimizer = Schema::builder("Optimizer")
//!     .field(FieldSpec::scalar("lr", ValueKind::Float).with_default(json!(0.001)))
//!     .field(FieldSpec::scalar("momentum", ValueKind::Float).with_default(json!(0.9)))
//!     .build();
//!
//! let train = Schema::builder("Train")
//!     .field(FieldSpec::nested("optimizer", optimizer))
//!     .field(FieldSpec::scalar("epochs", ValueKind::Int).with_default(json!(10)))
//!     .build();
//!
//! assert!(validate_schema(&train).is_empty());
//! assert_eq!(
//!     train.default_instance(),
//!     json!({"optimizer": {"lr": 0.001, "momentum": 0.9}, "epochs": 10})
//! );
//! ```

mod coerce;
mod types;
mod validate;

pub use coerce::{CoerceError, coerce_scalar, coerce_sequence};
pub use types::{
    FieldKind, FieldSpec, Schema, SchemaBuilder, SubgroupDefault, SubgroupSpec, ValueKind,
};
pub use validate::{ValidationError, validate_schema};
