//! Error types for resolution and parsing.
//!
//! Provides a unified error type covering all failure modes of a parse
//! session: duplicate registrations, unresolvable flag conflicts, merge
//! count mismatches, subgroup default lookup failures, missing required
//! values, coercion failures, and defaults-file I/O. Every error is fatal
//! within its session; none are retried.

use arg_schema_core::{CoerceError, ValidationError};
use thiserror::Error;

/// Errors that can occur while resolving schemas or parsing flags.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A schema failed structural validation at registration.
    #[error("invalid schema: {0}")]
    Schema(#[from] ValidationError),

    /// A second schema was registered at an existing destination.
    #[error("destination '{dest}' is already registered")]
    DuplicateDestination {
        /// The contested destination path.
        dest: String,
    },

    /// A flag-name conflict could not be (or was not allowed to be) fixed.
    #[error("unresolvable conflict over flag '--{flag}' between destinations [{}]", dests.join(", "))]
    ConflictResolution {
        /// The contested flag name.
        flag: String,
        /// Destinations of the conflicting fields.
        dests: Vec<String>,
    },

    /// A merged field received a value count that is neither 1 nor the
    /// number of merged destinations.
    #[error(
        "field '{field}' received {got} value(s), but either 1 or {expected} were expected"
    )]
    InconsistentArgumentCount {
        /// Destination of the merged field.
        field: String,
        /// Number of values supplied.
        got: usize,
        /// Number of merged destinations.
        expected: usize,
    },

    /// A subgroup default instance matched none of the choices.
    #[error("subgroup '{dest}': default does not match any choice")]
    SubgroupDefaultNotFound {
        /// Destination of the subgroup field.
        dest: String,
    },

    /// A subgroup default instance matched more than one choice.
    #[error("subgroup '{dest}': default matches several choices [{}]", keys.join(", "))]
    SubgroupDefaultAmbiguous {
        /// Destination of the subgroup field.
        dest: String,
        /// The keys that matched.
        keys: Vec<String>,
    },

    /// A required field has neither a supplied value nor a default.
    #[error("missing required value for field '{field}' at destination '{dest}'")]
    MissingRequiredField {
        /// Destination of the owning record.
        dest: String,
        /// The field name.
        field: String,
    },

    /// A flag that takes a value was supplied without one.
    #[error("flag '--{flag}' requires a value")]
    MissingFlagValue {
        /// The flag name.
        flag: String,
    },

    /// A supplied value failed coercion to the declared kind.
    #[error("invalid value for flag '--{flag}': {source}")]
    InvalidValue {
        /// The flag name.
        flag: String,
        /// The underlying coercion failure.
        #[source]
        source: CoerceError,
    },

    /// A destination was requested from an outcome that does not hold it.
    #[error("no instance at destination '{dest}'")]
    UnknownDestination {
        /// The requested destination.
        dest: String,
    },

    /// The defaults file is not shaped as nested destination → value maps.
    #[error("invalid defaults file '{path}': {detail}")]
    DefaultsFormat {
        /// Path of the offending file.
        path: String,
        /// What was wrong with it.
        detail: String,
    },

    /// File I/O failure while reading a defaults file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`ResolveError`].
pub type Result<T> = std::result::Result<T, ResolveError>;
