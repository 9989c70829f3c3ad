//! Schema validation.
//!
//! Validates structural invariants of record schemas before they are
//! registered with a parse session, catching errors such as empty names,
//! duplicate fields, and malformed subgroup specs before they cause
//! downstream resolution failures.
//!
//! # Examples
//!
//! ```
//! use arg_schema_core::*;
//!
//! let schema = Schema::builder("Config")
//!     .field(FieldSpec::scalar("name", ValueKind::Str))
//!     .build();
//! assert!(validate_schema(&schema).is_empty());
//!
//! // Invalid: two fields named "name"
//! let bad = Schema::builder("Config")
//!     .field(FieldSpec::scalar("name", ValueKind::Str))
//!     .field(FieldSpec::scalar("name", ValueKind::Int))
//!     .build();
//! assert!(!validate_schema(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{FieldKind, Schema, SubgroupDefault};

/// Schema validation errors.
///
/// Each variant describes a specific structural problem. The `Display` impl
/// names the offending schema path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Schema id is empty or whitespace-only.
    #[error("schema name cannot be empty (at {0})")]
    EmptySchemaName(String),
    /// A field name is empty or whitespace-only.
    #[error("field name cannot be empty (in schema {0})")]
    EmptyFieldName(String),
    /// Two fields (or a field and an alias) in one schema share a name.
    #[error("duplicate field name '{name}' in schema {schema}")]
    DuplicateField {
        /// The duplicated name.
        name: String,
        /// Schema path where the duplicate appears.
        schema: String,
    },
    /// A subgroup field declares no choices.
    #[error("subgroup field '{field}' in schema {schema} has no choices")]
    EmptySubgroup {
        /// The subgroup field name.
        field: String,
        /// Schema path.
        schema: String,
    },
    /// Two choices of one subgroup share a key.
    #[error("duplicate subgroup key '{key}' on field '{field}' in schema {schema}")]
    DuplicateSubgroupKey {
        /// The duplicated key.
        key: String,
        /// The subgroup field name.
        field: String,
        /// Schema path.
        schema: String,
    },
    /// A subgroup default key names a choice that does not exist.
    #[error("subgroup default '{key}' on field '{field}' is not a choice key")]
    UnknownSubgroupDefault {
        /// The missing default key.
        key: String,
        /// The subgroup field name.
        field: String,
    },
}

/// Validates a record schema and every schema nested below it.
///
/// Returns at most one error: scanning stops at the first structural
/// problem, matching the fail-fast behavior of the session.
pub fn validate_schema(schema: &Schema) -> Vec<ValidationError> {
    let mut path = vec![schema.name.clone()];
    validate_at(schema, &mut path)
}

fn validate_at(schema: &Schema, path: &mut Vec<String>) -> Vec<ValidationError> {
    let here = path.join(".");
    let mut errors = Vec::new();

    if schema.name.trim().is_empty() {
        errors.push(ValidationError::EmptySchemaName(here));
        return errors;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for field in &schema.fields {
        let name = field.name.trim();
        if name.is_empty() {
            errors.push(ValidationError::EmptyFieldName(here.clone()));
            return errors;
        }
        for candidate in std::iter::once(name).chain(field.aliases.iter().map(String::as_str)) {
            if !seen.insert(candidate) {
                errors.push(ValidationError::DuplicateField {
                    name: candidate.to_string(),
                    schema: here.clone(),
                });
                return errors;
            }
        }

        match &field.kind {
            FieldKind::Nested { schema: nested, .. } => {
                path.push(field.name.clone());
                errors.extend(validate_at(nested, path));
                path.pop();
                if !errors.is_empty() {
                    return errors;
                }
            }
            FieldKind::Subgroup(spec) => {
                if spec.choices.is_empty() {
                    errors.push(ValidationError::EmptySubgroup {
                        field: field.name.clone(),
                        schema: here.clone(),
                    });
                    return errors;
                }
                let mut keys: HashSet<&str> = HashSet::new();
                for (key, choice) in &spec.choices {
                    if !keys.insert(key) {
                        errors.push(ValidationError::DuplicateSubgroupKey {
                            key: key.clone(),
                            field: field.name.clone(),
                            schema: here.clone(),
                        });
                        return errors;
                    }
                    path.push(field.name.clone());
                    errors.extend(validate_at(choice, path));
                    path.pop();
                    if !errors.is_empty() {
                        return errors;
                    }
                }
                if let Some(SubgroupDefault::Key(key)) = &spec.default {
                    if spec.get(key).is_none() {
                        errors.push(ValidationError::UnknownSubgroupDefault {
                            key: key.clone(),
                            field: field.name.clone(),
                        });
                        return errors;
                    }
                }
            }
            FieldKind::Scalar(_) | FieldKind::Sequence(_) => {}
        }
    }

    errors
}
