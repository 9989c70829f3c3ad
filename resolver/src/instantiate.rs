//! Bottom-up instantiation: parsed occurrences to nested record values.
//!
//! Two passes. [`fill_tables`] turns the parsed [`Namespace`] into one
//! argument table per destination (field name → coerced value), applying
//! the merge-distribution rule for multi-destination fields.
//! [`instantiate`] then walks live nodes deepest-first, builds each record
//! object from its table, and writes it into the parent's table under the
//! owning attribute, so every constructor argument exists before the
//! record that consumes it.

use std::collections::BTreeMap;

use arg_schema_core::{coerce_scalar, coerce_sequence, FieldKind, ValueKind};
use serde_json::{Map, Value};
use tracing::debug;

use crate::engine::Namespace;
use crate::error::{ResolveError, Result};
use crate::node::{split_dest, FieldNode, Node, NodeArena, NodeId};

/// Argument tables: destination path → field name → value.
pub type Tables = BTreeMap<String, BTreeMap<String, Value>>;

/// Fills one argument table per destination from the parsed namespace.
pub fn fill_tables(arena: &NodeArena, namespace: &Namespace) -> Result<Tables> {
    let mut tables = Tables::new();
    for id in arena.live_ids() {
        let node = arena.node(id);
        for field in &node.fields {
            if !field.is_plain() {
                continue;
            }
            if field.multiple {
                fill_multiple(node, field, namespace, &mut tables)?;
            } else {
                fill_single(node, field, namespace, &mut tables)?;
            }
        }
    }
    Ok(tables)
}

fn fill_single(
    node: &Node,
    field: &FieldNode,
    namespace: &Namespace,
    tables: &mut Tables,
) -> Result<()> {
    let dest = node.field_dest(field);
    let value = match namespace.occurrences(&dest).and_then(|occ| occ.last()) {
        Some(tokens) => Some(coerce_occurrence(field, tokens)?),
        None => field.default.clone(),
    };
    match value {
        Some(value) => {
            tables
                .entry(node.dest().to_string())
                .or_default()
                .insert(field.spec.name.clone(), value);
        }
        None if field.required => {
            return Err(ResolveError::MissingRequiredField {
                dest: node.dest().to_string(),
                field: field.spec.name.clone(),
            });
        }
        None => {}
    }
    Ok(())
}

/// Distributes values of a merged field across its destinations.
///
/// Scalars count supplied tokens across all occurrences; bool switches
/// and sequences count occurrences (a value-less switch occurrence means
/// `true`). Exactly one unit broadcasts to every destination, exactly N
/// assign positionally in registration order, anything else is an
/// inconsistency.
fn fill_multiple(
    node: &Node,
    field: &FieldNode,
    namespace: &Namespace,
    tables: &mut Tables,
) -> Result<()> {
    let primary = node.field_dest(field);
    let expected = node.destinations.len();
    let occurrences = namespace.occurrences(&primary).unwrap_or(&[]);

    let values: Vec<Option<Value>> = if occurrences.is_empty() {
        // Nothing supplied: each destination falls back to its own record
        // default, then the shared field default.
        node.defaults
            .iter()
            .map(|default| {
                default
                    .as_ref()
                    .and_then(|d| d.get(&field.spec.name))
                    .filter(|v| !v.is_null())
                    .cloned()
                    .or_else(|| field.default.clone())
            })
            .collect()
    } else {
        let units: Vec<Value> = match &field.spec.kind {
            FieldKind::Scalar(ValueKind::Bool) => {
                check_count(&primary, occurrences.len(), expected)?;
                occurrences
                    .iter()
                    .map(|tokens| match tokens.as_slice() {
                        [] => Ok(Value::Bool(true)),
                        [token] => coerce_flag_scalar(field, &ValueKind::Bool, token),
                        _ => Err(ResolveError::InconsistentArgumentCount {
                            field: field.flag_names()[0].clone(),
                            got: tokens.len(),
                            expected: 1,
                        }),
                    })
                    .collect::<Result<_>>()?
            }
            FieldKind::Scalar(kind) => {
                let tokens: Vec<&String> = occurrences.iter().flatten().collect();
                check_count(&primary, tokens.len(), expected)?;
                tokens
                    .iter()
                    .map(|token| coerce_flag_scalar(field, kind, token.as_str()))
                    .collect::<Result<_>>()?
            }
            FieldKind::Sequence(kind) => {
                check_count(&primary, occurrences.len(), expected)?;
                occurrences
                    .iter()
                    .map(|tokens| {
                        coerce_sequence(kind, tokens).map_err(|source| {
                            ResolveError::InvalidValue {
                                flag: field.flag_names()[0].clone(),
                                source,
                            }
                        })
                    })
                    .collect::<Result<_>>()?
            }
            _ => unreachable!("merged fields are plain"),
        };
        if units.len() == 1 {
            vec![Some(units[0].clone()); expected]
        } else {
            units.into_iter().map(Some).collect()
        }
    };

    for (dest, value) in node.destinations.iter().zip(values) {
        match value {
            Some(value) => {
                tables
                    .entry(dest.clone())
                    .or_default()
                    .insert(field.spec.name.clone(), value);
            }
            None if field.required => {
                return Err(ResolveError::MissingRequiredField {
                    dest: dest.clone(),
                    field: field.spec.name.clone(),
                });
            }
            None => {}
        }
    }
    Ok(())
}

fn check_count(dest: &str, got: usize, expected: usize) -> Result<()> {
    if got == 1 || got == expected {
        Ok(())
    } else {
        Err(ResolveError::InconsistentArgumentCount {
            field: dest.to_string(),
            got,
            expected,
        })
    }
}

fn coerce_occurrence(field: &FieldNode, tokens: &[String]) -> Result<Value> {
    match &field.spec.kind {
        FieldKind::Scalar(kind) => match tokens {
            // A bare boolean switch.
            [] => Ok(Value::Bool(true)),
            [token] => coerce_flag_scalar(field, kind, token),
            _ => Err(ResolveError::InconsistentArgumentCount {
                field: field.flag_names()[0].clone(),
                got: tokens.len(),
                expected: 1,
            }),
        },
        FieldKind::Sequence(kind) => {
            coerce_sequence(kind, tokens).map_err(|source| ResolveError::InvalidValue {
                flag: field.flag_names()[0].clone(),
                source,
            })
        }
        _ => unreachable!("only plain fields are filled from occurrences"),
    }
}

fn coerce_flag_scalar(field: &FieldNode, kind: &ValueKind, token: &str) -> Result<Value> {
    coerce_scalar(kind, token).map_err(|source| ResolveError::InvalidValue {
        flag: field.flag_names()[0].clone(),
        source,
    })
}

/// Builds every record bottom-up and returns the root instances keyed by
/// destination.
pub fn instantiate(arena: &NodeArena, mut tables: Tables) -> Result<BTreeMap<String, Value>> {
    // A merged node can span destinations at different depths, so the
    // ordering is per destination, not per node.
    let mut work: Vec<(NodeId, usize)> = Vec::new();
    for id in arena.live_ids() {
        for index in 0..arena.node(id).destinations.len() {
            work.push((id, index));
        }
    }
    work.sort_by_key(|&(id, index)| {
        std::cmp::Reverse(arena.node(id).destinations[index].matches('.').count())
    });

    let mut roots = BTreeMap::new();
    for (id, index) in work {
        let dest = &arena.node(id).destinations[index];
        let table = tables.remove(dest).unwrap_or_default();
        let value = build_record(arena, id, index, table)?;
        debug!(dest = %dest, "instantiated record");

        let (parent, attr) = split_dest(dest);
        if parent.is_empty() {
            roots.insert(dest.clone(), value);
        } else {
            tables
                .entry(parent.to_string())
                .or_default()
                .insert(attr.to_string(), value);
        }
    }
    Ok(roots)
}

/// Builds one record value from its filled table, in schema field order.
///
/// An optional node with no explicit record default collapses to `Null`
/// when every plain field sits at its default.
fn build_record(
    arena: &NodeArena,
    id: NodeId,
    dest_index: usize,
    table: BTreeMap<String, Value>,
) -> Result<Value> {
    let node = arena.node(id);
    if node.optional && node.defaults[dest_index].is_none() && all_at_default(node, &table) {
        return Ok(Value::Null);
    }

    let mut object = Map::new();
    for field in &node.schema.fields {
        if let Some(value) = table.get(&field.name) {
            object.insert(field.name.clone(), value.clone());
        }
    }
    Ok(Value::Object(object))
}

fn all_at_default(node: &Node, table: &BTreeMap<String, Value>) -> bool {
    node.fields.iter().filter(|f| f.is_plain()).all(|field| {
        match (table.get(&field.spec.name), &field.default) {
            (Some(value), Some(default)) => value == default,
            (None, _) => true,
            (Some(_), None) => false,
        }
    })
}
