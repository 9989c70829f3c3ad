//! Round-based resolution of subgroup (polymorphic choice) fields.
//!
//! A subgroup field's flag set depends on which choice is selected, so the
//! token stream is consulted in rounds: each round registers the choice
//! flags of every still-pending subgroup, parses the tokens with unknown
//! flags passing through, expands each chosen schema into a child node,
//! and reruns conflict resolution over the grown tree. Nested subgroups
//! surface as new pending fields in the following round; the loop ends
//! when none remain.

use std::collections::BTreeMap;

use arg_schema_core::{FieldKind, SubgroupDefault, SubgroupSpec};
use serde_json::Value;
use tracing::debug;

use crate::conflicts::{self, ConflictPolicy};
use crate::engine::{FlagEngine, FlagSpec, StdFlagEngine};
use crate::error::{ResolveError, Result};
use crate::node::{NodeArena, NodeId};

/// Resolves every subgroup field to a concrete choice and expands it.
///
/// `resolved` collects the chosen key per subgroup destination, for
/// reporting back to the caller.
pub fn resolve_subgroups(
    arena: &mut NodeArena,
    policy: ConflictPolicy,
    tokens: &[String],
    resolved: &mut BTreeMap<String, String>,
) -> Result<()> {
    loop {
        let pending = pending_fields(arena);
        if pending.is_empty() {
            return Ok(());
        }
        debug!(count = pending.len(), "resolving subgroup round");

        let mut engine = StdFlagEngine::new();
        let mut choices: Vec<(NodeId, usize, String, Vec<String>)> = Vec::new();
        for &(id, index) in &pending {
            let node = arena.node(id);
            let field = &node.fields[index];
            let spec = subgroup_spec(field.spec.kind.clone());
            let dest = node.field_dest(field);
            let names = field.flag_names();
            let has_default = field.default.is_some() || spec.default.is_some();
            engine.register(FlagSpec {
                names: names.clone(),
                dest: dest.clone(),
                takes_value: true,
                greedy: false,
                choices: Some(spec.keys().into_iter().map(str::to_string).collect()),
                required: !has_default,
                help: field.spec.help.clone(),
            });
            choices.push((id, index, dest, names));
        }

        let (namespace, _) = engine.parse_known(tokens)?;

        for (id, index, dest, names) in choices {
            let (spec, node_prefix, field_default, name, optional) = {
                let node = arena.node(id);
                let field = &node.fields[index];
                (
                    subgroup_spec(field.spec.kind.clone()),
                    node.prefix.clone(),
                    field.default.clone(),
                    field.spec.name.clone(),
                    node.optional,
                )
            };

            // Last occurrence wins; fall back to the field or spec default.
            let explicit = namespace
                .occurrences(&dest)
                .and_then(|occ| occ.last())
                .and_then(|tokens| tokens.first())
                .cloned();
            let (key, instance_default) = match explicit {
                Some(key) => (key, None),
                None => default_choice(&spec, field_default.as_ref(), &dest)?,
            };
            debug!(dest = %dest, key = %key, "subgroup choice");
            resolved.insert(dest.clone(), key.clone());

            let schema = spec
                .get(&key)
                .cloned()
                .unwrap_or_else(|| unreachable!("choice constraint admits only known keys"));
            let child = arena.build(
                schema,
                &name,
                &node_prefix,
                instance_default,
                Some(id),
                optional,
            );
            {
                let extra: Vec<String> = arena.node(id).destinations[1..]
                    .iter()
                    .map(|d| format!("{d}.{name}"))
                    .collect();
                let child_node = arena.node_mut(child);
                child_node
                    .defaults
                    .extend(std::iter::repeat(None).take(extra.len()));
                child_node.destinations.extend(extra);
            }
            let node = arena.node_mut(id);
            node.children.push(child);
            node.fields[index].pending = false;
            node.fields[index].resolved_names = names;
        }

        conflicts::resolve(arena, policy)?;
    }
}

fn pending_fields(arena: &NodeArena) -> Vec<(NodeId, usize)> {
    let mut out = Vec::new();
    for id in arena.live_ids() {
        for (index, field) in arena.node(id).fields.iter().enumerate() {
            if field.is_subgroup() && field.pending {
                out.push((id, index));
            }
        }
    }
    out
}

fn subgroup_spec(kind: FieldKind) -> SubgroupSpec {
    match kind {
        FieldKind::Subgroup(spec) => spec,
        _ => unreachable!("pending fields are subgroup fields"),
    }
}

/// Determines the default choice when no flag was supplied.
///
/// A string default names a key directly; an object default (from a
/// defaults file or a registration) is matched by equality against every
/// choice's all-defaults instance. The matched instance then seeds the
/// child node's field defaults.
fn default_choice(
    spec: &SubgroupSpec,
    field_default: Option<&Value>,
    dest: &str,
) -> Result<(String, Option<Value>)> {
    if let Some(default) = field_default {
        if let Value::String(key) = default {
            if spec.get(key).is_some() {
                return Ok((key.clone(), None));
            }
        }
        return match_instance(spec, default, dest);
    }
    match &spec.default {
        Some(SubgroupDefault::Key(key)) => Ok((key.clone(), None)),
        Some(SubgroupDefault::Instance(instance)) => match_instance(spec, instance, dest),
        None => Err(ResolveError::MissingRequiredField {
            dest: dest.to_string(),
            field: dest.rsplit('.').next().unwrap_or(dest).to_string(),
        }),
    }
}

fn match_instance(
    spec: &SubgroupSpec,
    instance: &Value,
    dest: &str,
) -> Result<(String, Option<Value>)> {
    let matches: Vec<&str> = spec
        .choices
        .iter()
        .filter(|(_, schema)| &schema.default_instance() == instance)
        .map(|(key, _)| key.as_str())
        .collect();
    match matches.as_slice() {
        [] => Err(ResolveError::SubgroupDefaultNotFound {
            dest: dest.to_string(),
        }),
        [key] => Ok((key.to_string(), Some(instance.clone()))),
        keys => Err(ResolveError::SubgroupDefaultAmbiguous {
            dest: dest.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }),
    }
}
