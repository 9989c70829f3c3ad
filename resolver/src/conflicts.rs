//! Flag-name conflict detection and resolution.
//!
//! Two fields conflict when they would produce the same externally visible
//! flag name. [`resolve`] scans the flattened live node set to a fixed
//! point: while a conflicting group exists, the configured
//! [`ConflictPolicy`] is applied to it and the scan restarts. The full
//! destination path is always globally unique, which bounds the search; an
//! attempt cap guards against pathological schemas.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::node::{NodeArena, NodeId};

/// Attempt cap for the fixed-point loop.
const MAX_ATTEMPTS: usize = 50;

/// Policy for eliminating flag-name collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Any conflict is a fatal error.
    Reject,
    /// Every implicated field uses its full destination path as prefix.
    Explicit,
    /// Conflicting nodes wrapping the same schema collapse into one
    /// multi-destination node; supplied values are distributed across the
    /// destinations at parse time.
    Merge,
    /// Shortest-unique-suffix prefixes computed from a trie over reversed
    /// destination segments (the default).
    #[default]
    Auto,
}

/// One conflicting group: a flag name claimed by several fields.
#[derive(Debug, Clone)]
pub struct Conflict {
    /// The contested flag name.
    pub flag: String,
    /// The conflicting fields, as (node, field index) pairs.
    pub fields: Vec<(NodeId, usize)>,
}

/// Resolves all flag-name conflicts in the arena under the given policy.
pub fn resolve(arena: &mut NodeArena, policy: ConflictPolicy) -> Result<()> {
    let mut attempts = 0;
    while let Some(conflict) = find_conflict(arena) {
        debug!(
            flag = %conflict.flag,
            fields = conflict.fields.len(),
            ?policy,
            "resolving flag conflict"
        );
        match policy {
            ConflictPolicy::Reject => return Err(conflict_error(arena, &conflict)),
            ConflictPolicy::Explicit => fix_explicit(arena, &conflict)?,
            ConflictPolicy::Merge => fix_merge(arena, &conflict)?,
            ConflictPolicy::Auto => fix_auto(arena, &conflict)?,
        }
        attempts += 1;
        if attempts == MAX_ATTEMPTS {
            return Err(conflict_error(arena, &conflict));
        }
    }
    Ok(())
}

/// Finds one conflicting group, or `None` when every flag name is unique.
///
/// Scans all fields of all live nodes, subgroup fields included; returns
/// the lexicographically first contested flag for determinism.
pub fn find_conflict(arena: &NodeArena) -> Option<Conflict> {
    let mut by_flag: BTreeMap<String, Vec<(NodeId, usize)>> = BTreeMap::new();
    for id in arena.live_ids() {
        for (index, field) in arena.node(id).fields.iter().enumerate() {
            for flag in field.flag_names() {
                by_flag.entry(flag).or_default().push((id, index));
            }
        }
    }
    by_flag
        .into_iter()
        .find(|(_, fields)| fields.len() > 1)
        .map(|(flag, fields)| Conflict { flag, fields })
}

fn conflict_error(arena: &NodeArena, conflict: &Conflict) -> ResolveError {
    let dests = conflict
        .fields
        .iter()
        .map(|&(id, index)| {
            let node = arena.node(id);
            node.field_dest(&node.fields[index])
        })
        .collect();
    ResolveError::ConflictResolution {
        flag: conflict.flag.clone(),
        dests,
    }
}

/// Explicit policy: prefix every implicated field with its owning node's
/// full destination path. A field already carrying that prefix cannot be
/// disambiguated further.
fn fix_explicit(arena: &mut NodeArena, conflict: &Conflict) -> Result<()> {
    for &(id, index) in &conflict.fields {
        let explicit = format!("{}.", arena.node(id).dest());
        if arena.node(id).fields[index].prefix == explicit {
            return Err(conflict_error(arena, conflict));
        }
        arena.node_mut(id).fields[index].prefix = explicit;
    }
    Ok(())
}

/// Auto policy: insert each conflicting node's destination segments into a
/// trie in reverse (most specific segment first) and give each field the
/// shortest reversed-path prefix that is unique in the trie, rendered back
/// in path order.
///
/// A field whose full reversed path is a proper prefix of another's (the
/// least nested of the group) keeps its current prefix; the deeper fields
/// grow past the divergence point. No change across the whole group means
/// the conflict cannot be fixed.
fn fix_auto(arena: &mut NodeArena, conflict: &Conflict) -> Result<()> {
    let entries: Vec<(NodeId, usize, Vec<String>)> = conflict
        .fields
        .iter()
        .map(|&(id, index)| {
            let reversed: Vec<String> = arena
                .node(id)
                .dest()
                .split('.')
                .rev()
                .map(str::to_string)
                .collect();
            (id, index, reversed)
        })
        .collect();

    let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
    for (_, _, reversed) in &entries {
        for len in 1..=reversed.len() {
            *counts.entry(reversed[..len].to_vec()).or_default() += 1;
        }
    }

    let mut progressed = false;
    for (id, index, reversed) in &entries {
        let unique_len = (1..=reversed.len())
            .find(|&len| counts.get(&reversed[..len]).copied() == Some(1));
        let Some(len) = unique_len else {
            // Least nested of the group; the deeper fields disambiguate.
            continue;
        };
        let segments: Vec<&str> = reversed[..len].iter().rev().map(String::as_str).collect();
        let new_prefix = format!("{}.", segments.join("."));
        let field = &mut arena.node_mut(*id).fields[*index];
        if field.prefix != new_prefix {
            debug!(flag = %conflict.flag, prefix = %new_prefix, "assigning unique prefix");
            field.prefix = new_prefix;
            progressed = true;
        }
    }

    if progressed {
        Ok(())
    } else {
        Err(conflict_error(arena, conflict))
    }
}

/// Merge policy: collapse the owning nodes into one multi-destination node.
/// Only legal when every implicated node wraps the same schema.
fn fix_merge(arena: &mut NodeArena, conflict: &Conflict) -> Result<()> {
    let mut owners: Vec<NodeId> = Vec::new();
    for &(id, _) in &conflict.fields {
        if !owners.contains(&id) {
            owners.push(id);
        }
    }
    if owners.len() < 2 {
        return Err(conflict_error(arena, conflict));
    }

    owners.sort_by_key(|&id| arena.node(id).depth());
    let schema_name = arena.node(owners[0]).schema.name.clone();
    if owners
        .iter()
        .any(|&id| arena.node(id).schema.name != schema_name)
    {
        return Err(conflict_error(arena, conflict));
    }

    let keep = owners[0];
    for &absorb in &owners[1..] {
        arena.merge_nodes(keep, absorb);
    }
    Ok(())
}
