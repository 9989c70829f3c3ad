//! The node tree: record schemas instantiated at destinations.
//!
//! A [`NodeArena`] owns every [`Node`] of a session; parent and child links
//! are plain indices ([`NodeId`]) so the tree carries no reference cycles.
//! [`NodeArena::build`] turns a schema plus a destination into a subtree:
//! nested-record fields recurse into child nodes, subgroup fields stay
//! behind as pending [`FieldNode`]s until the subgroup resolver expands
//! them, and everything else becomes a plain field.
//!
//! Nodes removed by the merge policy are tombstoned in place rather than
//! shifted, so ids held elsewhere stay valid.

use arg_schema_core::{FieldKind, FieldSpec, Schema};
use serde_json::Value;
use tracing::debug;

/// Index of a node in its [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// A field spec wrapped within a specific node.
///
/// Computes the externally visible flag names from its mutable `prefix`,
/// carries the resolved default and required-ness, and for subgroup fields
/// tracks whether the choice is still pending.
#[derive(Debug, Clone)]
pub struct FieldNode {
    /// The wrapped spec.
    pub spec: FieldSpec,
    /// Flag-name prefix, e.g. `"trainer.optimizer."`. Mutated by the
    /// conflict resolver.
    pub prefix: String,
    /// Resolved default (schema default, possibly overridden by a
    /// registration default or a defaults file).
    pub default: Option<Value>,
    /// Resolved required-ness (inherited from the owning node unless the
    /// spec overrides it).
    pub required: bool,
    /// Whether the field spans several destinations after a merge.
    pub multiple: bool,
    /// For subgroup fields: the choice has not been resolved yet.
    pub pending: bool,
    /// For resolved subgroup fields: the flag names the choice was parsed
    /// under. Kept so the final engine still accepts them if a later
    /// conflict pass re-prefixes the field.
    pub resolved_names: Vec<String>,
}

impl FieldNode {
    /// Externally visible flag names: prefixed field name plus aliases.
    pub fn flag_names(&self) -> Vec<String> {
        std::iter::once(&self.spec.name)
            .chain(self.spec.aliases.iter())
            .map(|name| format!("{}{}", self.prefix, name))
            .collect()
    }

    /// Whether this is a scalar or sequence field.
    pub fn is_plain(&self) -> bool {
        self.spec.is_plain()
    }

    /// Whether this is a subgroup-choice field.
    pub fn is_subgroup(&self) -> bool {
        matches!(self.spec.kind, FieldKind::Subgroup(_))
    }
}

/// One record schema instantiated at one destination path (or several,
/// after a merge).
#[derive(Debug, Clone)]
pub struct Node {
    /// The wrapped schema.
    pub schema: Schema,
    /// Attribute name: the last segment of the destination path.
    pub name: String,
    /// Destination paths. More than one only after a merge; the first is
    /// the primary destination.
    pub destinations: Vec<String>,
    /// Flag-name prefix seed propagated to fields and children.
    pub prefix: String,
    /// Parent node, if any.
    pub parent: Option<NodeId>,
    /// Child nodes (nested records and resolved subgroups).
    pub children: Vec<NodeId>,
    /// Plain and subgroup fields of this node.
    pub fields: Vec<FieldNode>,
    /// Whether the node came from an optional nested field.
    pub optional: bool,
    /// Per-destination record defaults, parallel to `destinations`.
    pub defaults: Vec<Option<Value>>,
    /// Cleared when the node is absorbed by a merge.
    pub alive: bool,
}

impl Node {
    /// Primary destination path.
    pub fn dest(&self) -> &str {
        &self.destinations[0]
    }

    /// Whether this node spans several destinations.
    pub fn multiple(&self) -> bool {
        self.destinations.len() > 1
    }

    /// Nesting depth: number of dots in the primary destination.
    pub fn depth(&self) -> usize {
        self.destinations[0].matches('.').count()
    }

    /// Destinations of one of this node's fields, one per node destination.
    pub fn field_destinations(&self, field: &FieldNode) -> Vec<String> {
        self.destinations
            .iter()
            .map(|dest| format!("{dest}.{}", field.spec.name))
            .collect()
    }

    /// Primary destination of one of this node's fields.
    pub fn field_dest(&self, field: &FieldNode) -> String {
        format!("{}.{}", self.dest(), field.spec.name)
    }
}

/// Splits a destination path into its parent path and final attribute.
pub(crate) fn split_dest(dest: &str) -> (&str, &str) {
    match dest.rsplit_once('.') {
        Some((parent, attr)) => (parent, attr),
        None => ("", dest),
    }
}

/// Owning arena for the session's node tree(s).
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutably borrows a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Ids of all live nodes, in creation order.
    pub fn live_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.alive)
            .map(|(index, _)| NodeId(index))
            .collect()
    }

    /// Ids of all live descendants of `id`, depth-first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &child in &self.node(id).children {
            if self.node(child).alive {
                out.push(child);
                out.extend(self.descendants(child));
            }
        }
        out
    }

    /// Builds a subtree for `schema` rooted at the given attribute name.
    ///
    /// The destination path is the parent's destination plus `name` (just
    /// `name` at a root). `default`, when given, supplies per-field
    /// defaults by attribute and is sliced for child nodes; each field
    /// falls back to its own spec default.
    pub fn build(
        &mut self,
        schema: Schema,
        name: &str,
        prefix: &str,
        default: Option<Value>,
        parent: Option<NodeId>,
        optional: bool,
    ) -> NodeId {
        let dest = match parent {
            Some(parent_id) => format!("{}.{name}", self.node(parent_id).dest()),
            None => name.to_string(),
        };
        debug!(dest = %dest, schema = %schema.name, "building node");

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            schema: schema.clone(),
            name: name.to_string(),
            destinations: vec![dest],
            prefix: prefix.to_string(),
            parent,
            children: Vec::new(),
            fields: Vec::new(),
            optional,
            defaults: vec![default.clone()],
            alive: true,
        });

        for field in &schema.fields {
            let field_default = default
                .as_ref()
                .and_then(|d| d.get(&field.name))
                .filter(|v| !v.is_null())
                .cloned()
                .or_else(|| field.default.clone());

            match &field.kind {
                FieldKind::Nested {
                    schema: child_schema,
                    optional: child_optional,
                } => {
                    let child = self.build(
                        child_schema.clone(),
                        &field.name,
                        prefix,
                        field_default,
                        Some(id),
                        optional || *child_optional,
                    );
                    self.node_mut(id).children.push(child);
                }
                FieldKind::Subgroup(_) => {
                    self.node_mut(id).fields.push(FieldNode {
                        spec: field.clone(),
                        prefix: prefix.to_string(),
                        default: field_default,
                        required: false,
                        multiple: false,
                        pending: true,
                        resolved_names: Vec::new(),
                    });
                }
                FieldKind::Scalar(_) | FieldKind::Sequence(_) => {
                    self.node_mut(id).fields.push(FieldNode {
                        spec: field.clone(),
                        prefix: prefix.to_string(),
                        default: field_default,
                        required: field.required && !optional,
                        multiple: false,
                        pending: false,
                        resolved_names: Vec::new(),
                    });
                }
            }
        }

        id
    }

    /// Tombstones a node and all its descendants, detaching it from its
    /// parent's child list.
    pub fn remove(&mut self, id: NodeId) {
        for descendant in self.descendants(id) {
            self.nodes[descendant.0].alive = false;
        }
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&child| child != id);
        }
        self.nodes[id.0].alive = false;
    }

    /// Absorbs `absorb` into `keep`: destinations and defaults extend,
    /// every field becomes multiple, and children merge pairwise.
    ///
    /// Callers must have checked that both nodes wrap the same schema.
    pub fn merge_nodes(&mut self, keep: NodeId, absorb: NodeId) {
        debug!(
            keep = %self.node(keep).dest(),
            absorb = %self.node(absorb).dest(),
            "merging nodes"
        );
        let absorbed_dests = self.node(absorb).destinations.clone();
        let absorbed_defaults = self.node(absorb).defaults.clone();
        {
            let node = self.node_mut(keep);
            for (dest, default) in absorbed_dests.into_iter().zip(absorbed_defaults) {
                if !node.destinations.contains(&dest) {
                    node.destinations.push(dest);
                    node.defaults.push(default);
                }
            }
            for field in &mut node.fields {
                field.multiple = true;
            }
        }

        let pairs: Vec<(NodeId, NodeId)> = self
            .node(keep)
            .children
            .clone()
            .into_iter()
            .zip(self.node(absorb).children.clone())
            .collect();
        for (keep_child, absorb_child) in pairs {
            self.merge_nodes(keep_child, absorb_child);
        }

        // Detach before tombstoning so the absorbed subtree disappears as
        // one unit.
        if let Some(parent) = self.node(absorb).parent {
            self.node_mut(parent)
                .children
                .retain(|&child| child != absorb);
        }
        self.nodes[absorb.0].alive = false;
        for descendant in self.descendants(absorb) {
            self.nodes[descendant.0].alive = false;
        }
    }
}
