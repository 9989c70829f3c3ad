//! The parse session: registration through instantiation.
//!
//! A [`Session`] collects root schema registrations and configuration
//! (conflict policy, defaults file, programmatic defaults, help source),
//! then runs the whole pipeline in [`Session::resolve_and_parse`]: build
//! the node tree, resolve flag conflicts, resolve subgroups in rounds,
//! register the final flag set, parse, and instantiate bottom-up. The
//! session exclusively owns its tree and tables; a failed run yields an
//! error, never partial results.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use arg_schema_core::{validate_schema, FieldKind, Schema, ValueKind};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::conflicts::{self, ConflictPolicy};
use crate::defaults::{load_defaults, merge_defaults};
use crate::engine::{FlagEngine, FlagSpec, StdFlagEngine};
use crate::error::{ResolveError, Result};
use crate::help::HelpLookup;
use crate::instantiate::{fill_tables, instantiate};
use crate::node::NodeArena;
use crate::subgroups::resolve_subgroups;

/// One root registration, replayed when the tree is built.
struct Registration {
    schema: Schema,
    name: String,
    prefix: String,
    default: Option<Value>,
}

/// The result of a successful run.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Root instances, keyed by registered destination.
    pub instances: BTreeMap<String, Value>,
    /// Resolved subgroup choices, keyed by subgroup destination.
    pub subgroups: BTreeMap<String, String>,
    /// Tokens no registered flag recognized.
    pub unparsed: Vec<String>,
}

impl Outcome {
    /// The instance registered at `dest`, if any.
    pub fn instance(&self, dest: &str) -> Option<&Value> {
        self.instances.get(dest)
    }

    /// Deserializes the instance at `dest` into a typed value.
    pub fn instance_as<T: DeserializeOwned>(&self, dest: &str) -> Result<T> {
        let value = self
            .instances
            .get(dest)
            .ok_or_else(|| ResolveError::UnknownDestination {
                dest: dest.to_string(),
            })?;
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// A configuration-resolution session.
pub struct Session {
    policy: ConflictPolicy,
    registrations: Vec<Registration>,
    defaults_file: Option<PathBuf>,
    extra_defaults: Map<String, Value>,
    help: Option<Box<dyn HelpLookup>>,
    sealed: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ConflictPolicy::default())
    }
}

impl Session {
    /// Creates a session with the given conflict policy.
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            registrations: Vec::new(),
            defaults_file: None,
            extra_defaults: Map::new(),
            help: None,
            sealed: false,
        }
    }

    /// Sets a JSON or YAML defaults file, loaded when resolution runs.
    pub fn with_defaults_file(mut self, path: impl AsRef<Path>) -> Self {
        self.defaults_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets a help source consulted for fields without help text.
    pub fn with_help_source(mut self, source: impl HelpLookup + 'static) -> Self {
        self.help = Some(Box::new(source));
        self
    }

    /// Sets a programmatic default for one root destination. Wins over the
    /// defaults file; loses to flags.
    pub fn set_defaults(&mut self, dest: &str, value: Value) {
        merge_defaults(
            &mut self.extra_defaults,
            Map::from_iter([(dest.to_string(), value)]),
        );
    }

    /// Registers a schema at a root destination.
    pub fn register(&mut self, schema: Schema, dest: &str) -> Result<()> {
        self.register_with(schema, dest, "", None)
    }

    /// Registers a schema with an explicit flag prefix and record default.
    ///
    /// # Panics
    ///
    /// Panics if called after resolution has begun; registration order is
    /// part of the session contract.
    pub fn register_with(
        &mut self,
        schema: Schema,
        dest: &str,
        prefix: &str,
        default: Option<Value>,
    ) -> Result<()> {
        assert!(
            !self.sealed,
            "cannot register {dest:?} after resolution has begun"
        );
        if let Some(error) = validate_schema(&schema).into_iter().next() {
            return Err(ResolveError::Schema(error));
        }
        if self.registrations.iter().any(|r| r.name == dest) {
            return Err(ResolveError::DuplicateDestination {
                dest: dest.to_string(),
            });
        }
        debug!(dest = %dest, schema = %schema.name, "registering root schema");
        self.registrations.push(Registration {
            schema,
            name: dest.to_string(),
            prefix: prefix.to_string(),
            default,
        });
        Ok(())
    }

    /// Runs the full pipeline over a token stream.
    pub fn resolve_and_parse(&mut self, tokens: &[String]) -> Result<Outcome> {
        self.sealed = true;

        let defaults = self.collect_defaults()?;
        let mut arena = self.build_arena(&defaults)?;

        conflicts::resolve(&mut arena, self.policy)?;

        let mut subgroups = BTreeMap::new();
        resolve_subgroups(&mut arena, self.policy, tokens, &mut subgroups)?;
        conflicts::resolve(&mut arena, self.policy)?;

        self.apply_help(&mut arena);

        let engine = build_engine(&arena);
        let (namespace, unparsed) = engine.parse_known(tokens)?;

        let tables = fill_tables(&arena, &namespace)?;
        let instances = instantiate(&arena, tables)?;

        Ok(Outcome {
            instances,
            subgroups,
            unparsed,
        })
    }

    /// Runs the pipeline; on any fatal error prints the usage listing and
    /// the error to stderr and exits with code 2.
    pub fn parse_or_exit(&mut self, tokens: &[String]) -> Outcome {
        match self.resolve_and_parse(tokens) {
            Ok(outcome) => outcome,
            Err(error) => {
                eprintln!("{}", self.usage());
                eprintln!("configuration resolution failed: {error}");
                std::process::exit(2);
            }
        }
    }

    /// Renders the flag listing with help text.
    ///
    /// Builds a throwaway tree from the current registrations so the
    /// listing is available before and after resolution; pending subgroup
    /// choices are listed with their key sets, their member flags are not
    /// (they depend on the choice).
    pub fn usage(&self) -> String {
        let mut arena = NodeArena::new();
        for registration in &self.registrations {
            arena.build(
                registration.schema.clone(),
                &registration.name,
                &registration.prefix,
                registration.default.clone(),
                None,
                false,
            );
        }
        // Conflicts are reported by the run itself; the listing shows
        // whatever prefixes a best-effort pass produces.
        let _ = conflicts::resolve(&mut arena, self.policy);
        self.apply_help(&mut arena);

        let mut lines = vec!["flags:".to_string()];
        for spec in collect_flag_specs(&arena) {
            let mut line = format!("  --{}", spec.names.join(" | --"));
            if let Some(choices) = &spec.choices {
                line.push_str(&format!(" {{{}}}", choices.join(",")));
            } else if spec.takes_value {
                line.push_str(" <value>");
            }
            if spec.required {
                line.push_str(" (required)");
            }
            if let Some(help) = &spec.help {
                line.push_str(&format!("  {help}"));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    fn collect_defaults(&self) -> Result<Map<String, Value>> {
        let mut defaults = Map::new();
        if let Some(path) = &self.defaults_file {
            merge_defaults(&mut defaults, load_defaults(path)?);
        }
        merge_defaults(&mut defaults, self.extra_defaults.clone());
        Ok(defaults)
    }

    fn build_arena(&self, defaults: &Map<String, Value>) -> Result<NodeArena> {
        let mut arena = NodeArena::new();
        for registration in &self.registrations {
            let default = match (registration.default.clone(), defaults.get(&registration.name)) {
                (Some(Value::Object(mut base)), Some(Value::Object(over))) => {
                    merge_defaults(&mut base, over.clone());
                    Some(Value::Object(base))
                }
                (_, Some(over)) => Some(over.clone()),
                (base, None) => base,
            };
            arena.build(
                registration.schema.clone(),
                &registration.name,
                &registration.prefix,
                default,
                None,
                false,
            );
        }
        Ok(arena)
    }

    /// Fills missing field help from the configured source.
    fn apply_help(&self, arena: &mut NodeArena) {
        let Some(source) = &self.help else {
            return;
        };
        for id in arena.live_ids() {
            let node = arena.node(id);
            let texts: Vec<(usize, String)> = node
                .fields
                .iter()
                .enumerate()
                .filter(|(_, field)| field.spec.help.is_none())
                .filter_map(|(index, field)| {
                    source
                        .lookup(&node.schema, &field.spec.name)
                        .map(|text| (index, text))
                })
                .collect();
            for (index, text) in texts {
                arena.node_mut(id).fields[index].spec.help = Some(text);
            }
        }
    }
}

/// Builds the final flag engine over every live field.
///
/// Resolved subgroup choice flags are registered too, so the tokens that
/// drove the subgroup rounds are consumed rather than reported unparsed.
fn build_engine(arena: &NodeArena) -> StdFlagEngine {
    let mut engine = StdFlagEngine::new();
    for spec in collect_flag_specs(arena) {
        engine.register(spec);
    }
    engine
}

fn collect_flag_specs(arena: &NodeArena) -> Vec<FlagSpec> {
    let mut specs = Vec::new();
    let mut round_names: Vec<(usize, Vec<String>)> = Vec::new();
    for id in arena.live_ids() {
        let node = arena.node(id);
        for field in &node.fields {
            let dest = node.field_dest(field);
            if !field.resolved_names.is_empty() {
                round_names.push((specs.len(), field.resolved_names.clone()));
            }
            let spec = match &field.spec.kind {
                FieldKind::Scalar(kind) => FlagSpec {
                    names: field.flag_names(),
                    dest,
                    takes_value: !matches!(kind, ValueKind::Bool),
                    greedy: field.multiple,
                    choices: match kind {
                        ValueKind::Choice(choices) => Some(choices.clone()),
                        _ => None,
                    },
                    required: field.required && field.default.is_none(),
                    help: field.spec.help.clone(),
                },
                FieldKind::Sequence(_) => FlagSpec {
                    names: field.flag_names(),
                    dest,
                    takes_value: true,
                    greedy: true,
                    choices: None,
                    required: field.required && field.default.is_none(),
                    help: field.spec.help.clone(),
                },
                FieldKind::Subgroup(subgroup) => FlagSpec {
                    names: field.flag_names(),
                    dest,
                    takes_value: true,
                    greedy: false,
                    choices: Some(subgroup.keys().into_iter().map(str::to_string).collect()),
                    // Enforced during the subgroup rounds.
                    required: false,
                    help: field.spec.help.clone(),
                },
                FieldKind::Nested { .. } => continue,
            };
            specs.push(spec);
        }
    }

    // A subgroup choice may have been re-prefixed by a conflict pass after
    // its round; the names its tokens used remain valid as aliases unless
    // another field claimed them since.
    let mut claimed: HashSet<String> = specs
        .iter()
        .flat_map(|spec| spec.names.iter().cloned())
        .collect();
    for (index, names) in round_names {
        for name in names {
            if claimed.insert(name.clone()) {
                specs[index].names.push(name);
            }
        }
    }
    specs
}
