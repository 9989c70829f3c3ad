//! The flag engine: tokens in, namespace out.
//!
//! The resolution pipeline needs a parser that can run over a token stream
//! several times, keeping tokens it does not recognize for a later round
//! (subgroup choices register new flags between rounds). [`FlagEngine`] is
//! that seam; [`StdFlagEngine`] is the bundled implementation with exact
//! long-flag matching and no abbreviation.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{ResolveError, Result};

/// A flag registered with an engine.
#[derive(Debug, Clone)]
pub struct FlagSpec {
    /// Accepted flag names, without the leading dashes. The first is
    /// canonical.
    pub names: Vec<String>,
    /// Destination path the parsed occurrences are recorded under.
    pub dest: String,
    /// Whether the flag consumes a value token. `false` means a bare
    /// boolean switch.
    pub takes_value: bool,
    /// Whether the flag consumes every following non-flag token rather
    /// than exactly one.
    pub greedy: bool,
    /// Names the value must be one of, when restricted.
    pub choices: Option<Vec<String>>,
    /// Whether at least one occurrence must be supplied.
    pub required: bool,
    /// Help text shown in the usage listing.
    pub help: Option<String>,
}

/// Parsed occurrences, keyed by destination path.
///
/// Each occurrence keeps its raw value tokens; coercion happens later so
/// merged fields can count tokens across occurrences first.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    values: BTreeMap<String, Vec<Vec<String>>>,
}

impl Namespace {
    /// All occurrences recorded for a destination.
    pub fn occurrences(&self, dest: &str) -> Option<&[Vec<String>]> {
        self.values.get(dest).map(Vec::as_slice)
    }

    /// Whether anything was recorded for a destination.
    pub fn contains(&self, dest: &str) -> bool {
        self.values.contains_key(dest)
    }

    fn push(&mut self, dest: &str, tokens: Vec<String>) {
        self.values.entry(dest.to_string()).or_default().push(tokens);
    }
}

/// A parser that can be rebuilt and rerun as the flag set grows.
pub trait FlagEngine {
    /// Registers a flag. Later rounds rebuild the engine, so duplicate
    /// registration is a caller bug and may panic.
    fn register(&mut self, spec: FlagSpec);

    /// Parses the token stream, returning the recognized occurrences and
    /// the tokens left for a later round.
    fn parse_known(&self, tokens: &[String]) -> Result<(Namespace, Vec<String>)>;
}

/// The bundled engine: exact `--name value` / `--name=value` matching.
///
/// Unknown flags and stray positionals pass through untouched; required
/// and choice constraints are enforced on what was recognized.
#[derive(Debug, Default)]
pub struct StdFlagEngine {
    specs: Vec<FlagSpec>,
}

impl StdFlagEngine {
    /// Creates an engine with no flags registered.
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, name: &str) -> Option<&FlagSpec> {
        self.specs
            .iter()
            .find(|spec| spec.names.iter().any(|n| n == name))
    }

    fn check_choices(spec: &FlagSpec, tokens: &[String]) -> Result<()> {
        let Some(choices) = &spec.choices else {
            return Ok(());
        };
        for token in tokens {
            if !choices.contains(token) {
                return Err(ResolveError::InvalidValue {
                    flag: spec.names[0].clone(),
                    source: arg_schema_core::CoerceError::UnknownChoice {
                        value: token.clone(),
                        choices: choices.clone(),
                    },
                });
            }
        }
        Ok(())
    }
}

impl FlagEngine for StdFlagEngine {
    fn register(&mut self, spec: FlagSpec) {
        for existing in &self.specs {
            for name in &spec.names {
                assert!(
                    !existing.names.contains(name),
                    "flag --{name} registered twice"
                );
            }
        }
        trace!(flag = %spec.names[0], dest = %spec.dest, "registering flag");
        self.specs.push(spec);
    }

    fn parse_known(&self, tokens: &[String]) -> Result<(Namespace, Vec<String>)> {
        let mut namespace = Namespace::default();
        let mut unparsed = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            let Some(stripped) = token.strip_prefix("--") else {
                unparsed.push(token.clone());
                i += 1;
                continue;
            };
            let (name, inline) = match stripped.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (stripped, None),
            };
            let Some(spec) = self.lookup(name) else {
                unparsed.push(token.clone());
                i += 1;
                continue;
            };

            let values = if !spec.takes_value {
                if let Some(value) = inline {
                    vec![value.to_string()]
                } else {
                    Vec::new()
                }
            } else if let Some(value) = inline {
                vec![value.to_string()]
            } else if spec.greedy {
                let mut collected = Vec::new();
                while i + 1 < tokens.len() && !tokens[i + 1].starts_with("--") {
                    i += 1;
                    collected.push(tokens[i].clone());
                }
                collected
            } else {
                if i + 1 >= tokens.len() || tokens[i + 1].starts_with("--") {
                    return Err(ResolveError::MissingFlagValue {
                        flag: name.to_string(),
                    });
                }
                i += 1;
                vec![tokens[i].clone()]
            };

            Self::check_choices(spec, &values)?;
            namespace.push(&spec.dest, values);
            i += 1;
        }

        for spec in &self.specs {
            if spec.required && !namespace.contains(&spec.dest) {
                return Err(ResolveError::MissingRequiredField {
                    dest: spec.dest.clone(),
                    field: spec.names[0].clone(),
                });
            }
        }

        Ok((namespace, unparsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(name: &str, dest: &str) -> FlagSpec {
        FlagSpec {
            names: vec![name.to_string()],
            dest: dest.to_string(),
            takes_value: true,
            greedy: false,
            choices: None,
            required: false,
            help: None,
        }
    }

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_space_and_equals_forms() {
        let mut engine = StdFlagEngine::new();
        engine.register(flag("lr", "opt.lr"));
        engine.register(flag("momentum", "opt.momentum"));

        let (ns, rest) = engine
            .parse_known(&tokens(&["--lr", "0.1", "--momentum=0.9"]))
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(ns.occurrences("opt.lr").unwrap(), &[vec!["0.1".to_string()]]);
        assert_eq!(
            ns.occurrences("opt.momentum").unwrap(),
            &[vec!["0.9".to_string()]]
        );
    }

    #[test]
    fn test_unknown_flags_pass_through() {
        let mut engine = StdFlagEngine::new();
        engine.register(flag("lr", "opt.lr"));

        let (ns, rest) = engine
            .parse_known(&tokens(&["--unknown", "1", "--lr", "0.1"]))
            .unwrap();
        assert_eq!(rest, tokens(&["--unknown", "1"]));
        assert!(ns.contains("opt.lr"));
    }

    #[test]
    fn test_greedy_flag_collects_until_next_flag() {
        let mut engine = StdFlagEngine::new();
        let mut spec = flag("tags", "cfg.tags");
        spec.greedy = true;
        engine.register(spec);
        engine.register(flag("lr", "opt.lr"));

        let (ns, rest) = engine
            .parse_known(&tokens(&["--tags", "a", "b", "c", "--lr", "0.1"]))
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            ns.occurrences("cfg.tags").unwrap(),
            &[tokens(&["a", "b", "c"])]
        );
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let mut engine = StdFlagEngine::new();
        engine.register(flag("lr", "opt.lr"));

        let err = engine.parse_known(&tokens(&["--lr"])).unwrap_err();
        assert!(matches!(err, ResolveError::MissingFlagValue { .. }));
    }

    #[test]
    fn test_required_flag_missing_is_an_error() {
        let mut engine = StdFlagEngine::new();
        let mut spec = flag("lr", "opt.lr");
        spec.required = true;
        engine.register(spec);

        let err = engine.parse_known(&tokens(&[])).unwrap_err();
        assert!(matches!(err, ResolveError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_choice_constraint_enforced() {
        let mut engine = StdFlagEngine::new();
        let mut spec = flag("optimizer", "cfg.optimizer");
        spec.choices = Some(vec!["adam".to_string(), "sgd".to_string()]);
        engine.register(spec);

        let err = engine
            .parse_known(&tokens(&["--optimizer", "rmsprop"]))
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidValue { .. }));

        let (ns, _) = engine
            .parse_known(&tokens(&["--optimizer", "sgd"]))
            .unwrap();
        assert!(ns.contains("cfg.optimizer"));
    }

    #[test]
    fn test_repeated_occurrences_recorded_in_order() {
        let mut engine = StdFlagEngine::new();
        engine.register(flag("x", "p.x"));

        let (ns, _) = engine
            .parse_known(&tokens(&["--x", "1", "--x", "2"]))
            .unwrap();
        assert_eq!(
            ns.occurrences("p.x").unwrap(),
            &[vec!["1".to_string()], vec!["2".to_string()]]
        );
    }

    #[test]
    fn test_bool_switch_without_value() {
        let mut engine = StdFlagEngine::new();
        let mut spec = flag("verbose", "cfg.verbose");
        spec.takes_value = false;
        engine.register(spec);

        let (ns, rest) = engine.parse_known(&tokens(&["--verbose"])).unwrap();
        assert!(rest.is_empty());
        assert_eq!(ns.occurrences("cfg.verbose").unwrap(), &[Vec::<String>::new()]);
    }
}
