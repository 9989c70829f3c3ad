//! End-to-end resolution runs through the public [`Session`] API.

use std::io::Write;

use arg_schema_core::{FieldSpec, Schema, SubgroupSpec, ValueKind};
use arg_schema_resolver::{ConflictPolicy, ResolveError, Session};
use serde_json::{json, Value};

fn tokens(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn point() -> Schema {
    Schema::builder("Point")
        .field(FieldSpec::scalar("x", ValueKind::Int).with_default(json!(0)))
        .field(FieldSpec::scalar("y", ValueKind::Int).with_default(json!(0)))
        .build()
}

#[test]
fn test_defaults_only_equals_default_instance() {
    let schema = Schema::builder("Config")
        .field(FieldSpec::scalar("name", ValueKind::Str).with_default(json!("run")))
        .field(FieldSpec::scalar("debug", ValueKind::Bool).with_default(json!(false)))
        .field(FieldSpec::sequence("tags", ValueKind::Str).with_default(json!([])))
        .field(FieldSpec::nested("p", point()))
        .build();
    let expected = schema.default_instance();

    let mut session = Session::default();
    session.register(schema, "cfg").unwrap();
    let outcome = session.resolve_and_parse(&[]).unwrap();
    assert_eq!(outcome.instance("cfg"), Some(&expected));
}

#[test]
fn test_scalar_sequence_and_bool_flags() {
    let schema = Schema::builder("Config")
        .field(FieldSpec::scalar("name", ValueKind::Str).with_default(json!("run")))
        .field(FieldSpec::scalar("debug", ValueKind::Bool).with_default(json!(false)))
        .field(FieldSpec::sequence("tags", ValueKind::Str).with_default(json!([])))
        .build();

    let mut session = Session::default();
    session.register(schema, "cfg").unwrap();
    let outcome = session
        .resolve_and_parse(&tokens(&["--name", "exp1", "--tags", "a", "b", "--debug"]))
        .unwrap();
    assert_eq!(
        outcome.instance("cfg"),
        Some(&json!({"name": "exp1", "debug": true, "tags": ["a", "b"]}))
    );
}

#[test]
fn test_choice_kind_rejects_unknown_value() {
    let schema = Schema::builder("Config")
        .field(
            FieldSpec::scalar(
                "mode",
                ValueKind::Choice(vec!["fast".to_string(), "slow".to_string()]),
            )
            .with_default(json!("fast")),
        )
        .build();

    let mut session = Session::default();
    session.register(schema, "cfg").unwrap();
    let err = session
        .resolve_and_parse(&tokens(&["--mode", "medium"]))
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidValue { .. }));
}

// Scenario: the same record registered at two destinations under the
// default policy gets destination-qualified flags.
#[test]
fn test_auto_policy_two_destinations() {
    let mut session = Session::new(ConflictPolicy::Auto);
    session.register(point(), "a").unwrap();
    session.register(point(), "b").unwrap();
    let outcome = session
        .resolve_and_parse(&tokens(&["--a.x", "1", "--b.x", "2"]))
        .unwrap();
    assert_eq!(outcome.instance("a"), Some(&json!({"x": 1, "y": 0})));
    assert_eq!(outcome.instance("b"), Some(&json!({"x": 2, "y": 0})));
}

#[test]
fn test_auto_prefixes_are_stable_across_runs() {
    let run = || {
        let mut session = Session::new(ConflictPolicy::Auto);
        session.register(point(), "a").unwrap();
        session.register(point(), "b").unwrap();
        session.usage()
    };
    assert_eq!(run(), run());
}

// Scenario: a subgroup with a default key, no flags supplied.
#[test]
fn test_subgroup_default_key() {
    let circle = Schema::builder("Circle").build();
    let square = Schema::builder("Square").build();
    let shape = Schema::builder("Shape")
        .field(FieldSpec::subgroup(
            "kind",
            SubgroupSpec::new()
                .choice("circle", circle)
                .choice("square", square)
                .with_default_key("circle"),
        ))
        .field(FieldSpec::scalar("size", ValueKind::Int).with_default(json!(1)))
        .build();

    let mut session = Session::default();
    session.register(shape, "shape").unwrap();
    let outcome = session.resolve_and_parse(&[]).unwrap();
    assert_eq!(outcome.instance("shape"), Some(&json!({"kind": {}, "size": 1})));
    assert_eq!(
        outcome.subgroups.get("shape.kind").map(String::as_str),
        Some("circle")
    );
}

// Scenario: a subgroup nested inside a subgroup choice resolves across
// two rounds from one token stream.
#[test]
fn test_nested_subgroup_two_rounds() {
    let x = Schema::builder("X").build();
    let y = Schema::builder("Y").build();
    let a = Schema::builder("A").build();
    let b = Schema::builder("B")
        .field(FieldSpec::subgroup(
            "choice",
            SubgroupSpec::new().choice("x", x).choice("y", y),
        ))
        .build();
    let outer = Schema::builder("Outer")
        .field(FieldSpec::subgroup(
            "inner",
            SubgroupSpec::new().choice("a", a).choice("b", b),
        ))
        .build();

    let mut session = Session::default();
    session.register(outer, "outer").unwrap();
    let outcome = session
        .resolve_and_parse(&tokens(&["--inner", "b", "--choice", "y"]))
        .unwrap();
    assert_eq!(outcome.instance("outer"), Some(&json!({"inner": {"choice": {}}})));
    assert_eq!(
        outcome.subgroups.get("outer.inner").map(String::as_str),
        Some("b")
    );
    assert_eq!(
        outcome.subgroups.get("outer.inner.choice").map(String::as_str),
        Some("y")
    );
    assert!(outcome.unparsed.is_empty());
}

#[test]
fn test_subgroup_choice_flags_affect_chosen_schema() {
    let adam = Schema::builder("Adam")
        .field(FieldSpec::scalar("lr", ValueKind::Float).with_default(json!(0.001)))
        .build();
    let sgd = Schema::builder("Sgd")
        .field(FieldSpec::scalar("lr", ValueKind::Float).with_default(json!(0.01)))
        .field(FieldSpec::scalar("momentum", ValueKind::Float).with_default(json!(0.0)))
        .build();
    let config = Schema::builder("Config")
        .field(FieldSpec::subgroup(
            "optimizer",
            SubgroupSpec::new()
                .choice("adam", adam)
                .choice("sgd", sgd)
                .with_default_key("adam"),
        ))
        .build();

    let mut session = Session::default();
    session.register(config, "cfg").unwrap();
    let outcome = session
        .resolve_and_parse(&tokens(&["--optimizer", "sgd", "--momentum", "0.9"]))
        .unwrap();
    assert_eq!(
        outcome.instance("cfg"),
        Some(&json!({"optimizer": {"lr": 0.01, "momentum": 0.9}}))
    );
}

fn merge_session() -> Session {
    let config = Schema::builder("Config")
        .field(FieldSpec::scalar("name", ValueKind::Str).with_default(json!("n")))
        .build();
    let mut session = Session::new(ConflictPolicy::Merge);
    session.register(config.clone(), "first").unwrap();
    session.register(config.clone(), "second").unwrap();
    session.register(config, "third").unwrap();
    session
}

// Scenario: one record merged across three destinations.
#[test]
fn test_merge_broadcasts_single_value() {
    let outcome = merge_session()
        .resolve_and_parse(&tokens(&["--name", "foo"]))
        .unwrap();
    for dest in ["first", "second", "third"] {
        assert_eq!(outcome.instance(dest), Some(&json!({"name": "foo"})));
    }
}

#[test]
fn test_merge_distributes_positionally() {
    let outcome = merge_session()
        .resolve_and_parse(&tokens(&["--name", "foo", "bar", "baz"]))
        .unwrap();
    assert_eq!(outcome.instance("first"), Some(&json!({"name": "foo"})));
    assert_eq!(outcome.instance("second"), Some(&json!({"name": "bar"})));
    assert_eq!(outcome.instance("third"), Some(&json!({"name": "baz"})));
}

#[test]
fn test_merge_rejects_inconsistent_count() {
    let err = merge_session()
        .resolve_and_parse(&tokens(&["--name", "foo", "bar"]))
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::InconsistentArgumentCount {
            got: 2,
            expected: 3,
            ..
        }
    ));
}

#[test]
fn test_merge_across_nesting_depths_keeps_nested_child() {
    // Merging a nested record with a root record must still build the
    // nested side before its parent is assembled.
    let outer = Schema::builder("Outer")
        .field(FieldSpec::nested("child", point()))
        .build();
    let mut session = Session::new(ConflictPolicy::Merge);
    session.register(outer, "a").unwrap();
    session.register(point(), "b").unwrap();

    let outcome = session.resolve_and_parse(&tokens(&["--x", "5"])).unwrap();
    assert_eq!(
        outcome.instance("a"),
        Some(&json!({"child": {"x": 5, "y": 0}}))
    );
    assert_eq!(outcome.instance("b"), Some(&json!({"x": 5, "y": 0})));
}

#[test]
fn test_merge_bool_switch_broadcasts() {
    let config = Schema::builder("Config")
        .field(FieldSpec::scalar("debug", ValueKind::Bool).with_default(json!(false)))
        .build();
    let mut session = Session::new(ConflictPolicy::Merge);
    session.register(config.clone(), "first").unwrap();
    session.register(config, "second").unwrap();

    let outcome = session.resolve_and_parse(&tokens(&["--debug"])).unwrap();
    assert_eq!(outcome.instance("first"), Some(&json!({"debug": true})));
    assert_eq!(outcome.instance("second"), Some(&json!({"debug": true})));
}

#[test]
fn test_subgroup_flag_stays_valid_after_reprefixing() {
    // The chosen schema carries a field named like the subgroup flag, so
    // the conflict pass after the round re-prefixes the choice flag; the
    // token that drove the round must still be consumed.
    let adam = Schema::builder("Adam").build();
    let sgd = Schema::builder("Sgd")
        .field(FieldSpec::scalar("optimizer", ValueKind::Str).with_default(json!("plain")))
        .build();
    let config = Schema::builder("Config")
        .field(FieldSpec::subgroup(
            "optimizer",
            SubgroupSpec::new()
                .choice("adam", adam)
                .choice("sgd", sgd)
                .with_default_key("adam"),
        ))
        .build();

    let mut session = Session::default();
    session.register(config, "cfg").unwrap();
    let outcome = session
        .resolve_and_parse(&tokens(&["--optimizer", "sgd"]))
        .unwrap();
    assert!(outcome.unparsed.is_empty());
    assert_eq!(
        outcome.subgroups.get("cfg.optimizer").map(String::as_str),
        Some("sgd")
    );
    assert_eq!(
        outcome.instance("cfg"),
        Some(&json!({"optimizer": {"optimizer": "plain"}}))
    );
}

#[test]
fn test_optional_nested_collapse_and_materialization() {
    let outer = Schema::builder("Outer")
        .field(FieldSpec::optional_nested("p", point()))
        .build();

    let mut session = Session::default();
    session.register(outer.clone(), "cfg").unwrap();
    let outcome = session.resolve_and_parse(&[]).unwrap();
    assert_eq!(outcome.instance("cfg"), Some(&json!({"p": null})));

    let mut session = Session::default();
    session.register(outer, "cfg").unwrap();
    let outcome = session.resolve_and_parse(&tokens(&["--x", "3"])).unwrap();
    assert_eq!(outcome.instance("cfg"), Some(&json!({"p": {"x": 3, "y": 0}})));
}

#[test]
fn test_required_field_without_value_fails() {
    let schema = Schema::builder("Config")
        .field(FieldSpec::scalar("path", ValueKind::Str).require())
        .build();
    let mut session = Session::default();
    session.register(schema, "cfg").unwrap();
    let err = session.resolve_and_parse(&[]).unwrap_err();
    assert!(matches!(err, ResolveError::MissingRequiredField { .. }));
}

#[test]
fn test_yaml_defaults_file_overrides_schema_defaults() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(b"cfg:\n  lr: 0.5\n").unwrap();

    let schema = Schema::builder("Config")
        .field(FieldSpec::scalar("lr", ValueKind::Float).with_default(json!(0.1)))
        .field(FieldSpec::scalar("seed", ValueKind::Int).with_default(json!(42)))
        .build();
    let mut session = Session::default().with_defaults_file(file.path());
    session.register(schema, "cfg").unwrap();

    let outcome = session.resolve_and_parse(&[]).unwrap();
    assert_eq!(outcome.instance("cfg"), Some(&json!({"lr": 0.5, "seed": 42})));

    // Flags still win over the file.
    let mut session = Session::default().with_defaults_file(file.path());
    session
        .register(
            Schema::builder("Config")
                .field(FieldSpec::scalar("lr", ValueKind::Float).with_default(json!(0.1)))
                .field(FieldSpec::scalar("seed", ValueKind::Int).with_default(json!(42)))
                .build(),
            "cfg",
        )
        .unwrap();
    let outcome = session.resolve_and_parse(&tokens(&["--lr", "0.9"])).unwrap();
    assert_eq!(outcome.instance("cfg"), Some(&json!({"lr": 0.9, "seed": 42})));
}

// Re-parsing the flags implied by an instance's non-default fields
// reproduces the instance.
#[test]
fn test_round_trip_of_non_default_fields() {
    let schema = Schema::builder("Config")
        .field(FieldSpec::scalar("name", ValueKind::Str).with_default(json!("run")))
        .field(FieldSpec::scalar("lr", ValueKind::Float).with_default(json!(0.1)))
        .field(FieldSpec::scalar("seed", ValueKind::Int).with_default(json!(42)))
        .build();

    let mut session = Session::default();
    session.register(schema.clone(), "cfg").unwrap();
    let first = session
        .resolve_and_parse(&tokens(&["--name", "exp", "--seed", "7"]))
        .unwrap();
    let instance = first.instance("cfg").unwrap().clone();

    let defaults = schema.default_instance();
    let mut implied = Vec::new();
    if let (Value::Object(got), Value::Object(base)) = (&instance, &defaults) {
        for (key, value) in got {
            if base.get(key) != Some(value) {
                implied.push(format!("--{key}"));
                implied.push(render(value));
            }
        }
    }

    let mut session = Session::default();
    session.register(schema, "cfg").unwrap();
    let second = session.resolve_and_parse(&implied).unwrap();
    assert_eq!(second.instance("cfg"), Some(&instance));
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
