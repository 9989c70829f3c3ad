//! Record-schema type definitions.
//!
//! This module defines the data model used to describe configuration
//! records: a [`Schema`] is an ordered list of [`FieldSpec`]s, each with a
//! declared [`FieldKind`]. Schemas are described once, explicitly, through
//! [`Schema::builder`] — resolution never looks anything up by name in some
//! ambient scope. The types round-trip through [`serde`] so that schemas and
//! defaults can be stored alongside the configs they describe.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of value a scalar or sequence field accepts.
///
/// The resolver delegates raw-text coercion to
/// [`coerce_scalar`](crate::coerce_scalar) based on this kind.
///
/// # Examples
///
/// ```
/// use arg_schema_core::ValueKind;
///
/// let kind = ValueKind::default();
/// assert_eq!(kind, ValueKind::Str);
///
/// let format = ValueKind::Choice(vec!["json".into(), "yaml".into()]);
/// assert!(matches!(format, ValueKind::Choice(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueKind {
    /// Boolean flag value (`true`/`false`, flag presence implies `true`).
    Bool,
    /// Integer value.
    Int,
    /// Floating-point value.
    Float,
    /// String value (the default).
    #[default]
    Str,
    /// One of a closed set of string choices.
    Choice(Vec<String>),
}

/// Declared kind of a record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A single value of the given kind.
    Scalar(ValueKind),
    /// A sequence of values of the given kind.
    Sequence(ValueKind),
    /// A nested record. When `optional`, an all-default instance collapses
    /// to `null` at instantiation time.
    Nested {
        /// Schema of the nested record.
        schema: Schema,
        /// Whether the field may be absent entirely.
        optional: bool,
    },
    /// A polymorphic choice among alternative record schemas, resolved at
    /// parse time.
    Subgroup(SubgroupSpec),
}

/// Default for a subgroup field: either a choice key, or a full instance
/// matched against the choices by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubgroupDefault {
    /// The key of the default choice.
    Key(String),
    /// A default instance, matched against each choice's all-default record.
    Instance(Value),
}

/// A closed, named enumeration of alternative record schemas.
///
/// # Examples
///
/// ```
/// use arg_schema_core::{Schema, SubgroupSpec};
///
/// let circle = Schema::builder("Circle").build();
/// let square = Schema::builder("Square").build();
/// let spec = SubgroupSpec::new()
///     .choice("circle", circle)
///     .choice("square", square)
///     .with_default_key("circle");
///
/// assert_eq!(spec.keys(), vec!["circle", "square"]);
/// assert!(spec.get("square").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SubgroupSpec {
    /// Ordered key → schema choices.
    pub choices: Vec<(String, Schema)>,
    /// Default choice, if any. Absent means the choice flag is required.
    pub default: Option<SubgroupDefault>,
}

impl SubgroupSpec {
    /// Creates an empty subgroup spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named choice.
    pub fn choice(mut self, key: &str, schema: Schema) -> Self {
        self.choices.push((key.to_string(), schema));
        self
    }

    /// Sets the default to a choice key.
    pub fn with_default_key(mut self, key: &str) -> Self {
        self.default = Some(SubgroupDefault::Key(key.to_string()));
        self
    }

    /// Sets the default to an instance value, matched against the choices'
    /// all-default records at registration time.
    pub fn with_default_instance(mut self, instance: Value) -> Self {
        self.default = Some(SubgroupDefault::Instance(instance));
        self
    }

    /// All choice keys, in declaration order.
    pub fn keys(&self) -> Vec<&str> {
        self.choices.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Looks up a choice schema by key.
    pub fn get(&self, key: &str) -> Option<&Schema> {
        self.choices
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, schema)| schema)
    }
}

/// Specification of a single record field.
///
/// Use the constructors ([`scalar`](FieldSpec::scalar),
/// [`sequence`](FieldSpec::sequence), [`nested`](FieldSpec::nested),
/// [`optional_nested`](FieldSpec::optional_nested),
/// [`subgroup`](FieldSpec::subgroup)) and chain builder methods.
///
/// # Examples
///
/// ```
/// use arg_schema_core::{FieldSpec, ValueKind};
/// use serde_json::json;
///
/// let lr = FieldSpec::scalar("lr", ValueKind::Float)
///     .with_default(json!(0.001))
///     .with_help("Learning rate");
/// assert_eq!(lr.name, "lr");
/// assert!(!lr.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Attribute name; the last segment of the field's destination path.
    pub name: String,
    /// Declared kind.
    pub kind: FieldKind,
    /// Default value, if any.
    pub default: Option<Value>,
    /// Whether a value must be supplied when no default applies.
    pub required: bool,
    /// Help text shown in usage output.
    pub help: Option<String>,
    /// Alternative flag names.
    pub aliases: Vec<String>,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
            required: false,
            help: None,
            aliases: Vec::new(),
        }
    }

    /// Creates a scalar field.
    pub fn scalar(name: &str, kind: ValueKind) -> Self {
        Self::new(name, FieldKind::Scalar(kind))
    }

    /// Creates a sequence field.
    pub fn sequence(name: &str, kind: ValueKind) -> Self {
        Self::new(name, FieldKind::Sequence(kind))
    }

    /// Creates a nested-record field.
    pub fn nested(name: &str, schema: Schema) -> Self {
        Self::new(
            name,
            FieldKind::Nested {
                schema,
                optional: false,
            },
        )
    }

    /// Creates an optional nested-record field. When every sub-field is left
    /// at its default, the field resolves to `null`.
    pub fn optional_nested(name: &str, schema: Schema) -> Self {
        Self::new(
            name,
            FieldKind::Nested {
                schema,
                optional: true,
            },
        )
    }

    /// Creates a subgroup-choice field.
    pub fn subgroup(name: &str, spec: SubgroupSpec) -> Self {
        Self::new(name, FieldKind::Subgroup(spec))
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Marks the field as required.
    pub fn require(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the help text.
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// Adds an alternative flag name.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Whether this is a plain (scalar or sequence) field.
    pub fn is_plain(&self) -> bool {
        matches!(self.kind, FieldKind::Scalar(_) | FieldKind::Sequence(_))
    }
}

/// A typed, named record schema: the unit registered at tree roots and
/// instantiated at every node of the resolution tree.
///
/// # Examples
///
/// ```
/// use arg_schema_core::{Schema, FieldSpec, ValueKind};
/// use serde_json::json;
///
/// let point = Schema::builder("Point")
///     .field(FieldSpec::scalar("x", ValueKind::Int).with_default(json!(0)))
///     .field(FieldSpec::scalar("y", ValueKind::Int).with_default(json!(0)))
///     .build();
///
/// assert_eq!(point.name, "Point");
/// assert!(point.field("x").is_some());
/// assert_eq!(point.default_instance(), json!({"x": 0, "y": 0}));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Schema id; two registrations of the same id wrap the same schema.
    pub name: String,
    /// Fields, in declaration order.
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// Starts building a schema with the given id.
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                name: name.to_string(),
                fields: Vec::new(),
            },
        }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The record built purely from field defaults.
    ///
    /// Fields without a default become `null`; nested records recurse;
    /// subgroup fields use their default choice's record when one exists.
    pub fn default_instance(&self) -> Value {
        let mut object = serde_json::Map::new();
        for field in &self.fields {
            let value = match &field.kind {
                FieldKind::Nested { schema, optional } => match &field.default {
                    Some(default) => default.clone(),
                    None if *optional => Value::Null,
                    None => schema.default_instance(),
                },
                FieldKind::Subgroup(spec) => match &spec.default {
                    Some(SubgroupDefault::Key(key)) => spec
                        .get(key)
                        .map(Schema::default_instance)
                        .unwrap_or(Value::Null),
                    Some(SubgroupDefault::Instance(value)) => value.clone(),
                    None => Value::Null,
                },
                FieldKind::Scalar(_) | FieldKind::Sequence(_) => {
                    field.default.clone().unwrap_or(Value::Null)
                }
            };
            object.insert(field.name.clone(), value);
        }
        Value::Object(object)
    }
}

/// Builder returned by [`Schema::builder`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Adds a field.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.schema.fields.push(field);
        self
    }

    /// Finishes the schema.
    pub fn build(self) -> Schema {
        self.schema
    }
}
