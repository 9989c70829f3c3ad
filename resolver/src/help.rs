//! Help-text lookup for flags whose field specs carry none.
//!
//! Help text attached directly to a [`FieldSpec`] always wins; a
//! [`HelpLookup`] source only fills the gaps. The session consults the
//! source once, after the node tree is built, so lookups never run during
//! parsing.

use std::collections::BTreeMap;

use arg_schema_core::Schema;

/// A source of help text keyed by schema and field name.
pub trait HelpLookup {
    /// Help text for `field` of `schema`, when the source knows it.
    fn lookup(&self, schema: &Schema, field: &str) -> Option<String>;
}

/// Map-backed help source: `(schema name, field name)` → text.
#[derive(Debug, Clone, Default)]
pub struct StaticHelp {
    entries: BTreeMap<(String, String), String>,
}

impl StaticHelp {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous text for the same field.
    pub fn with(mut self, schema: &str, field: &str, text: &str) -> Self {
        self.entries
            .insert((schema.to_string(), field.to_string()), text.to_string());
        self
    }
}

impl HelpLookup for StaticHelp {
    fn lookup(&self, schema: &Schema, field: &str) -> Option<String> {
        self.entries
            .get(&(schema.name.clone(), field.to_string()))
            .cloned()
    }
}
