//! Raw flag text to typed value coercion.
//!
//! The resolution engine treats parsed flag values as raw strings; this
//! module turns them into [`serde_json::Value`]s according to the declared
//! [`ValueKind`]. It is the only place where value syntax is interpreted.
//!
//! # Examples
//!
//! ```
//! use arg_schema_core::{coerce_scalar, coerce_sequence, ValueKind};
//! use serde_json::json;
//!
//! assert_eq!(coerce_scalar(&ValueKind::Int, "42").unwrap(), json!(42));
//! assert_eq!(coerce_scalar(&ValueKind::Bool, "true").unwrap(), json!(true));
//!
//! let seq = coerce_sequence(&ValueKind::Float, &["0.5".into(), "1.5".into()]).unwrap();
//! assert_eq!(seq, json!([0.5, 1.5]));
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::ValueKind;

/// Errors produced when raw text does not fit the declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoerceError {
    /// Text is not a boolean (`true`/`false`/`1`/`0`).
    #[error("'{0}' is not a boolean (expected true/false/1/0)")]
    InvalidBool(String),
    /// Text is not an integer.
    #[error("'{0}' is not an integer")]
    InvalidInt(String),
    /// Text is not a number.
    #[error("'{0}' is not a number")]
    InvalidFloat(String),
    /// Text is not one of the declared choices.
    #[error("'{value}' is not one of the choices [{}]", choices.join(", "))]
    UnknownChoice {
        /// The rejected text.
        value: String,
        /// The declared choices.
        choices: Vec<String>,
    },
}

/// Coerces a single raw token into a typed value.
pub fn coerce_scalar(kind: &ValueKind, raw: &str) -> Result<Value, CoerceError> {
    match kind {
        ValueKind::Bool => match raw {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(CoerceError::InvalidBool(raw.to_string())),
        },
        ValueKind::Int => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| CoerceError::InvalidInt(raw.to_string())),
        ValueKind::Float => raw
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| CoerceError::InvalidFloat(raw.to_string())),
        ValueKind::Str => Ok(Value::String(raw.to_string())),
        ValueKind::Choice(choices) => {
            if choices.iter().any(|c| c == raw) {
                Ok(Value::String(raw.to_string()))
            } else {
                Err(CoerceError::UnknownChoice {
                    value: raw.to_string(),
                    choices: choices.clone(),
                })
            }
        }
    }
}

/// Coerces a list of raw tokens into a typed array value.
pub fn coerce_sequence(kind: &ValueKind, raws: &[String]) -> Result<Value, CoerceError> {
    let values = raws
        .iter()
        .map(|raw| coerce_scalar(kind, raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(values))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_coerce_bool_accepts_numeric_forms() {
        assert_eq!(coerce_scalar(&ValueKind::Bool, "1").unwrap(), json!(true));
        assert_eq!(coerce_scalar(&ValueKind::Bool, "0").unwrap(), json!(false));
    }

    #[test]
    fn test_coerce_rejects_bad_int() {
        let err = coerce_scalar(&ValueKind::Int, "three").unwrap_err();
        assert_eq!(err, CoerceError::InvalidInt("three".to_string()));
    }

    #[test]
    fn test_coerce_negative_numbers() {
        assert_eq!(coerce_scalar(&ValueKind::Int, "-3").unwrap(), json!(-3));
        assert_eq!(
            coerce_scalar(&ValueKind::Float, "-0.5").unwrap(),
            json!(-0.5)
        );
    }

    #[test]
    fn test_coerce_choice_validates_membership() {
        let kind = ValueKind::Choice(vec!["json".into(), "yaml".into()]);
        assert_eq!(coerce_scalar(&kind, "yaml").unwrap(), json!("yaml"));
        assert!(matches!(
            coerce_scalar(&kind, "toml"),
            Err(CoerceError::UnknownChoice { .. })
        ));
    }

    #[test]
    fn test_coerce_sequence_fails_on_first_bad_element() {
        let err = coerce_sequence(&ValueKind::Int, &["1".into(), "x".into()]).unwrap_err();
        assert_eq!(err, CoerceError::InvalidInt("x".to_string()));
    }
}
