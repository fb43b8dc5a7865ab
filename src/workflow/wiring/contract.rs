// SPDX-License-Identifier: MIT

//! Type descriptor checks applied while wiring
//!
//! Descriptors are free-form strings. Only a small set of primitive names is
//! recognized; anything else (including "Any") accepts every value.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

use crate::cell::type_hint_of;
use crate::error::BuildError;

/// JSON kinds a descriptor can pin down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonKind::Integer,
            Value::Number(_) => JsonKind::Number,
            Value::String(_) => JsonKind::String,
            Value::Array(_) => JsonKind::Array,
            Value::Object(_) => JsonKind::Object,
        }
    }

    /// Whether a value of kind `found` may be supplied where `self` is expected
    pub fn accepts(self, found: JsonKind) -> bool {
        self == found || (self == JsonKind::Number && found == JsonKind::Integer)
    }
}

static KINDS: Lazy<HashMap<&'static str, JsonKind>> = Lazy::new(|| {
    HashMap::from([
        ("null", JsonKind::Null),
        ("none", JsonKind::Null),
        ("bool", JsonKind::Boolean),
        ("boolean", JsonKind::Boolean),
        ("int", JsonKind::Integer),
        ("integer", JsonKind::Integer),
        ("i32", JsonKind::Integer),
        ("i64", JsonKind::Integer),
        ("u32", JsonKind::Integer),
        ("u64", JsonKind::Integer),
        ("usize", JsonKind::Integer),
        ("float", JsonKind::Number),
        ("number", JsonKind::Number),
        ("f32", JsonKind::Number),
        ("f64", JsonKind::Number),
        ("str", JsonKind::String),
        ("string", JsonKind::String),
        ("list", JsonKind::Array),
        ("array", JsonKind::Array),
        ("vec", JsonKind::Array),
        ("tuple", JsonKind::Array),
        ("dict", JsonKind::Object),
        ("object", JsonKind::Object),
        ("map", JsonKind::Object),
    ])
});

/// Kind named by a descriptor such as `int`, `list[int]` or `Vec<i64>`
pub fn kind_of_descriptor(descriptor: &str) -> Option<JsonKind> {
    let base = descriptor
        .split(['[', '<'])
        .next()
        .unwrap_or(descriptor)
        .trim()
        .to_ascii_lowercase();
    KINDS.get(base.as_str()).copied()
}

/// Reject a literal whose kind contradicts the parameter's descriptor
pub fn check_literal(param: &str, descriptor: &str, value: &Value) -> Result<(), BuildError> {
    match kind_of_descriptor(descriptor) {
        Some(expected) if !expected.accepts(JsonKind::of(value)) => Err(BuildError::type_mismatch(
            param,
            descriptor,
            type_hint_of(value),
        )),
        _ => Ok(()),
    }
}

/// Reject a wired cell whose type hint contradicts the parameter's descriptor.
/// Only applies when both sides name a recognized kind.
pub fn check_hint(param: &str, descriptor: &str, hint: &str) -> Result<(), BuildError> {
    match (kind_of_descriptor(descriptor), kind_of_descriptor(hint)) {
        (Some(expected), Some(found)) if !expected.accepts(found) => {
            Err(BuildError::type_mismatch(param, descriptor, hint))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_parsing() {
        assert_eq!(kind_of_descriptor("int"), Some(JsonKind::Integer));
        assert_eq!(kind_of_descriptor("list[int]"), Some(JsonKind::Array));
        assert_eq!(kind_of_descriptor("Vec<i64>"), Some(JsonKind::Array));
        assert_eq!(kind_of_descriptor(" String "), Some(JsonKind::String));
        assert_eq!(kind_of_descriptor("Any"), None);
        assert_eq!(kind_of_descriptor("pandas.DataFrame"), None);
    }

    #[test]
    fn test_check_literal() {
        assert!(check_literal("n", "int", &json!(3)).is_ok());
        assert!(check_literal("x", "float", &json!(3)).is_ok());
        assert!(check_literal("x", "Any", &json!({"a": 1})).is_ok());

        let err = check_literal("n", "int", &json!("three")).unwrap_err();
        assert!(matches!(err, BuildError::TypeMismatch { ref param, .. } if param == "n"));
    }

    #[test]
    fn test_check_hint() {
        assert!(check_hint("nums", "list[int]", "array").is_ok());
        assert!(check_hint("nums", "list[int]", "Any").is_ok());
        assert!(check_hint("nums", "list[int]", "string").is_err());
        assert!(check_hint("total", "number", "integer").is_ok());
    }
}
