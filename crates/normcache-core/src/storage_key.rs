//! # Storage Key Codec
//!
//! Derives the cache key of a field selection from its name and literal
//! arguments:
//!
//! ```text
//! name
//! name{"argA":"valA","argB":"valB"}
//! ```
//!
//! Arguments keep their source order. Names and values are JSON-escaped, so a
//! value containing `"` or `,` cannot collide with another argument list.
//! Numbers keep their literal text, booleans become `"true"`/`"false"`, and
//! the null literal is written unquoted so it stays distinct from `"null"`.

use crate::document::{Argument, ArgumentValue};
use crate::{CacheError, StorageKey};

/// Encode a field name and its arguments into a storage key.
///
/// Only scalar literals are accepted. Variables, enums, lists and input
/// objects fail with [`CacheError::UnsupportedArgument`].
pub fn encode(field_name: &str, arguments: &[Argument]) -> Result<StorageKey, CacheError> {
    if arguments.is_empty() {
        return Ok(StorageKey::new(field_name));
    }

    let mut key = String::with_capacity(field_name.len() + arguments.len() * 16);
    key.push_str(field_name);
    key.push('{');
    for (index, argument) in arguments.iter().enumerate() {
        if index > 0 {
            key.push(',');
        }
        key.push_str(&quoted(&argument.name));
        key.push(':');
        key.push_str(&encode_value(field_name, argument)?);
    }
    key.push('}');

    Ok(StorageKey::new(key))
}

fn encode_value(field_name: &str, argument: &Argument) -> Result<String, CacheError> {
    let unsupported = |reason: String| CacheError::UnsupportedArgument {
        field: field_name.to_owned(),
        argument: argument.name.clone(),
        reason,
    };

    match &argument.value {
        ArgumentValue::String(s) => Ok(quoted(s)),
        ArgumentValue::Int(text) | ArgumentValue::Float(text) => Ok(quoted(text)),
        ArgumentValue::Boolean(b) => Ok(quoted(if *b { "true" } else { "false" })),
        ArgumentValue::Null => Ok("null".to_owned()),
        ArgumentValue::Variable(source) => Err(unsupported(format!("variable {source}"))),
        ArgumentValue::Enum(source) => Err(unsupported(format!("enum value {source}"))),
        ArgumentValue::List(source) => Err(unsupported(format!("list {source}"))),
        ArgumentValue::Object(source) => Err(unsupported(format!("input object {source}"))),
    }
}

fn quoted(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn string_arg(name: &str, value: &str) -> Argument {
        Argument::new(name, ArgumentValue::String(value.into()))
    }

    #[test]
    fn bare_field_is_its_name() {
        assert_eq!(encode("name", &[]), Ok(StorageKey::new("name")));
    }

    #[test]
    fn arguments_are_encoded_in_source_order() {
        let key = encode(
            "person",
            &[string_arg("b", "2"), string_arg("a", "1")],
        )
        .expect("encode");
        assert_eq!(key.as_str(), r#"person{"b":"2","a":"1"}"#);
    }

    #[test]
    fn canonical_person_key() {
        let key = encode("person", &[string_arg("id", "cGVvcGxlOjEz")]).expect("encode");
        assert_eq!(key.as_str(), r#"person{"id":"cGVvcGxlOjEz"}"#);
    }

    #[test]
    fn different_arguments_produce_different_keys() {
        let x = encode("person", &[string_arg("id", "X")]).expect("x");
        let y = encode("person", &[string_arg("id", "Y")]).expect("y");
        assert_ne!(x, y);
        assert_eq!(x, encode("person", &[string_arg("id", "X")]).expect("x again"));
    }

    #[test]
    fn scalar_literal_kinds() {
        let key = encode(
            "list",
            &[
                Argument::new("first", ArgumentValue::Int("10".into())),
                Argument::new("ratio", ArgumentValue::Float("0.5".into())),
                Argument::new("all", ArgumentValue::Boolean(false)),
                Argument::new("after", ArgumentValue::Null),
            ],
        )
        .expect("encode");
        assert_eq!(
            key.as_str(),
            r#"list{"first":"10","ratio":"0.5","all":"false","after":null}"#
        );
    }

    #[test]
    fn null_literal_differs_from_null_string() {
        let literal = encode("f", &[Argument::new("a", ArgumentValue::Null)]).expect("literal");
        let text = encode("f", &[string_arg("a", "null")]).expect("text");
        assert_ne!(literal, text);
    }

    #[test]
    fn values_are_escaped() {
        let tricky = encode("f", &[string_arg("a", r#"1","b":"2"#)]).expect("tricky");
        let split = encode("f", &[string_arg("a", "1"), string_arg("b", "2")]).expect("split");
        assert_ne!(tricky, split);
        assert_eq!(tricky.as_str(), r#"f{"a":"1\",\"b\":\"2"}"#);
    }

    #[test]
    fn non_literal_arguments_rejected() {
        for value in [
            ArgumentValue::Variable("$id".into()),
            ArgumentValue::Enum("JEDI".into()),
            ArgumentValue::List("[1, 2]".into()),
            ArgumentValue::Object("{a: 1}".into()),
        ] {
            let result = encode("person", &[Argument::new("id", value)]);
            assert!(
                matches!(
                    &result,
                    Err(CacheError::UnsupportedArgument { field, argument, .. })
                        if field == "person" && argument == "id"
                ),
                "unexpected {result:?}"
            );
        }
    }
}
