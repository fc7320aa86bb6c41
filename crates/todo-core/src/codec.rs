//! Strict JSON request decoding and envelope encoding.

use std::fmt::{Display, Formatter};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::error::Category;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

/// Largest request body accepted by [`decode`], in bytes.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// A request body shape that [`decode`] can fill.
///
/// `FIELDS` lists every top-level key the shape accepts; any other key is
/// reported as [`DecodeError::UnknownField`].
pub trait Shape: DeserializeOwned {
    const FIELDS: &'static [&'static str];
}

/// Where a type mismatch was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchLocation {
    Field(String),
    Offset(usize),
}

impl Display for MismatchLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => write!(f, "for field {name:?}"),
            Self::Offset(offset) => write!(f, "(at character {offset})"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("body contains badly-formed JSON (at character {offset})")]
    MalformedSyntax { offset: usize },
    #[error("body contains badly-formed JSON")]
    TruncatedBody,
    #[error("body contains incorrect JSON type {0}")]
    TypeMismatch(MismatchLocation),
    #[error("body must not be empty")]
    EmptyBody,
    #[error("body contains unknown key {0:?}")]
    UnknownField(String),
    #[error("body must not be larger than {0} bytes")]
    BodyTooLarge(usize),
    #[error("body must only contain a single JSON value")]
    MultipleValues,
    #[error("{0}")]
    Other(String),
}

/// Decodes exactly one JSON value from `body` into `T`.
///
/// # Errors
/// Returns the [`DecodeError`] variant describing the first problem found:
/// size, emptiness and syntax are checked before unknown keys, unknown keys
/// before field types, and a trailing second value is reported last. A key
/// that appears more than once takes its last value.
pub fn decode<T: Shape>(body: &[u8]) -> Result<T, DecodeError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(DecodeError::BodyTooLarge(MAX_BODY_BYTES));
    }

    let mut stream = serde_json::Deserializer::from_slice(body).into_iter::<Value>();
    let value = match stream.next() {
        None => return Err(DecodeError::EmptyBody),
        Some(Err(err)) => return Err(classify(body, &err)),
        Some(Ok(value)) => value,
    };
    let value_end = stream.byte_offset();

    let Value::Object(map) = &value else {
        return Err(DecodeError::TypeMismatch(MismatchLocation::Offset(value_end)));
    };
    if let Some(key) = map.keys().find(|key| !T::FIELDS.contains(&key.as_str())) {
        return Err(DecodeError::UnknownField(key.clone()));
    }

    // Decoding from the parsed value keeps the last of any repeated keys.
    let decoded: T = serde_path_to_error::deserialize(value).map_err(|err| {
        if err.path().iter().next().is_some() {
            DecodeError::TypeMismatch(MismatchLocation::Field(err.path().to_string()))
        } else {
            DecodeError::Other(err.into_inner().to_string())
        }
    })?;

    if stream.next().is_some() {
        return Err(DecodeError::MultipleValues);
    }

    Ok(decoded)
}

fn classify(body: &[u8], err: &serde_json::Error) -> DecodeError {
    match err.classify() {
        Category::Syntax => DecodeError::MalformedSyntax {
            offset: byte_offset(body, err),
        },
        Category::Eof => DecodeError::TruncatedBody,
        Category::Data => {
            DecodeError::TypeMismatch(MismatchLocation::Offset(byte_offset(body, err)))
        }
        Category::Io => DecodeError::Other(err.to_string()),
    }
}

/// Converts serde_json's 1-based line/column position into a byte offset.
fn byte_offset(body: &[u8], err: &serde_json::Error) -> usize {
    let preceding: usize = body
        .split(|byte| *byte == b'\n')
        .take(err.line().saturating_sub(1))
        .map(|line| line.len() + 1)
        .sum();
    (preceding + err.column()).min(body.len())
}

#[derive(Debug, thiserror::Error)]
#[error("failed to encode response: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Top-level response object; keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` under `key`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns [`EncodeError`] when `value` cannot be represented as JSON.
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self, EncodeError> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Serializes `envelope` as tab-indented JSON followed by a newline.
///
/// # Errors
/// Returns [`EncodeError`] if serialization fails.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(128);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
    envelope.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::item::{CreateItemInput, UpdateItemInput};
    use proptest::prelude::*;

    fn decode_create(body: &str) -> Result<CreateItemInput, DecodeError> {
        decode::<CreateItemInput>(body.as_bytes())
    }

    fn must_decode(body: &str) -> CreateItemInput {
        match decode_create(body) {
            Ok(value) => value,
            Err(err) => panic!("expected {body:?} to decode: {err}"),
        }
    }

    /// Valid create body of exactly `len` bytes, padded with trailing spaces.
    fn padded_body(len: usize) -> Vec<u8> {
        let mut body = br#"{"item":"x","description":""}"#.to_vec();
        body.resize(len, b' ');
        body
    }

    #[test]
    fn decodes_well_formed_body() {
        let input = must_decode(r#"{"item":"Buy milk","description":"2%"}"#);
        assert_eq!(input.item, "Buy milk");
        assert_eq!(input.description, "2%");
    }

    #[test]
    fn missing_keys_take_defaults() {
        let input = must_decode(r#"{"item":"only a name"}"#);
        assert!(input.description.is_empty());
    }

    #[test]
    fn empty_and_whitespace_bodies_are_empty() {
        assert_eq!(decode_create(""), Err(DecodeError::EmptyBody));
        assert_eq!(decode_create(" \n\t"), Err(DecodeError::EmptyBody));
    }

    #[test]
    fn body_over_cap_is_too_large() {
        let result = decode::<CreateItemInput>(&padded_body(MAX_BODY_BYTES + 1));
        assert_eq!(result, Err(DecodeError::BodyTooLarge(MAX_BODY_BYTES)));
        assert_eq!(
            DecodeError::BodyTooLarge(MAX_BODY_BYTES).to_string(),
            "body must not be larger than 1048576 bytes"
        );
    }

    #[test]
    fn body_at_cap_is_accepted() {
        let result = decode::<CreateItemInput>(&padded_body(MAX_BODY_BYTES));
        assert!(result.is_ok(), "unexpected error: {result:?}");
    }

    #[test]
    fn concatenated_values_are_rejected() {
        assert_eq!(
            decode_create(r#"{"item":"a"}{"item":"b"}"#),
            Err(DecodeError::MultipleValues)
        );
        assert_eq!(decode_create(r#"{"item":"a"} garbage"#), Err(DecodeError::MultipleValues));
    }

    #[test]
    fn trailing_whitespace_is_not_a_second_value() {
        let input = must_decode("{\"item\":\"a\"}\n\n");
        assert_eq!(input.item, "a");
    }

    #[test]
    fn unknown_key_is_reported_by_name() {
        let result = decode_create(r#"{"item":"a","priority":5}"#);
        assert_eq!(result, Err(DecodeError::UnknownField("priority".to_string())));
        if let Err(err) = result {
            assert_eq!(err.to_string(), "body contains unknown key \"priority\"");
        }
    }

    #[test]
    fn malformed_json_reports_offset() {
        match decode_create(r#"{"item": "a",}"#) {
            Err(DecodeError::MalformedSyntax { offset }) => {
                assert!(offset > 0 && offset <= 14, "offset out of range: {offset}");
            }
            other => panic!("expected MalformedSyntax, got {other:?}"),
        }
        assert!(matches!(
            decode_create("<html>"),
            Err(DecodeError::MalformedSyntax { offset: 1 })
        ));
    }

    #[test]
    fn truncated_json_is_reported() {
        assert_eq!(decode_create(r#"{"item": "a""#), Err(DecodeError::TruncatedBody));
        assert_eq!(
            DecodeError::TruncatedBody.to_string(),
            "body contains badly-formed JSON"
        );
    }

    #[test]
    fn wrong_field_type_names_the_field() {
        let result = decode_create(r#"{"item": 123}"#);
        assert_eq!(
            result,
            Err(DecodeError::TypeMismatch(MismatchLocation::Field("item".to_string())))
        );
        if let Err(err) = result {
            assert_eq!(err.to_string(), "body contains incorrect JSON type for field \"item\"");
        }
    }

    #[test]
    fn repeated_key_keeps_the_last_value() {
        let input = must_decode(r#"{"item":"a","item":"b"}"#);
        assert_eq!(input.item, "b");
        assert!(input.description.is_empty());
    }

    #[test]
    fn null_for_a_required_string_is_a_type_mismatch() {
        assert_eq!(
            decode_create(r#"{"item":null}"#),
            Err(DecodeError::TypeMismatch(MismatchLocation::Field("item".to_string())))
        );
    }

    #[test]
    fn wrong_top_level_type_reports_offset() {
        assert_eq!(
            decode_create(r#"["item"]"#),
            Err(DecodeError::TypeMismatch(MismatchLocation::Offset(8)))
        );
        assert_eq!(
            DecodeError::TypeMismatch(MismatchLocation::Offset(8)).to_string(),
            "body contains incorrect JSON type (at character 8)"
        );
    }

    #[test]
    fn patch_shape_distinguishes_absent_from_present() {
        let input = match decode::<UpdateItemInput>(br#"{"description":"new"}"#) {
            Ok(value) => value,
            Err(err) => panic!("expected patch to decode: {err}"),
        };
        assert_eq!(input.item, None);
        assert_eq!(input.description.as_deref(), Some("new"));
    }

    #[test]
    fn encode_indents_with_tabs_and_ends_with_newline() {
        let envelope = match Envelope::new().with("message", "Item successfully deleted") {
            Ok(envelope) => envelope,
            Err(err) => panic!("failed to build envelope: {err}"),
        };
        let bytes = match encode(&envelope) {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to encode envelope: {err}"),
        };
        assert_eq!(
            String::from_utf8_lossy(&bytes),
            "{\n\t\"message\": \"Item successfully deleted\"\n}\n"
        );
    }

    #[test]
    fn encode_preserves_key_order() {
        let envelope = Envelope::new()
            .with("todo", &Vec::<u8>::new())
            .and_then(|envelope| envelope.with("metadata", &BTreeMap::<String, i64>::new()));
        let bytes = match envelope.and_then(|envelope| encode(&envelope)) {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to encode envelope: {err}"),
        };
        let text = String::from_utf8_lossy(&bytes);
        let todo_at = text.find("\"todo\"");
        let metadata_at = text.find("\"metadata\"");
        assert!(todo_at < metadata_at, "unexpected key order: {text}");
    }

    #[test]
    fn unrepresentable_value_is_reported() {
        let mut bad = BTreeMap::new();
        bad.insert((1_u8, 2_u8), "tuple keys are not JSON object keys");
        assert!(Envelope::new().with("error", &bad).is_err());
    }

    proptest! {
        #[test]
        fn create_body_round_trips(item in "\\PC{1,60}", description in "\\PC{0,120}") {
            let input = CreateItemInput { item, description };
            let body = match serde_json::to_vec(&input) {
                Ok(body) => body,
                Err(err) => panic!("failed to serialize input: {err}"),
            };
            prop_assert_eq!(decode::<CreateItemInput>(&body), Ok(input));
        }

        #[test]
        fn size_cap_is_exact(extra in 0_usize..4) {
            let at_cap = decode::<CreateItemInput>(&padded_body(MAX_BODY_BYTES - extra));
            prop_assert!(at_cap.is_ok());
            let over_cap = decode::<CreateItemInput>(&padded_body(MAX_BODY_BYTES + 1 + extra));
            prop_assert_eq!(over_cap, Err(DecodeError::BodyTooLarge(MAX_BODY_BYTES)));
        }
    }
}
