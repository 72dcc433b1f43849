//! Value codec
//!
//! Every field value is encoded as `{"type": <tag>, "value": <payload>}`:
//!
//! | tag             | payload                                              |
//! |-----------------|------------------------------------------------------|
//! | `string`        | the string                                           |
//! | `multi`         | array of encoded values (duplicates allowed)         |
//! | `discreteMulti` | array of encoded values (unique items)               |
//! | `file`          | `{fileName, publicUrl, relativePath, mimeType}`      |
//!
//! `decode_value(&encode_value(v)) == v` for every value.

use contracts::{CodecError, Data, FieldValue, FileReference};
use serde_json::{json, Map, Value};

pub const TYPE_STRING: &str = "string";
pub const TYPE_MULTI: &str = "multi";
pub const TYPE_DISCRETE_MULTI: &str = "discreteMulti";
pub const TYPE_FILE: &str = "file";

const KEY_TYPE: &str = "type";
const KEY_VALUE: &str = "value";

/// Encode one field value
pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) => json!({ "type": TYPE_STRING, "value": s }),
        FieldValue::Multi(items) => json!({ "type": TYPE_MULTI, "value": encode_items(items) }),
        FieldValue::DiscreteMulti(items) => {
            json!({ "type": TYPE_DISCRETE_MULTI, "value": encode_items(items) })
        }
        FieldValue::File(file) => json!({ "type": TYPE_FILE, "value": value_of_file(file) }),
    }
}

/// Decode one field value
///
/// # Errors
/// - `UnknownType` for an unrecognized tag
/// - `MalformedPayload` when tag or payload do not have the expected shape
pub fn decode_value(encoded: &Value) -> Result<FieldValue, CodecError> {
    let tag = encoded
        .get(KEY_TYPE)
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::malformed(format!("missing value type in {encoded}")))?;
    let payload = encoded
        .get(KEY_VALUE)
        .ok_or_else(|| CodecError::malformed(format!("missing value payload for type \"{tag}\"")))?;

    match tag {
        TYPE_STRING => scalar_to_string(payload)
            .map(FieldValue::String)
            .ok_or_else(|| CodecError::malformed(format!("string value expected, got {payload}"))),
        TYPE_MULTI => decode_items(payload).map(FieldValue::Multi),
        TYPE_DISCRETE_MULTI => decode_items(payload).map(FieldValue::DiscreteMulti),
        TYPE_FILE => Ok(FieldValue::File(serde_json::from_value::<FileReference>(
            payload.clone(),
        )?)),
        other => Err(CodecError::UnknownType(other.to_string())),
    }
}

/// Encode a whole field map
pub fn encode_data(data: &Data) -> Value {
    Value::Object(
        data.iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

/// Decode a whole field map
pub fn decode_data(encoded: &Value) -> Result<Data, CodecError> {
    match encoded {
        Value::Object(fields) => fields
            .iter()
            .map(|(name, value)| -> Result<(String, FieldValue), CodecError> {
                Ok((name.clone(), decode_value(value)?))
            })
            .collect(),
        // an empty PHP-style list is an empty map as well
        Value::Array(items) if items.is_empty() => Ok(Data::new()),
        other => Err(CodecError::malformed(format!("field map expected, got {other}"))),
    }
}

/// Build a field map from plain JSON, as received at the intake boundary
///
/// Scalars become strings, arrays multi-values, objects carrying
/// `fileName` file references.
pub fn data_from_plain(plain: &Value) -> Result<Data, CodecError> {
    let Value::Object(fields) = plain else {
        return Err(CodecError::malformed(format!("field map expected, got {plain}")));
    };
    fields
        .iter()
        .map(|(name, value)| -> Result<(String, FieldValue), CodecError> {
            Ok((name.clone(), value_from_plain(value)?))
        })
        .collect()
}

fn value_from_plain(plain: &Value) -> Result<FieldValue, CodecError> {
    match plain {
        Value::Array(items) => items
            .iter()
            .map(value_from_plain)
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::Multi),
        Value::Object(map) if map.contains_key("fileName") => Ok(FieldValue::File(
            serde_json::from_value::<FileReference>(plain.clone())?,
        )),
        Value::Null => Ok(FieldValue::String(String::new())),
        other => scalar_to_string(other)
            .map(FieldValue::String)
            .ok_or_else(|| CodecError::malformed(format!("unsupported field value {other}"))),
    }
}

fn encode_items(items: &[FieldValue]) -> Vec<Value> {
    items.iter().map(encode_value).collect()
}

fn decode_items(payload: &Value) -> Result<Vec<FieldValue>, CodecError> {
    payload
        .as_array()
        .ok_or_else(|| CodecError::malformed(format!("list value expected, got {payload}")))?
        .iter()
        .map(decode_value)
        .collect()
}

fn value_of_file(file: &FileReference) -> Value {
    let mut map = Map::new();
    map.insert("fileName".into(), file.file_name.clone().into());
    map.insert("publicUrl".into(), file.public_url.clone().into());
    map.insert("relativePath".into(), file.relative_path.clone().into());
    map.insert("mimeType".into(), file.mime_type.clone().into());
    Value::Object(map)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
