//! Serde helpers shared across the wire types.

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

/// Whether the value is equal to its type's default.
///
/// Simple helper for `#[serde(skip_serializing_if = "…")]`.
pub fn is_default<T: Default + PartialEq>(val: &T) -> bool {
    *val == T::default()
}

/// Deserializes an optional string, mapping the empty string to `None`.
///
/// Some servers send `""` where the field should have been omitted.
pub fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.is_empty()))
}

/// Reads a power level out of a JSON value.
///
/// Accepts integers and the stringified integers some older servers emit.
pub fn power_level_from_json(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
