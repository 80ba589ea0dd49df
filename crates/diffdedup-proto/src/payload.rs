//! Cluster key and sort key extraction for JSON payloads.
//!
//! Both are addressed by JSON pointer (RFC 6901). A pointer given without
//! its leading slash, e.g. `group`, is treated as `/group`.

use diffdedup_core::{ConfigError, Dedup, EmitPolicy};
use serde_json::Value;

/// Operator over JSON payloads.
///
/// Cluster keys are the JSON values found at the key pointer; sort keys are
/// integers, see [`sort_key`].
pub type JsonDedup = Dedup<Value, Value, i64>;

/// Normalize a pointer so it starts with `/` (the empty pointer stays empty).
#[must_use]
pub fn normalize_pointer(pointer: &str) -> String {
    if pointer.is_empty() || pointer.starts_with('/') {
        pointer.to_string()
    } else {
        format!("/{pointer}")
    }
}

/// Cluster key of a payload: the value at `pointer`, or `null` if absent.
#[must_use]
pub fn cluster_key(data: &Value, pointer: &str) -> Value {
    data.pointer(pointer).cloned().unwrap_or(Value::Null)
}

/// Sort key of a payload.
///
/// The first present of: the integer at `pointer` (non-integers count as
/// absent), the op's `sortIndex`, the source position the op addressed.
#[must_use]
pub fn sort_key(data: &Value, pointer: Option<&str>, sort_index: Option<i64>, id: usize) -> i64 {
    pointer
        .and_then(|pointer| data.pointer(pointer))
        .and_then(Value::as_i64)
        .or(sort_index)
        .unwrap_or_else(|| i64::try_from(id).unwrap_or(i64::MAX))
}

/// Build an operator for JSON payloads.
///
/// # Errors
///
/// Returns [`ConfigError::MissingKeyFn`] if no key pointer is given.
pub fn json_dedup(
    key_pointer: Option<&str>,
    sort_pointer: Option<&str>,
    policy: EmitPolicy,
) -> Result<JsonDedup, ConfigError> {
    let sort_pointer = sort_pointer.map(normalize_pointer);
    let mut builder = Dedup::builder()
        .sort_fn(move |data: &Value, sort_index, id| {
            sort_key(data, sort_pointer.as_deref(), sort_index, id)
        })
        .policy(policy);

    if let Some(pointer) = key_pointer.map(normalize_pointer) {
        builder = builder.key_fn(move |data: &Value| cluster_key(data, &pointer));
    }

    builder.build()
}
