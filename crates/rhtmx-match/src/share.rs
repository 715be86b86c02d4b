//! Structural sharing for search and loader payloads
//!
//! Downstream consumers detect changes with `Arc::ptr_eq`, so a freshly
//! computed value that is deeply equal to the previous one must come back as
//! the previous `Arc`.

use serde_json::{Map, Value};
use std::sync::Arc;

/// Returns `prev` when `next` is deeply equal to it, otherwise a new `Arc`
pub fn replace_equal_deep(prev: &Arc<Value>, next: Value) -> Arc<Value> {
    if **prev == next {
        Arc::clone(prev)
    } else {
        Arc::new(next)
    }
}

/// Shallow-merges two JSON objects, `overlay` winning on conflicts
///
/// A non-object side is replaced by the other side; a null overlay keeps `base`.
pub fn merge_objects(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged: Map<String, Value> = base.clone();
            merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::Object(merged)
        }
        (base, Value::Null) => base.clone(),
        (_, overlay) => overlay.clone(),
    }
}

/// An empty JSON object
pub fn empty_object() -> Arc<Value> {
    Arc::new(Value::Object(Map::new()))
}
