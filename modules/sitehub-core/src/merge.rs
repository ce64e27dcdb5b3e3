//! Structural merge of two upstream documents with explicit precedence.
//!
//! The primary source's non-empty values always win; the supplemental source
//! only fills genuinely absent, empty, or null fields. Nested objects merge
//! field-wise with the same rule.

use serde_json::{json, Map, Value};

/// Field names whose object values are ID-keyed sub-collections (record-id
/// → record) rather than plain nested objects. These merge item-by-item.
const KEYED_COLLECTIONS: &[&str] = &["connections", "streams", "items"];

/// Reconcile the primary and supplemental aggregation documents.
///
/// Single-source passthrough: if only one document exists it is returned
/// unmodified, with no reconciliation metadata. Both absent means total
/// aggregation failure and yields `None`.
pub fn reconcile(
    primary: Option<Value>,
    supplemental: Option<Value>,
    primary_name: &str,
    supplemental_name: &str,
) -> Option<Value> {
    match (primary, supplemental) {
        (None, None) => None,
        (Some(doc), None) | (None, Some(doc)) => Some(doc),
        (Some(primary), Some(supplemental)) => {
            let mut merged = match (primary, supplemental) {
                (Value::Object(p), Value::Object(s)) => {
                    merge_objects(&p, &s, primary_name, supplemental_name)
                }
                // Non-object documents can't be field-merged; primary wins.
                (p, _) => return Some(p),
            };
            merged.insert(
                "_sources".to_string(),
                json!([primary_name, supplemental_name]),
            );
            Some(Value::Object(merged))
        }
    }
}

/// A value the supplemental source is allowed to fill: null, empty string,
/// empty array, or empty object.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn merge_objects(
    primary: &Map<String, Value>,
    supplemental: &Map<String, Value>,
    primary_name: &str,
    supplemental_name: &str,
) -> Map<String, Value> {
    let mut out = primary.clone();

    for (key, sup_value) in supplemental {
        match out.get(key) {
            None => {
                out.insert(key.clone(), adopt_value(key, sup_value, supplemental_name));
            }
            Some(pri_value) if is_empty_value(pri_value) => {
                out.insert(key.clone(), adopt_value(key, sup_value, supplemental_name));
            }
            Some(Value::Object(pri_map)) => {
                if let Value::Object(sup_map) = sup_value {
                    let merged = if KEYED_COLLECTIONS.contains(&key.as_str()) {
                        merge_keyed_collection(pri_map, sup_map, supplemental_name)
                    } else {
                        let mut merged =
                            merge_objects(pri_map, sup_map, primary_name, supplemental_name);
                        merged.insert(
                            "_sources".to_string(),
                            json!([primary_name, supplemental_name]),
                        );
                        merged
                    };
                    out.insert(key.clone(), Value::Object(merged));
                }
                // Supplemental non-object against a primary object: primary wins.
            }
            Some(_) => {} // Non-empty primary scalar or collection wins.
        }
    }

    out
}

/// A value adopted wholesale from the supplemental source. Items of a keyed
/// sub-collection still get per-item origin tags, as if merged against an
/// empty primary collection.
fn adopt_value(key: &str, value: &Value, supplemental_name: &str) -> Value {
    match value {
        Value::Object(map) if KEYED_COLLECTIONS.contains(&key) => {
            Value::Object(merge_keyed_collection(&Map::new(), map, supplemental_name))
        }
        other => other.clone(),
    }
}

/// Union of two ID-keyed collections. Items only in the supplemental source
/// are added verbatim and tagged with their origin; items in both are
/// field-merged and tagged as cross-referenced.
fn merge_keyed_collection(
    primary: &Map<String, Value>,
    supplemental: &Map<String, Value>,
    supplemental_name: &str,
) -> Map<String, Value> {
    let mut out = primary.clone();

    for (id, sup_item) in supplemental {
        match out.get(id) {
            None => {
                let mut item = sup_item.clone();
                if let Value::Object(map) = &mut item {
                    map.insert("_source".to_string(), json!(supplemental_name));
                }
                out.insert(id.clone(), item);
            }
            Some(Value::Object(pri_item)) => {
                if let Value::Object(sup_map) = sup_item {
                    let mut merged = pri_item.clone();
                    for (field, value) in sup_map {
                        let fill = match merged.get(field) {
                            None => true,
                            Some(existing) => is_empty_value(existing),
                        };
                        if fill {
                            merged.insert(field.clone(), value.clone());
                        }
                    }
                    merged.insert("_cross_referenced".to_string(), json!(true));
                    out.insert(id.clone(), Value::Object(merged));
                }
            }
            Some(_) => {} // Primary item isn't an object; leave it alone.
        }
    }

    out
}
