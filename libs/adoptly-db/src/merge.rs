//! Deep merge of a partial body onto a loaded entity (PATCH semantics).
//!
//! The merge is driven by [`EntityMeta`]: collections declared as has-many
//! relations are keyed by `id`, everything else merges structurally.
//! A merge never removes an element that the body does not mention.

use serde_json::Value;

use crate::entity::{EntityMeta, Record, id_key};

/// Merge `patch` into `target` in place.
///
/// - nested objects merge recursively (created when absent);
/// - declared has-many arrays: an element whose `id` matches an existing
///   element merges into it, any other element is appended;
/// - scalars and undeclared arrays overwrite; explicit `null` assigns `null`.
pub fn merge_record(meta: &EntityMeta, target: &mut Record, patch: &Record) {
    for (key, incoming) in patch {
        let relation = meta.relation(key);
        match (relation, incoming) {
            (Some(rel), Value::Array(items)) if rel.is_collection() => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(existing) = slot {
                    merge_collection(rel.target, existing, items);
                }
            }
            (Some(rel), Value::Object(child)) => {
                merge_object_into(target, key, child, |obj| merge_record(rel.target, obj, child));
            }
            (None, Value::Object(child)) => {
                merge_object_into(target, key, child, |obj| merge_untyped(obj, child));
            }
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

fn merge_object_into(
    target: &mut Record,
    key: &str,
    child: &Record,
    merge: impl FnOnce(&mut Record),
) {
    match target.get_mut(key) {
        Some(Value::Object(existing)) => merge(existing),
        _ => {
            target.insert(key.to_owned(), Value::Object(child.clone()));
        }
    }
}

fn merge_collection(meta: &EntityMeta, existing: &mut Vec<Value>, incoming: &[Value]) {
    for item in incoming {
        let Value::Object(patch) = item else {
            existing.push(item.clone());
            continue;
        };
        let key = meta.id_of(patch).and_then(id_key);
        let slot = key.as_ref().and_then(|key| {
            existing.iter_mut().find_map(|e| match e {
                Value::Object(row) if meta.id_of(row).and_then(id_key).as_ref() == Some(key) => {
                    Some(row)
                }
                _ => None,
            })
        });
        match slot {
            Some(row) => merge_record(meta, row, patch),
            None => existing.push(item.clone()),
        }
    }
}

/// Structural merge for objects with no metadata attached.
fn merge_untyped(target: &mut Record, patch: &Record) {
    for (key, incoming) in patch {
        match (target.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(child)) => merge_untyped(existing, child),
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}
