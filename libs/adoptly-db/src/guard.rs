//! Write guards: which payloads a grant allows to be written.
//!
//! Reads and writes share one [`ColumnPolicy`]. A full replacement (PUT) is
//! all-or-nothing: it is only allowed when the policy covers every column of
//! the entity and its relations, since replacing with a partially visible
//! shape would silently null out what the caller cannot see. A partial update
//! (PATCH) is checked path by path.

use adoptly_security::{ColumnPath, ColumnPolicy, ScopeValue, WILDCARD};
use serde_json::Value;

use crate::entity::EntityMeta;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("method {0} is not allowed for this grant")]
    MethodNotAllowed(String),

    #[error("{}", patch_message(.0.as_deref()))]
    PatchPropertyNotAllowed(Option<String>),

    #[error("identity fields cannot be replaced")]
    IdReplacement,
}

fn patch_message(path: Option<&str>) -> String {
    match path {
        Some(path) => format!("property '{path}' is not allowed to be updated"),
        None => "no property is allowed to be updated".to_owned(),
    }
}

/// Flatten a JSON body into dotted leaf paths.
///
/// Nested objects become `parent.child`. Arrays of objects are flattened per
/// element; once an array holds more than one element the `id` key is left
/// out, since it only locates the row to update. Paths are deduplicated and
/// keep first-seen order.
#[must_use]
pub fn flatten_paths(body: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Value::Object(map) = body {
        for (key, value) in map {
            flatten_into(key, value, &mut out);
        }
    }
    out
}

fn flatten_into(path: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{path}.{key}"), child, out);
            }
        }
        Value::Array(items) if items.iter().any(Value::is_object) => {
            let strip_id = items.len() > 1;
            for item in items {
                let Value::Object(map) = item else {
                    push_unique(out, path);
                    continue;
                };
                for (key, child) in map {
                    if strip_id && key == "id" {
                        continue;
                    }
                    flatten_into(&format!("{path}.{key}"), child, out);
                }
            }
        }
        _ => push_unique(out, path),
    }
}

fn push_unique(out: &mut Vec<String>, path: &str) {
    if !out.iter().any(|p| p == path) {
        out.push(path.to_owned());
    }
}

/// Whether an allow-list names `*` and `alias.*` for every relation.
fn covers_everything(included: &ColumnPolicy, meta: &EntityMeta) -> bool {
    included.lists(WILDCARD)
        && meta
            .relations
            .iter()
            .all(|r| included.lists(ColumnPath::relation_wildcard(r.alias).as_str()))
}

/// Whether a body path is named by the policy, verbatim or through the
/// wildcard covering it (`*` for root columns, `alias.*` for relations).
fn names_path(policy: &ColumnPolicy, meta: &EntityMeta, path: &str) -> bool {
    if policy.lists(path) {
        return true;
    }
    match path.split_once('.') {
        None => {
            policy.lists(WILDCARD)
                || policy.lists(ColumnPath::relation(meta.alias, path).as_str())
        }
        Some((head, _)) => policy.lists(ColumnPath::relation_wildcard(head).as_str()),
    }
}

/// Gate a full replacement.
///
/// # Errors
///
/// [`GuardError::MethodNotAllowed`] unless the policy is an empty deny-list
/// or an allow-list wildcarding the root and every relation.
pub fn assert_replace_allowed(policy: &ColumnPolicy, meta: &EntityMeta) -> Result<(), GuardError> {
    let allowed = match policy {
        ColumnPolicy::Exclude(paths) => paths.is_empty(),
        ColumnPolicy::Include(_) => covers_everything(policy, meta),
    };
    if allowed {
        Ok(())
    } else {
        Err(GuardError::MethodNotAllowed("PUT".to_owned()))
    }
}

/// Gate a partial update (or a create) body path by path.
///
/// # Errors
///
/// [`GuardError::PatchPropertyNotAllowed`] carrying the first offending path,
/// or no path when the allow-list is empty.
pub fn assert_patch_allowed(
    body: &Value,
    policy: &ColumnPolicy,
    meta: &EntityMeta,
) -> Result<(), GuardError> {
    let paths = flatten_paths(body);
    match policy {
        ColumnPolicy::Exclude(_) => match paths.into_iter().find(|p| names_path(policy, meta, p)) {
            Some(path) => Err(GuardError::PatchPropertyNotAllowed(Some(path))),
            None => Ok(()),
        },
        ColumnPolicy::Include(included) => {
            if included.is_empty() {
                return Err(GuardError::PatchPropertyNotAllowed(None));
            }
            if covers_everything(policy, meta) {
                return Ok(());
            }
            match paths.into_iter().find(|p| !names_path(policy, meta, p)) {
                Some(path) => Err(GuardError::PatchPropertyNotAllowed(Some(path))),
                None => Ok(()),
            }
        }
    }
}

/// Reject a body that supplies an identity value different from `expected`.
///
/// Absent or `null` values are accepted, as are values equal to `expected`
/// (UUID strings compare case-insensitively).
///
/// # Errors
///
/// [`GuardError::IdReplacement`] on mismatch.
pub fn assert_no_id_replacement(supplied: Option<&Value>, expected: &Value) -> Result<(), GuardError> {
    let Some(supplied) = supplied.filter(|v| !v.is_null()) else {
        return Ok(());
    };
    if supplied == expected {
        return Ok(());
    }
    match (ScopeValue::from_json(supplied), ScopeValue::from_json(expected)) {
        (Some(a), Some(b)) if a == b => Ok(()),
        _ => Err(GuardError::IdReplacement),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::entity::{RelationKind, RelationMeta, columns};
    use serde_json::json;

    static PET: EntityMeta = EntityMeta {
        name: "Pet",
        table: "pets",
        alias: "pet",
        id_column: columns::ID,
        columns: &["id", "name", "adopted", "shelterId"],
        relations: &[],
        unique: &[],
        soft_delete_column: None,
    };

    static SHELTER: EntityMeta = EntityMeta {
        name: "Shelter",
        table: "shelters",
        alias: "shelter",
        id_column: columns::ID,
        columns: &["id", "name"],
        relations: &[RelationMeta {
            alias: "pets",
            target: &PET,
            kind: RelationKind::HasMany {
                foreign_key: "shelterId",
            },
            cascade: true,
        }],
        unique: &[],
        soft_delete_column: None,
    };

    #[test]
    fn flatten_nested_objects_and_arrays() {
        let body = json!({
            "name": "Happy Paws",
            "user": {"email": "a@b", "address": {"city": "Lisbon"}},
            "pets": [{"id": "p1", "name": "Rex"}, {"name": "New"}]
        });
        assert_eq!(
            flatten_paths(&body),
            vec!["name", "pets.name", "user.address.city", "user.email"]
        );
    }

    #[test]
    fn flatten_keeps_id_of_single_element_arrays() {
        let body = json!({"pets": [{"id": "p1", "name": "Rex"}]});
        assert_eq!(flatten_paths(&body), vec!["pets.id", "pets.name"]);
    }

    #[test]
    fn patch_excluded_property_is_rejected() {
        let policy = ColumnPolicy::exclude(["adopted", "id", "shelterId"]);
        let err = assert_patch_allowed(&json!({"adopted": true}), &policy, &PET).unwrap_err();
        assert_eq!(err, GuardError::PatchPropertyNotAllowed(Some("adopted".to_owned())));

        assert!(assert_patch_allowed(&json!({"name": "Rex"}), &policy, &PET).is_ok());
    }

    #[test]
    fn patch_excluded_relation_wildcard_is_rejected() {
        let policy = ColumnPolicy::exclude(["pets.*"]);
        let body = json!({"pets": [{"name": "Rex"}]});
        assert_eq!(
            assert_patch_allowed(&body, &policy, &SHELTER),
            Err(GuardError::PatchPropertyNotAllowed(Some("pets.name".to_owned())))
        );
    }

    #[test]
    fn patch_with_empty_allow_list_is_rejected_without_path() {
        let policy = ColumnPolicy::include(Vec::<ColumnPath>::new());
        assert_eq!(
            assert_patch_allowed(&json!({"name": "x"}), &policy, &PET),
            Err(GuardError::PatchPropertyNotAllowed(None))
        );
    }

    #[test]
    fn patch_include_mode_checks_each_path() {
        let policy = ColumnPolicy::include(["name", "pets.name"]);
        let ok = json!({"name": "x", "pets": [{"id": "p1", "name": "a"}, {"name": "b"}]});
        assert!(assert_patch_allowed(&ok, &policy, &SHELTER).is_ok());

        let bad = json!({"name": "x", "pets": [{"name": "a", "adopted": true}, {"name": "b"}]});
        assert_eq!(
            assert_patch_allowed(&bad, &policy, &SHELTER),
            Err(GuardError::PatchPropertyNotAllowed(Some("pets.adopted".to_owned())))
        );
    }

    #[test]
    fn patch_fully_wildcarded_allow_list_short_circuits() {
        let policy = ColumnPolicy::include(["*", "pets.*"]);
        let body = json!({"anything": {"deep": 1}, "pets": [{"x": 1}]});
        assert!(assert_patch_allowed(&body, &policy, &SHELTER).is_ok());
    }

    #[test]
    fn replace_requires_full_surface() {
        assert!(assert_replace_allowed(&ColumnPolicy::unrestricted(), &SHELTER).is_ok());
        assert!(assert_replace_allowed(&ColumnPolicy::include(["*", "pets.*"]), &SHELTER).is_ok());

        let narrow = [
            ColumnPolicy::include(["*"]),
            ColumnPolicy::include(["*", "name", "pets.name"]),
            ColumnPolicy::exclude(["id"]),
        ];
        for policy in narrow {
            assert_eq!(
                assert_replace_allowed(&policy, &SHELTER),
                Err(GuardError::MethodNotAllowed("PUT".to_owned()))
            );
        }
    }

    #[test]
    fn id_replacement_only_on_mismatch() {
        let id = json!("11111111-1111-1111-1111-111111111111");

        assert!(assert_no_id_replacement(None, &id).is_ok());
        assert!(assert_no_id_replacement(Some(&json!(null)), &id).is_ok());
        assert!(assert_no_id_replacement(Some(&id), &id).is_ok());
        assert!(
            assert_no_id_replacement(Some(&json!("11111111-1111-1111-1111-111111111111".to_uppercase())), &id)
                .is_ok()
        );
        assert_eq!(
            assert_no_id_replacement(Some(&json!("22222222-2222-2222-2222-222222222222")), &id),
            Err(GuardError::IdReplacement)
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            GuardError::PatchPropertyNotAllowed(Some("adopted".to_owned())).to_string(),
            "property 'adopted' is not allowed to be updated"
        );
        assert_eq!(
            GuardError::PatchPropertyNotAllowed(None).to_string(),
            "no property is allowed to be updated"
        );
    }
}
