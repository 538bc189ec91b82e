//! Column selection: turning a [`ColumnPolicy`] into a concrete projection.

use std::collections::BTreeSet;

use adoptly_security::{ColumnPath, ColumnPolicy, WILDCARD};
use serde_json::Value;

use crate::entity::{EntityMeta, Record, RelationMeta};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    /// The policy selects nothing at all, which means the rule table names
    /// columns the entity does not have.
    #[error("column policy selects no columns of {entity}")]
    EmptyProjection { entity: &'static str },
}

/// Whether a root column is named by the policy, bare, aliased or through `*`.
fn names_root(policy: &ColumnPolicy, meta: &EntityMeta, column: &str) -> bool {
    policy.lists(WILDCARD)
        || policy.lists(column)
        || policy.lists(ColumnPath::relation(meta.alias, column).as_str())
}

fn names_relation_column(policy: &ColumnPolicy, relation: &RelationMeta, column: &str) -> bool {
    policy.lists(ColumnPath::relation_wildcard(relation.alias).as_str())
        || policy.lists(ColumnPath::relation(relation.alias, column).as_str())
}

/// Compute the columns a caller may see for an entity and its relations.
///
/// Root columns come back bare (`name`), relation columns as `alias.column`.
/// The result is sorted and must be treated as a set.
///
/// # Errors
///
/// [`SelectError::EmptyProjection`] when nothing is selected.
pub fn select_columns(
    meta: &EntityMeta,
    policy: &ColumnPolicy,
) -> Result<Vec<ColumnPath>, SelectError> {
    let keep = |named: bool| match policy {
        ColumnPolicy::Exclude(_) => !named,
        ColumnPolicy::Include(_) => named,
    };

    let mut selected = BTreeSet::new();
    for column in meta.columns {
        if keep(names_root(policy, meta, column)) {
            selected.insert(ColumnPath::root(column));
        }
    }
    for relation in meta.relations {
        for column in relation.target.columns {
            if keep(names_relation_column(policy, relation, column)) {
                selected.insert(ColumnPath::relation(relation.alias, column));
            }
        }
    }

    if selected.is_empty() {
        return Err(SelectError::EmptyProjection { entity: meta.name });
    }
    Ok(selected.into_iter().collect())
}

/// Every column path of the entity: what an unrestricted caller sees.
#[must_use]
pub fn all_columns(meta: &EntityMeta) -> Vec<ColumnPath> {
    let root = meta.columns.iter().map(|c| ColumnPath::root(c));
    let related = meta.relations.iter().flat_map(|r| {
        r.target
            .columns
            .iter()
            .map(|c| ColumnPath::relation(r.alias, c))
    });
    root.chain(related).collect()
}

/// Trim a hydrated record down to a projection.
///
/// Relations keep their shape (object, array of objects or `null`) with only
/// the selected columns; a relation with no selected column is dropped.
#[must_use]
pub fn project(meta: &EntityMeta, record: &Record, projection: &[ColumnPath]) -> Record {
    let mut out = Record::new();

    for path in projection {
        if path.split().is_none()
            && let Some(value) = record.get(path.as_str())
        {
            out.insert(path.as_str().to_owned(), value.clone());
        }
    }

    for relation in meta.relations {
        let columns: Vec<&str> = projection
            .iter()
            .filter_map(|p| p.split())
            .filter(|(alias, _)| *alias == relation.alias)
            .map(|(_, column)| column)
            .collect();
        if columns.is_empty() {
            continue;
        }
        let Some(value) = record.get(relation.alias) else {
            continue;
        };
        let projected = match value {
            Value::Object(row) => Value::Object(pick(row, &columns)),
            Value::Array(rows) => Value::Array(
                rows.iter()
                    .map(|v| match v {
                        Value::Object(row) => Value::Object(pick(row, &columns)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        };
        out.insert(relation.alias.to_owned(), projected);
    }

    out
}

fn pick(row: &Record, columns: &[&str]) -> Record {
    columns
        .iter()
        .filter_map(|c| row.get(*c).map(|v| ((*c).to_owned(), v.clone())))
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::entity::{RelationKind, columns};
    use serde_json::json;

    static USER: EntityMeta = EntityMeta {
        name: "User",
        table: "users",
        alias: "user",
        id_column: columns::ID,
        columns: &["id", "email", "password"],
        relations: &[],
        unique: &[],
        soft_delete_column: None,
    };

    static PET: EntityMeta = EntityMeta {
        name: "Pet",
        table: "pets",
        alias: "pet",
        id_column: columns::ID,
        columns: &["id", "name", "shelterId"],
        relations: &[],
        unique: &[],
        soft_delete_column: None,
    };

    static SHELTER: EntityMeta = EntityMeta {
        name: "Shelter",
        table: "shelters",
        alias: "shelter",
        id_column: columns::ID,
        columns: &["id", "name", "userId"],
        relations: &[
            RelationMeta {
                alias: "user",
                target: &USER,
                kind: RelationKind::BelongsTo { local_key: "userId" },
                cascade: true,
            },
            RelationMeta {
                alias: "pets",
                target: &PET,
                kind: RelationKind::HasMany {
                    foreign_key: "shelterId",
                },
                cascade: true,
            },
        ],
        unique: &[],
        soft_delete_column: None,
    };

    fn paths(v: &[ColumnPath]) -> Vec<&str> {
        v.iter().map(ColumnPath::as_str).collect()
    }

    #[test]
    fn empty_exclude_selects_everything() {
        let selected = select_columns(&SHELTER, &ColumnPolicy::unrestricted()).unwrap();
        let mut expected = all_columns(&SHELTER);
        expected.sort();
        assert_eq!(selected, expected);
        assert_eq!(selected.len(), 3 + 3 + 3);
    }

    #[test]
    fn include_star_only_selects_root_columns() {
        let selected = select_columns(&SHELTER, &ColumnPolicy::include(["*"])).unwrap();
        assert_eq!(paths(&selected), vec!["id", "name", "userId"]);
    }

    #[test]
    fn include_relation_wildcard_and_explicit_columns() {
        let policy = ColumnPolicy::include(["name", "user.email", "pets.*"]);
        let selected = select_columns(&SHELTER, &policy).unwrap();
        assert_eq!(
            paths(&selected),
            vec!["name", "pets.id", "pets.name", "pets.shelterId", "user.email"]
        );
    }

    #[test]
    fn exclude_removes_listed_and_wildcarded_paths() {
        let policy = ColumnPolicy::exclude(["user.password", "pets.*", "shelter.userId"]);
        let selected = select_columns(&SHELTER, &policy).unwrap();
        assert_eq!(paths(&selected), vec!["id", "name", "user.email", "user.id"]);
    }

    #[test]
    fn empty_projection_is_misconfiguration() {
        let policy = ColumnPolicy::include(["nonexistent"]);
        assert_eq!(
            select_columns(&PET, &policy),
            Err(SelectError::EmptyProjection { entity: "Pet" })
        );
    }

    #[test]
    fn project_trims_root_and_relations() {
        let record = json!({
            "id": "s1",
            "name": "Happy Paws",
            "userId": "u1",
            "user": {"id": "u1", "email": "a@b", "password": "hash"},
            "pets": [{"id": "p1", "name": "Rex", "shelterId": "s1"}]
        });
        let projection = select_columns(
            &SHELTER,
            &ColumnPolicy::exclude(["user.password", "pets.shelterId", "userId"]),
        )
        .unwrap();

        let out = project(&SHELTER, record.as_object().unwrap(), &projection);
        assert_eq!(
            Value::Object(out),
            json!({
                "id": "s1",
                "name": "Happy Paws",
                "user": {"id": "u1", "email": "a@b"},
                "pets": [{"id": "p1", "name": "Rex"}]
            })
        );
    }
}
