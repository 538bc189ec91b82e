//! Static entity metadata.
//!
//! Each entity type is described once by an [`EntityMeta`] value (usually a
//! `static`): its table, root alias, columns and the relations joined when it
//! is loaded. Column selection, write guards, the deep merge and the stores
//! all work from this description instead of reflecting over records.

use serde_json::{Map, Value};

/// A loaded row: root columns plus one key per hydrated relation.
pub type Record = Map<String, Value>;

/// Conventional column names shared by every entity.
pub mod columns {
    pub const ID: &str = "id";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const DELETED_AT: &str = "deletedAt";
}

/// How a relation is keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The root row holds `local_key`, pointing at the target's id.
    BelongsTo { local_key: &'static str },
    /// Target rows hold `foreign_key`, pointing at the root's id.
    HasMany { foreign_key: &'static str },
}

/// A relation joined whenever the owning entity is loaded.
#[derive(Debug)]
pub struct RelationMeta {
    /// Alias used in column paths and as the record key (`user`, `pets`).
    pub alias: &'static str,
    pub target: &'static EntityMeta,
    pub kind: RelationKind,
    /// Saving the owner also saves (and for collections, prunes) the target.
    pub cascade: bool,
}

impl RelationMeta {
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, RelationKind::HasMany { .. })
    }
}

#[derive(Debug)]
pub struct EntityMeta {
    /// Human-readable name used in error messages (`Pet`).
    pub name: &'static str,
    pub table: &'static str,
    /// Root alias; root columns may be referenced as `alias.column`.
    pub alias: &'static str,
    pub id_column: &'static str,
    pub columns: &'static [&'static str],
    pub relations: &'static [RelationMeta],
    /// Columns whose non-null values must be unique among live rows.
    pub unique: &'static [&'static str],
    /// Timestamp column marking soft-deleted rows, if the entity supports it.
    pub soft_delete_column: Option<&'static str>,
}

impl EntityMeta {
    #[must_use]
    pub fn relation(&self, alias: &str) -> Option<&'static RelationMeta> {
        self.relations.iter().find(|r| r.alias == alias)
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }

    /// The id of a record, if present and not null.
    #[must_use]
    pub fn id_of<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        record.get(self.id_column).filter(|v| !v.is_null())
    }

    /// Whether a record carries a soft-delete marker.
    #[must_use]
    pub fn is_soft_deleted(&self, record: &Record) -> bool {
        self.soft_delete_column
            .and_then(|col| record.get(col))
            .is_some_and(|v| !v.is_null())
    }
}

/// Read a possibly dotted path (`name`, `pet.shelterId`) out of a hydrated record.
#[must_use]
pub fn lookup_path<'r>(record: &'r Record, path: &str) -> Option<&'r Value> {
    match path.split_once('.') {
        Some((relation, column)) => record.get(relation)?.as_object()?.get(column),
        None => record.get(path),
    }
}

/// Canonical string form of an id value: strings as-is, numbers printed.
#[must_use]
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_ascii_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}
