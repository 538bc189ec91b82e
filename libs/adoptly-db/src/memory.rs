//! In-memory [`EntityStore`].
//!
//! Rows live in per-table ordered maps keyed by the canonical id string.
//! Every write runs under the table lock and is all-or-nothing. Transactions
//! are serialized against each other and against every write made outside
//! them, and roll back to a snapshot on failure.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;
use uuid::Uuid;

use crate::columns::project;
use crate::entity::{EntityMeta, Record, RelationKind, RelationMeta, columns, id_key, lookup_path};
use crate::store::{EntityStore, FindQuery, StoreError};

tokio::task_local! {
    /// Set while the current task runs a transaction closure.
    static IN_TRANSACTION: ();
}

fn in_transaction() -> bool {
    IN_TRANSACTION.try_with(|()| ()).is_ok()
}

type Table = BTreeMap<String, Record>;
type Tables = HashMap<&'static str, Table>;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    tx_lock: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored rows of a table, soft-deleted ones included.
    #[must_use]
    pub fn row_count(&self, meta: &EntityMeta) -> usize {
        self.tables.read().get(meta.table).map_or(0, BTreeMap::len)
    }

    /// Writes outside a transaction wait for a running one to finish, so its
    /// rollback never discards them.
    async fn serialize_write(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        if in_transaction() {
            None
        } else {
            Some(self.tx_lock.lock().await)
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.tables.read())
    }

    /// Apply a write; on error the tables are left exactly as they were.
    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut tables = self.tables.write();
        let backup = tables.clone();
        let result = f(&mut tables);
        if result.is_err() {
            *tables = backup;
        }
        result
    }
}

fn now() -> Result<String, StoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| StoreError::Internal(format!("timestamp formatting failed: {e}")))
}

fn key_of(meta: &EntityMeta, record: &Record) -> Result<String, StoreError> {
    meta.id_of(record)
        .and_then(id_key)
        .ok_or(StoreError::EntityNotFound { entity: meta.name })
}

fn children<'t>(
    tables: &'t Tables,
    relation: &RelationMeta,
    foreign_key: &'static str,
    parent_key: &str,
) -> impl Iterator<Item = (&'t String, &'t Record)> {
    tables
        .get(relation.target.table)
        .into_iter()
        .flat_map(BTreeMap::iter)
        .filter(move |(_, row)| {
            row.get(foreign_key).and_then(id_key).as_deref() == Some(parent_key)
        })
}

fn hydrate(tables: &Tables, meta: &EntityMeta, row: &Record, with_deleted: bool) -> Record {
    let mut out = row.clone();
    let own_key = meta.id_of(row).and_then(id_key);

    for relation in meta.relations {
        let target = relation.target;
        let visible = |r: &&Record| with_deleted || !target.is_soft_deleted(r);
        let value = match relation.kind {
            RelationKind::BelongsTo { local_key } => row
                .get(local_key)
                .and_then(id_key)
                .and_then(|k| tables.get(target.table)?.get(&k))
                .filter(visible)
                .map_or(Value::Null, |r| Value::Object(r.clone())),
            RelationKind::HasMany { foreign_key } => Value::Array(
                own_key
                    .as_deref()
                    .map(|k| {
                        children(tables, relation, foreign_key, k)
                            .map(|(_, r)| r)
                            .filter(visible)
                            .map(|r| Value::Object(r.clone()))
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
        };
        out.insert(relation.alias.to_owned(), value);
    }
    out
}

fn find_locked(tables: &Tables, meta: &EntityMeta, query: &FindQuery) -> (Vec<Record>, u64) {
    if query.scope.is_deny_all() {
        return (Vec::new(), 0);
    }
    let Some(table) = tables.get(meta.table) else {
        return (Vec::new(), 0);
    };
    let wanted = query.id.as_ref().map(id_key);

    let matched: Vec<Record> = table
        .iter()
        .filter(|(key, _)| match &wanted {
            None => true,
            Some(wanted) => wanted.as_deref() == Some(key.as_str()),
        })
        .map(|(_, row)| row)
        .filter(|row| query.with_deleted || !meta.is_soft_deleted(row))
        .map(|row| hydrate(tables, meta, row, query.with_deleted))
        .filter(|row| {
            let owner = query
                .scope
                .filter()
                .and_then(|f| lookup_path(row, f.column().as_str()));
            query.scope.permits(owner)
        })
        .collect();

    let count = u64::try_from(matched.len()).unwrap_or(u64::MAX);
    let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
    let limit = query
        .limit
        .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

    let rows = matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|row| match &query.projection {
            Some(projection) => project(meta, &row, projection),
            None => row,
        })
        .collect();
    (rows, count)
}

fn check_unique(tables: &Tables, meta: &EntityMeta, key: &str, row: &Record) -> Result<(), StoreError> {
    let Some(table) = tables.get(meta.table) else {
        return Ok(());
    };
    for column in meta.unique {
        let Some(value) = row.get(*column).filter(|v| !v.is_null()) else {
            continue;
        };
        let taken = table
            .iter()
            .any(|(k, other)| k != key && !meta.is_soft_deleted(other) && other.get(*column) == Some(value));
        if taken {
            return Err(StoreError::Conflict {
                entity: meta.name,
                column: *column,
            });
        }
    }
    Ok(())
}

/// Upsert `record` and its cascaded relations. Returns the stored id.
fn save_locked(
    tables: &mut Tables,
    meta: &'static EntityMeta,
    mut record: Record,
    now: &str,
) -> Result<Value, StoreError> {
    let id = meta
        .id_of(&record)
        .cloned()
        .unwrap_or_else(|| Value::String(Uuid::now_v7().to_string()));
    let key = id_key(&id)
        .ok_or_else(|| StoreError::Internal(format!("{} id must be a string or a number", meta.name)))?;

    // Parents first, so the local key can point at them.
    for relation in meta.relations {
        let RelationKind::BelongsTo { local_key } = relation.kind else {
            continue;
        };
        let Some(Value::Object(parent)) = record.get(relation.alias) else {
            continue;
        };
        let parent_id = if relation.cascade {
            Some(save_locked(tables, relation.target, parent.clone(), now)?)
        } else {
            relation.target.id_of(parent).cloned()
        };
        if let Some(parent_id) = parent_id {
            record.insert(local_key.to_owned(), parent_id);
        }
    }

    let existing = tables.get(meta.table).and_then(|t| t.get(&key)).cloned();
    let mut row = existing.clone().unwrap_or_default();
    for column in meta.columns {
        match record.get(*column) {
            Some(value) => {
                row.insert((*column).to_owned(), value.clone());
            }
            None if existing.is_none() => {
                row.insert((*column).to_owned(), Value::Null);
            }
            None => {}
        }
    }
    row.insert(meta.id_column.to_owned(), id.clone());

    let created_at = existing
        .as_ref()
        .and_then(|e| e.get(columns::CREATED_AT))
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| Value::String(now.to_owned()));
    if meta.has_column(columns::CREATED_AT) {
        row.insert(columns::CREATED_AT.to_owned(), created_at);
    }
    if meta.has_column(columns::UPDATED_AT) {
        row.insert(columns::UPDATED_AT.to_owned(), Value::String(now.to_owned()));
    }
    if let Some(column) = meta.soft_delete_column {
        let marker = existing
            .as_ref()
            .and_then(|e| e.get(column))
            .cloned()
            .unwrap_or(Value::Null);
        row.insert(column.to_owned(), marker);
    }

    check_unique(tables, meta, &key, &row)?;
    tables.entry(meta.table).or_default().insert(key.clone(), row);
    debug!(table = meta.table, id = %key, created = existing.is_none(), "row saved");

    // Collections replace what is stored: children absent from the record go.
    for relation in meta.relations {
        let RelationKind::HasMany { foreign_key } = relation.kind else {
            continue;
        };
        if !relation.cascade {
            continue;
        }
        let Some(Value::Array(items)) = record.get(relation.alias) else {
            continue;
        };

        let mut kept = BTreeSet::new();
        for item in items {
            let Value::Object(child) = item else {
                return Err(StoreError::Internal(format!(
                    "{}.{} must only contain objects",
                    meta.name, relation.alias
                )));
            };
            let foreign = relation.target.id_of(child).and_then(id_key).is_some_and(|k| {
                tables
                    .get(relation.target.table)
                    .and_then(|t| t.get(&k))
                    .is_some_and(|row| {
                        row.get(foreign_key).and_then(id_key).as_deref() != Some(key.as_str())
                    })
            });
            if foreign {
                return Err(StoreError::ForeignChild {
                    entity: relation.target.name,
                    parent: meta.name,
                });
            }
            let mut child = child.clone();
            child.insert(foreign_key.to_owned(), id.clone());
            let child_id = save_locked(tables, relation.target, child, now)?;
            kept.extend(id_key(&child_id));
        }

        let orphans: Vec<String> = children(tables, relation, foreign_key, &key)
            .filter(|(k, row)| !kept.contains(*k) && !relation.target.is_soft_deleted(row))
            .map(|(k, _)| k.clone())
            .collect();
        for orphan in orphans {
            debug!(table = relation.target.table, id = %orphan, "orphan removed");
            remove_locked(tables, relation.target, &orphan);
        }
    }

    Ok(id)
}

/// Hard-delete a row and its cascaded collections. Returns whether it existed.
fn remove_locked(tables: &mut Tables, meta: &'static EntityMeta, key: &str) -> bool {
    let removed = tables
        .get_mut(meta.table)
        .and_then(|t| t.remove(key))
        .is_some();
    if !removed {
        return false;
    }
    for relation in meta.relations {
        if let RelationKind::HasMany { foreign_key } = relation.kind
            && relation.cascade
        {
            let doomed: Vec<String> = children(tables, relation, foreign_key, key)
                .map(|(k, _)| k.clone())
                .collect();
            for child in doomed {
                remove_locked(tables, relation.target, &child);
            }
        }
    }
    true
}

fn soft_remove_locked(
    tables: &mut Tables,
    meta: &'static EntityMeta,
    key: &str,
    now: &str,
) -> Result<(), StoreError> {
    let column = meta.soft_delete_column.ok_or(StoreError::Unsupported {
        entity: meta.name,
        operation: "soft delete",
    })?;
    let row = tables
        .get_mut(meta.table)
        .and_then(|t| t.get_mut(key))
        .ok_or(StoreError::EntityNotFound { entity: meta.name })?;
    row.insert(column.to_owned(), Value::String(now.to_owned()));

    for relation in meta.relations {
        if let RelationKind::HasMany { foreign_key } = relation.kind
            && relation.cascade
            && relation.target.soft_delete_column.is_some()
        {
            let live: Vec<String> = children(tables, relation, foreign_key, key)
                .filter(|(_, r)| !relation.target.is_soft_deleted(r))
                .map(|(k, _)| k.clone())
                .collect();
            for child in live {
                soft_remove_locked(tables, relation.target, &child, now)?;
            }
        }
    }
    Ok(())
}

fn reload(tables: &Tables, meta: &EntityMeta, key: &str) -> Result<Record, StoreError> {
    tables
        .get(meta.table)
        .and_then(|t| t.get(key))
        .map(|row| hydrate(tables, meta, row, true))
        .ok_or(StoreError::EntityNotFound { entity: meta.name })
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_many(
        &self,
        meta: &'static EntityMeta,
        query: &FindQuery,
    ) -> Result<(Vec<Record>, u64), StoreError> {
        Ok(self.read(|tables| find_locked(tables, meta, query)))
    }

    async fn save(&self, meta: &'static EntityMeta, record: Record) -> Result<Record, StoreError> {
        let now = now()?;
        let _serialized = self.serialize_write().await;
        self.write(|tables| {
            let id = save_locked(tables, meta, record, &now)?;
            let key = id_key(&id).unwrap_or_default();
            reload(tables, meta, &key)
        })
    }

    async fn soft_remove(
        &self,
        meta: &'static EntityMeta,
        record: &Record,
    ) -> Result<Record, StoreError> {
        let key = key_of(meta, record)?;
        let now = now()?;
        let _serialized = self.serialize_write().await;
        self.write(|tables| {
            soft_remove_locked(tables, meta, &key, &now)?;
            debug!(table = meta.table, id = %key, "row soft-deleted");
            reload(tables, meta, &key)
        })
    }

    async fn remove(&self, meta: &'static EntityMeta, record: &Record) -> Result<(), StoreError> {
        let key = key_of(meta, record)?;
        let _serialized = self.serialize_write().await;
        self.write(|tables| {
            if remove_locked(tables, meta, &key) {
                debug!(table = meta.table, id = %key, "row removed");
                Ok(())
            } else {
                Err(StoreError::EntityNotFound { entity: meta.name })
            }
        })
    }

    fn transaction<'s, T, E, F>(&'s self, f: F) -> BoxFuture<'s, Result<T, E>>
    where
        T: Send + 's,
        E: From<StoreError> + Send + 's,
        F: for<'a> FnOnce(&'a Self) -> BoxFuture<'a, Result<T, E>> + Send + 's,
    {
        Box::pin(async move {
            // A nested transaction joins the outer one.
            if in_transaction() {
                return f(self).await;
            }
            let _serialized = self.tx_lock.lock().await;
            let snapshot = self.tables.read().clone();
            let result = IN_TRANSACTION.scope((), f(self)).await;
            if result.is_err() {
                *self.tables.write() = snapshot;
                debug!("transaction rolled back");
            }
            result
        })
    }
}
