//! The persistence contract consumed by entity controllers.

use adoptly_security::{ColumnPath, OwnerScope};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::entity::{EntityMeta, Record};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    EntityNotFound { entity: &'static str },

    #[error("{entity} with this {column} already exists")]
    Conflict {
        entity: &'static str,
        column: &'static str,
    },

    /// A collection element names a row that is linked to another parent.
    #[error("{entity} belongs to another {parent}")]
    ForeignChild {
        entity: &'static str,
        parent: &'static str,
    },

    #[error("{entity} does not support {operation}")]
    Unsupported {
        entity: &'static str,
        operation: &'static str,
    },

    #[error("store failure: {0}")]
    Internal(String),
}

/// Query parameters for reads.
///
/// A query is scoped by an [`OwnerScope`]; the store applies it as a row
/// restriction before counting and paging, so rows outside the scope are
/// never returned or counted.
#[derive(Debug, Clone)]
pub struct FindQuery {
    pub id: Option<Value>,
    pub scope: OwnerScope,
    /// Columns to return; `None` returns the full hydrated record.
    pub projection: Option<Vec<ColumnPath>>,
    pub with_deleted: bool,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    /// Every live row, unscoped and unprojected.
    #[must_use]
    pub fn all() -> Self {
        Self {
            id: None,
            scope: OwnerScope::allow_all(),
            projection: None,
            with_deleted: false,
            offset: 0,
            limit: None,
        }
    }

    #[must_use]
    pub fn by_id(id: Value) -> Self {
        Self {
            id: Some(id),
            ..Self::all()
        }
    }

    #[must_use]
    pub fn scoped(mut self, scope: OwnerScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn project(mut self, projection: Vec<ColumnPath>) -> Self {
        self.projection = Some(projection);
        self
    }

    #[must_use]
    pub fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    #[must_use]
    pub fn page(mut self, offset: u64, limit: Option<u64>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

/// Relational persistence for records described by [`EntityMeta`].
///
/// Reads hydrate every relation declared in the metadata. `save` is an
/// upsert that cascades into relations marked `cascade`; for has-many
/// collections present in the record, rows missing from the collection are
/// removed.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Rows matching the query, plus the number of matches before paging.
    ///
    /// # Errors
    ///
    /// [`StoreError::Internal`] on backend failures.
    async fn find_many(
        &self,
        meta: &'static EntityMeta,
        query: &FindQuery,
    ) -> Result<(Vec<Record>, u64), StoreError>;

    /// Exactly one row.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] when nothing matches.
    async fn find_one_or_fail(
        &self,
        meta: &'static EntityMeta,
        query: &FindQuery,
    ) -> Result<Record, StoreError> {
        let (mut rows, _) = self.find_many(meta, &query.clone().page(0, Some(1))).await?;
        rows.pop()
            .ok_or(StoreError::EntityNotFound { entity: meta.name })
    }

    /// # Errors
    ///
    /// [`StoreError::Conflict`] on unique-column violations,
    /// [`StoreError::ForeignChild`] when a cascaded collection names a row
    /// linked to another parent.
    async fn save(&self, meta: &'static EntityMeta, record: Record) -> Result<Record, StoreError>;

    /// Mark a row (and its cascaded collections) as deleted.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unsupported`] when the entity has no soft-delete column,
    /// [`StoreError::EntityNotFound`] when the row is gone.
    async fn soft_remove(
        &self,
        meta: &'static EntityMeta,
        record: &Record,
    ) -> Result<Record, StoreError>;

    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] when the row is gone.
    async fn remove(&self, meta: &'static EntityMeta, record: &Record) -> Result<(), StoreError>;

    /// Run `f` atomically: if it fails, none of its writes are kept.
    fn transaction<'s, T, E, F>(&'s self, f: F) -> BoxFuture<'s, Result<T, E>>
    where
        Self: Sized,
        T: Send + 's,
        E: From<StoreError> + Send + 's,
        F: for<'a> FnOnce(&'a Self) -> BoxFuture<'a, Result<T, E>> + Send + 's;
}
