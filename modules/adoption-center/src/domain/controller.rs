//! Authorization-aware CRUD over any entity described by an
//! [`EntityDescriptor`].
//!
//! Every operation receives the caller and the [`Grant`] resolved for the
//! request. A denied grant is rejected before anything is read. Reads are
//! projected through the grant's column policy; writes are gated by the
//! guards in [`adoptly_db::guard`] and by ownership, and every check runs
//! before the first mutating store call.

use std::sync::Arc;

use access_resolver_sdk::Grant;
use adoptly_db::{
    EntityMeta, EntityStore, FindQuery, Record, assert_no_id_replacement, assert_patch_allowed,
    assert_replace_allowed, lookup_path, merge_record, project, select_columns,
};
use adoptly_security::{CallerContext, ColumnPath, ColumnPolicy, OwnerScope};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::domain::descriptor::{EntityDescriptor, IdentityField};
use crate::domain::entities::fields;
use crate::domain::error::DomainError;
use crate::domain::ownership::{assert_owner, owner_scope};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub offset: u64,
    pub limit: Option<u64>,
    /// Also return soft-deleted rows. Only honored when the caller may see
    /// the soft-delete column.
    pub with_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub count: u64,
    pub entities: Vec<Record>,
}

impl Listing {
    fn empty() -> Self {
        Self {
            count: 0,
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Stamp the soft-delete column; the row stays reachable through
    /// `with_deleted` reads.
    Soft,
    Hard,
}

/// Unpack a grant, rejecting a denied one.
pub(crate) fn allowed<'g>(
    grant: &'g Grant,
    ctx: &CallerContext,
) -> Result<(bool, &'g ColumnPolicy), DomainError> {
    match grant {
        Grant::Allowed {
            ownership_required,
            columns,
        } => Ok((*ownership_required, columns)),
        Grant::Denied => {
            tracing::warn!(
                subject = %ctx.subject_id(),
                role = ?ctx.role(),
                "no access rule grants this action"
            );
            Err(DomainError::denied(ctx.is_authenticated()))
        }
    }
}

/// Columns returned by a write: the policy's projection plus the id.
pub(crate) fn write_projection(
    meta: &'static EntityMeta,
    policy: &ColumnPolicy,
) -> Result<Vec<ColumnPath>, DomainError> {
    let mut projection = select_columns(meta, policy)?;
    if !projection.iter().any(|c| c.as_str() == meta.id_column) {
        projection.push(ColumnPath::root(meta.id_column));
    }
    Ok(projection)
}

/// Reject a payload naming an id that is already stored, soft-deleted rows
/// included.
pub(crate) async fn assert_new_id(
    store: &dyn EntityStore,
    meta: &'static EntityMeta,
    record: &Record,
) -> Result<(), DomainError> {
    let Some(id) = non_null(Some(record), meta.id_column) else {
        return Ok(());
    };
    let (rows, _) = store
        .find_many(meta, &FindQuery::by_id(id.clone()).with_deleted(true))
        .await?;
    if rows.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Conflict(format!("{} already exists", meta.name)))
    }
}

fn non_null<'r>(record: Option<&'r Record>, column: &str) -> Option<&'r Value> {
    record.and_then(|r| r.get(column)).filter(|v| !v.is_null())
}

pub(crate) fn into_record(body: Value) -> Result<Record, DomainError> {
    match body {
        Value::Object(record) => Ok(record),
        _ => Err(DomainError::bad_request("Request body must be a JSON object")),
    }
}

pub struct EntityController<S: EntityStore> {
    store: Arc<S>,
    descriptor: &'static EntityDescriptor,
}

impl<S: EntityStore> EntityController<S> {
    pub fn new(store: Arc<S>, descriptor: &'static EntityDescriptor) -> Self {
        Self { store, descriptor }
    }

    #[must_use]
    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    /// Check every identity field of the descriptor against the body.
    ///
    /// `id` is the path id (absent on create); `stored` the current row.
    fn check_identity(
        &self,
        body: &Record,
        id: Option<&Value>,
        stored: Option<&Record>,
    ) -> Result<(), DomainError> {
        let meta = self.descriptor.meta;
        for field in self.descriptor.identity {
            match *field {
                IdentityField::PrimaryKey => {
                    if let Some(id) = id {
                        assert_no_id_replacement(body.get(meta.id_column), id)?;
                    }
                }
                IdentityField::Fixed(column) => {
                    if let Some(expected) = non_null(stored, column) {
                        assert_no_id_replacement(body.get(column), expected)?;
                    }
                }
                IdentityField::Linked { path, column } => {
                    let expected =
                        non_null(Some(body), column).or_else(|| non_null(stored, column));
                    if let Some(expected) = expected {
                        assert_no_id_replacement(lookup_path(body, path), expected)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Point linked nested objects at the row they already belong to, so a
    /// replacement updates them instead of creating new ones.
    fn fill_links(&self, body: &mut Record, stored: Option<&Record>) {
        for field in self.descriptor.identity {
            let IdentityField::Linked { path, column } = *field else {
                continue;
            };
            let Some((relation, key)) = path.split_once('.') else {
                continue;
            };
            let expected = non_null(Some(body), column)
                .or_else(|| non_null(stored, column))
                .cloned();
            if let (Some(expected), Some(Value::Object(nested))) = (expected, body.get_mut(relation))
            {
                nested.entry(key.to_owned()).or_insert(expected);
            }
        }
    }

    /// Collection read. Ownership becomes a row restriction on the query.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`/`Forbidden` on a denied grant, `Misconfigured` when
    /// the policy selects nothing, store failures.
    #[instrument(skip_all, fields(entity = self.descriptor.meta.name))]
    pub async fn list(
        &self,
        ctx: &CallerContext,
        grant: &Grant,
        options: &ListOptions,
    ) -> Result<Listing, DomainError> {
        let (ownership, policy) = allowed(grant, ctx)?;
        let meta = self.descriptor.meta;
        let projection = select_columns(meta, policy)?;

        let scope = if ownership {
            owner_scope(self.descriptor, self.store(), ctx).await?
        } else {
            OwnerScope::allow_all()
        };
        if scope.is_deny_all() {
            tracing::debug!("caller owns nothing; empty listing");
            return Ok(Listing::empty());
        }

        let with_deleted = options.with_deleted
            && meta
                .soft_delete_column
                .is_some_and(|column| projection.iter().any(|c| c.as_str() == column));
        if options.with_deleted && !with_deleted {
            tracing::debug!("soft-delete column not visible; ignoring with_deleted");
        }

        let query = FindQuery::all()
            .scoped(scope)
            .project(projection)
            .with_deleted(with_deleted)
            .page(options.offset, options.limit);
        let (entities, count) = self.store.find_many(meta, &query).await?;

        tracing::debug!(count, returned = entities.len(), "listed");
        Ok(Listing { count, entities })
    }

    /// Single read. Ownership is checked on the fetched row before it is
    /// returned.
    ///
    /// # Errors
    ///
    /// `NotFound` from the store, `NotOwner`, plus the errors of [`Self::list`].
    #[instrument(skip_all, fields(entity = self.descriptor.meta.name, id = %id))]
    pub async fn get_one(
        &self,
        ctx: &CallerContext,
        grant: &Grant,
        id: &Value,
    ) -> Result<Record, DomainError> {
        let (ownership, policy) = allowed(grant, ctx)?;
        let meta = self.descriptor.meta;
        let projection = select_columns(meta, policy)?;

        let row = self
            .store
            .find_one_or_fail(meta, &FindQuery::by_id(id.clone()))
            .await?;
        if ownership {
            assert_owner(self.descriptor, self.store(), &row, ctx).await?;
        }
        Ok(project(meta, &row, &projection))
    }

    /// Create from a payload. The body is gated path by path like a PATCH.
    ///
    /// # Errors
    ///
    /// `PatchPropertyNotAllowed`, `IdReplacement`, `NotOwner`, `Conflict` when
    /// the id or a unique column is taken.
    #[instrument(skip_all, fields(entity = self.descriptor.meta.name))]
    pub async fn create(
        &self,
        ctx: &CallerContext,
        grant: &Grant,
        body: Value,
    ) -> Result<Record, DomainError> {
        let (ownership, policy) = allowed(grant, ctx)?;
        let meta = self.descriptor.meta;
        let projection = write_projection(meta, policy)?;

        assert_patch_allowed(&body, policy, meta)?;
        let mut record = into_record(body)?;
        self.check_identity(&record, None, None)?;

        if let (Some(role), Some(Value::Object(user))) =
            (self.descriptor.user_role, record.get_mut("user"))
        {
            user.entry(fields::ROLE.to_owned())
                .or_insert_with(|| Value::String(role.as_str().to_owned()));
        }

        if ownership {
            let owner_column = self.descriptor.owner_column;
            let claimed = record.get(owner_column).is_some_and(|v| !v.is_null());
            if !claimed
                && !owner_column.contains('.')
                && let Some(owner) = self
                    .descriptor
                    .ownership
                    .owner_id_for(self.store(), ctx.subject_id())
                    .await?
            {
                record.insert(owner_column.to_owned(), owner.to_json());
            }
            assert_owner(self.descriptor, self.store(), &record, ctx).await?;
        }

        assert_new_id(self.store(), meta, &record).await?;

        let saved = self.store.save(meta, record).await?;
        tracing::info!(id = ?meta.id_of(&saved), "created");
        Ok(project(meta, &saved, &projection))
    }

    /// Whole-entity replacement (upsert). Collections in the body replace
    /// the stored ones.
    ///
    /// # Errors
    ///
    /// `NotOwner`, `MethodNotAllowed` unless the policy covers every column,
    /// `IdReplacement`, store failures.
    #[instrument(skip_all, fields(entity = self.descriptor.meta.name, id = %id))]
    pub async fn replace(
        &self,
        ctx: &CallerContext,
        grant: &Grant,
        id: &Value,
        body: Value,
    ) -> Result<Record, DomainError> {
        let (ownership, policy) = allowed(grant, ctx)?;
        let meta = self.descriptor.meta;
        let mut record = into_record(body)?;

        let (mut rows, _) = self
            .store
            .find_many(meta, &FindQuery::by_id(id.clone()).with_deleted(true))
            .await?;
        let stored = rows.pop();

        if ownership {
            assert_owner(self.descriptor, self.store(), &record, ctx).await?;
            if let Some(stored) = &stored {
                assert_owner(self.descriptor, self.store(), stored, ctx).await?;
            }
        }
        assert_replace_allowed(policy, meta)?;
        self.check_identity(&record, Some(id), stored.as_ref())?;
        let projection = write_projection(meta, policy)?;

        record.insert(meta.id_column.to_owned(), id.clone());
        self.fill_links(&mut record, stored.as_ref());

        let saved = self.store.save(meta, record).await?;
        tracing::info!(created = stored.is_none(), "replaced");
        Ok(project(meta, &saved, &projection))
    }

    /// Partial update: the body is deep-merged onto the stored entity.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotOwner`, `IdReplacement`, `PatchPropertyNotAllowed`,
    /// store failures.
    #[instrument(skip_all, fields(entity = self.descriptor.meta.name, id = %id))]
    pub async fn patch(
        &self,
        ctx: &CallerContext,
        grant: &Grant,
        id: &Value,
        body: Value,
    ) -> Result<Record, DomainError> {
        let (ownership, policy) = allowed(grant, ctx)?;
        let meta = self.descriptor.meta;
        let projection = write_projection(meta, policy)?;

        let mut row = self
            .store
            .find_one_or_fail(meta, &FindQuery::by_id(id.clone()))
            .await?;
        if ownership {
            assert_owner(self.descriptor, self.store(), &row, ctx).await?;
        }

        let Value::Object(patch) = &body else {
            return Err(DomainError::bad_request("Request body must be a JSON object"));
        };
        self.check_identity(patch, Some(id), Some(&row))?;
        assert_patch_allowed(&body, policy, meta)?;

        if patch.is_empty() {
            return Ok(project(meta, &row, &projection));
        }
        merge_record(meta, &mut row, patch);
        let saved = self.store.save(meta, row).await?;
        tracing::info!("patched");
        Ok(project(meta, &saved, &projection))
    }

    /// # Errors
    ///
    /// `NotFound`, `NotOwner`, `Misconfigured` for a soft delete of an
    /// entity without a soft-delete column.
    #[instrument(skip_all, fields(entity = self.descriptor.meta.name, id = %id))]
    pub async fn delete(
        &self,
        ctx: &CallerContext,
        grant: &Grant,
        id: &Value,
        mode: DeleteMode,
    ) -> Result<(), DomainError> {
        let (ownership, _) = allowed(grant, ctx)?;
        let meta = self.descriptor.meta;

        let row = self
            .store
            .find_one_or_fail(meta, &FindQuery::by_id(id.clone()))
            .await?;
        if ownership {
            assert_owner(self.descriptor, self.store(), &row, ctx).await?;
        }

        match mode {
            DeleteMode::Soft => {
                if meta.soft_delete_column.is_none() {
                    return Err(DomainError::misconfigured(format!(
                        "{} does not support soft delete",
                        meta.name
                    )));
                }
                self.store.soft_remove(meta, &row).await?;
            }
            DeleteMode::Hard => self.store.remove(meta, &row).await?,
        }
        tracing::info!(?mode, "deleted");
        Ok(())
    }
}
