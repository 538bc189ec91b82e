//! Ownership: whether a caller owns an entity, and the row restriction that
//! limits collection reads to what they own.
//!
//! Each entity descriptor carries an [`Ownership`] implementation. Direct
//! ownership compares one column with the caller id; indirect ownership
//! (a pet through its shelter, an adoption through its pet) is its own
//! implementation and may read related rows from the store.

use adoptly_db::{EntityStore, Record, lookup_path};
use adoptly_security::{CallerContext, ColumnPath, OwnerScope, ScopeValue};
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::descriptor::EntityDescriptor;
use crate::domain::error::DomainError;

#[async_trait]
pub trait Ownership: Send + Sync {
    /// Whether `caller` owns `entity`, a stored row or an incoming payload.
    ///
    /// # Errors
    ///
    /// Store failures, or [`DomainError::BadRequest`] when a row the check
    /// goes through does not exist.
    async fn is_owner(
        &self,
        store: &dyn EntityStore,
        entity: &Record,
        caller: Uuid,
    ) -> Result<bool, DomainError>;

    /// Value the descriptor's owner column holds on rows `caller` owns, or
    /// `None` when they cannot own any.
    ///
    /// # Errors
    ///
    /// Store failures.
    async fn owner_id_for(
        &self,
        store: &dyn EntityStore,
        caller: Uuid,
    ) -> Result<Option<ScopeValue>, DomainError>;
}

/// The owner is the user whose id sits in `column` (`id` for users
/// themselves, `userId` for shelters and tutors).
#[derive(Debug, Clone, Copy)]
pub struct DirectOwnership {
    pub column: &'static str,
}

impl DirectOwnership {
    #[must_use]
    pub fn owns(&self, entity: &Record, caller: Uuid) -> bool {
        lookup_path(entity, self.column).is_some_and(|v| ScopeValue::Uuid(caller).matches(v))
    }
}

#[async_trait]
impl Ownership for DirectOwnership {
    async fn is_owner(
        &self,
        _store: &dyn EntityStore,
        entity: &Record,
        caller: Uuid,
    ) -> Result<bool, DomainError> {
        Ok(self.owns(entity, caller))
    }

    async fn owner_id_for(
        &self,
        _store: &dyn EntityStore,
        caller: Uuid,
    ) -> Result<Option<ScopeValue>, DomainError> {
        Ok(Some(ScopeValue::Uuid(caller)))
    }
}

/// Fail with [`DomainError::NotOwner`] unless the caller owns `entity`.
///
/// # Errors
///
/// [`DomainError::NotOwner`], or whatever the ownership check itself raises.
pub async fn assert_owner(
    descriptor: &EntityDescriptor,
    store: &dyn EntityStore,
    entity: &Record,
    caller: &CallerContext,
) -> Result<(), DomainError> {
    let owner = caller.is_authenticated()
        && descriptor
            .ownership
            .is_owner(store, entity, caller.subject_id())
            .await?;
    if owner {
        Ok(())
    } else {
        tracing::warn!(
            entity = descriptor.meta.name,
            subject = %caller.subject_id(),
            "caller does not own the entity"
        );
        Err(DomainError::NotOwner)
    }
}

/// Row restriction for an ownership-gated collection read.
///
/// Resolved once per request; a caller that cannot own anything gets
/// [`OwnerScope::DenyAll`].
///
/// # Errors
///
/// Store failures while resolving the caller's owner id.
pub async fn owner_scope(
    descriptor: &EntityDescriptor,
    store: &dyn EntityStore,
    caller: &CallerContext,
) -> Result<OwnerScope, DomainError> {
    if !caller.is_authenticated() {
        return Ok(OwnerScope::deny_all());
    }
    let scope = match descriptor
        .ownership
        .owner_id_for(store, caller.subject_id())
        .await?
    {
        Some(owner) => OwnerScope::owned(ColumnPath::new(descriptor.owner_column), owner),
        None => OwnerScope::deny_all(),
    };
    tracing::debug!(entity = descriptor.meta.name, ?scope, "owner scope resolved");
    Ok(scope)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::USERS;
    use adoptly_db::MemoryStore;
    use adoptly_security::Role;
    use serde_json::json;

    fn record(value: &serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn direct_ownership_compares_the_column() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        let ctx = CallerContext::authenticated(me, Role::Tutor);

        let mine = record(&json!({"id": me.to_string()}));
        let theirs = record(&json!({"id": Uuid::new_v4().to_string()}));

        assert!(assert_owner(&USERS, &store, &mine, &ctx).await.is_ok());
        assert_eq!(
            assert_owner(&USERS, &store, &theirs, &ctx).await,
            Err(DomainError::NotOwner)
        );
    }

    #[test]
    fn uuid_case_does_not_matter() {
        let me = Uuid::new_v4();
        let ownership = DirectOwnership { column: "userId" };
        let upper = record(&json!({"userId": me.to_string().to_uppercase()}));
        assert!(ownership.owns(&upper, me));
        assert!(!ownership.owns(&record(&json!({"userId": null})), me));
    }

    #[tokio::test]
    async fn anonymous_caller_owns_nothing() {
        let store = MemoryStore::new();
        let row = record(&json!({"id": Uuid::nil().to_string()}));

        assert_eq!(
            assert_owner(&USERS, &store, &row, &CallerContext::anonymous()).await,
            Err(DomainError::NotOwner)
        );
        assert_eq!(
            owner_scope(&USERS, &store, &CallerContext::anonymous()).await,
            Ok(OwnerScope::deny_all())
        );
    }

    #[tokio::test]
    async fn direct_scope_uses_the_caller_id() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        let scope = owner_scope(&USERS, &store, &CallerContext::authenticated(me, Role::Shelter))
            .await
            .unwrap();
        assert_eq!(scope, OwnerScope::owned(ColumnPath::root("id"), me));
    }
}
