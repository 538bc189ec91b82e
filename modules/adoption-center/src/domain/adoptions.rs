//! Adopting a pet and cancelling an adoption.
//!
//! Both flows write two entities (the pet's `adopted` flag and the adoption
//! record) and run inside a single store transaction, so a failure after
//! the first write leaves neither change behind.

use std::sync::Arc;

use access_resolver_sdk::{Action, PolicyEnforcer};
use adoptly_db::{EntityStore, FindQuery, Record, assert_patch_allowed, project};
use adoptly_security::CallerContext;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;
use uuid::Uuid;

use super::controller::{
    ListOptions, Listing, allowed, assert_new_id, into_record, write_projection,
};
use super::entities::{ADOPTION, ADOPTIONS, PET, TUTOR, fields};
use super::error::DomainError;
use super::ownership::assert_owner;
use super::service::{ResourceService, ServiceConfig, id_value};

fn required(record: &Record, column: &str) -> Result<Value, DomainError> {
    record
        .get(column)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| DomainError::bad_request(format!("{column} is required")))
}

pub struct AdoptionsService<S: EntityStore> {
    store: Arc<S>,
    resources: ResourceService<S>,
}

impl<S: EntityStore> AdoptionsService<S> {
    pub fn new(store: Arc<S>, policy_enforcer: PolicyEnforcer, config: ServiceConfig) -> Self {
        Self {
            resources: ResourceService::new(Arc::clone(&store), &ADOPTIONS, policy_enforcer, config),
            store,
        }
    }

    /// # Errors
    ///
    /// See [`ResourceService::list`].
    pub async fn list(
        &self,
        ctx: &CallerContext,
        options: ListOptions,
    ) -> Result<Listing, DomainError> {
        self.resources.list(ctx, options).await
    }

    /// # Errors
    ///
    /// See [`ResourceService::get`].
    pub async fn get(&self, ctx: &CallerContext, id: Uuid) -> Result<Record, DomainError> {
        self.resources.get(ctx, id).await
    }

    /// Adopt `body.petId` for `body.tutorId`.
    ///
    /// # Errors
    ///
    /// Denied grant, `PatchPropertyNotAllowed` for columns outside the
    /// grant, `NotOwner` unless the caller owns the pet's shelter,
    /// `BadRequest` when the pet or tutor does not exist or the pet is
    /// already adopted, `Conflict` when the pet has a live adoption or the
    /// body names an existing adoption id.
    #[instrument(skip_all)]
    pub async fn adopt(&self, ctx: &CallerContext, body: Value) -> Result<Record, DomainError> {
        let grant = self.resources.grant(ctx, Action::Create).await?;
        let (ownership, policy) = allowed(&grant, ctx)?;
        let meta = ADOPTIONS.meta;
        let projection = write_projection(meta, policy)?;

        assert_patch_allowed(&body, policy, meta)?;
        let mut record = into_record(body)?;
        let pet_id = required(&record, fields::PET_ID)?;
        let tutor_id = required(&record, fields::TUTOR_ID)?;
        assert_new_id(self.store.as_ref(), meta, &record).await?;

        if ownership {
            assert_owner(&ADOPTIONS, self.store.as_ref(), &record, ctx).await?;
        }
        let (tutors, _) = self
            .store
            .find_many(&TUTOR, &FindQuery::by_id(tutor_id))
            .await?;
        if tutors.is_empty() {
            return Err(DomainError::bad_request("Tutor does not exist"));
        }

        let date = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| DomainError::internal(e.to_string()))?;
        record.insert(fields::DATE.to_owned(), Value::String(date));

        let saved = self
            .store
            .transaction::<Record, DomainError, _>(move |tx| {
                Box::pin(async move {
                    let (mut pets, _) = tx.find_many(&PET, &FindQuery::by_id(pet_id)).await?;
                    let mut pet = pets
                        .pop()
                        .ok_or_else(|| DomainError::bad_request("Pet does not exist"))?;
                    if pet.get(fields::ADOPTED).and_then(Value::as_bool) == Some(true) {
                        return Err(DomainError::bad_request("Pet is already adopted"));
                    }
                    pet.insert(fields::ADOPTED.to_owned(), Value::Bool(true));
                    tx.save(&PET, pet).await?;
                    let saved = tx.save(&ADOPTION, record).await?;
                    Ok(saved)
                })
            })
            .await?;

        tracing::info!(adoption = ?ADOPTION.id_of(&saved), "pet adopted");
        Ok(project(meta, &saved, &projection))
    }

    /// Cancel an adoption: the pet becomes adoptable again and the adoption
    /// record is soft-deleted.
    ///
    /// # Errors
    ///
    /// Denied grant, `NotFound`, `NotOwner`, store failures.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn cancel(&self, ctx: &CallerContext, id: Uuid) -> Result<(), DomainError> {
        let grant = self.resources.grant(ctx, Action::Delete).await?;
        let (ownership, _) = allowed(&grant, ctx)?;

        let row = self
            .store
            .find_one_or_fail(&ADOPTION, &FindQuery::by_id(id_value(id)))
            .await?;
        if ownership {
            assert_owner(&ADOPTIONS, self.store.as_ref(), &row, ctx).await?;
        }
        let pet_id = required(&row, fields::PET_ID)?;

        self.store
            .transaction::<(), DomainError, _>(move |tx| {
                Box::pin(async move {
                    let query = FindQuery::by_id(pet_id).with_deleted(true);
                    let (mut pets, _) = tx.find_many(&PET, &query).await?;
                    if let Some(mut pet) = pets.pop() {
                        pet.insert(fields::ADOPTED.to_owned(), Value::Bool(false));
                        tx.save(&PET, pet).await?;
                    }
                    tx.soft_remove(&ADOPTION, &row).await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!("adoption cancelled");
        Ok(())
    }
}
