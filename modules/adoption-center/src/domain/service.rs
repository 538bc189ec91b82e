use std::sync::Arc;

use access_resolver_sdk::{AccessResolverClient, Action, Grant, PolicyEnforcer};
use adoptly_db::{EntityStore, Record};
use adoptly_security::CallerContext;
use serde_json::Value;
use uuid::Uuid;

use super::adoptions::AdoptionsService;
use super::controller::{DeleteMode, EntityController, ListOptions, Listing};
use super::descriptor::EntityDescriptor;
use super::entities::{PETS, SHELTERS, TUTORS, USERS};
use super::error::DomainError;
use crate::config::AdoptionCenterConfig;

// ============================================================================
// Service Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 1000,
        }
    }
}

impl ServiceConfig {
    /// Page size for a request: the default when unset, clamped to the max.
    #[must_use]
    pub fn page_limit(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

impl From<&AdoptionCenterConfig> for ServiceConfig {
    fn from(cfg: &AdoptionCenterConfig) -> Self {
        Self {
            default_page_size: cfg.default_page_size,
            max_page_size: cfg.max_page_size,
        }
    }
}

// ============================================================================
// Service Implementation
// ============================================================================

pub(crate) fn id_value(id: Uuid) -> Value {
    Value::String(id.to_string())
}

/// CRUD for one resource: resolves the grant, then runs the controller.
pub struct ResourceService<S: EntityStore> {
    controller: EntityController<S>,
    policy_enforcer: PolicyEnforcer,
    config: ServiceConfig,
}

impl<S: EntityStore> ResourceService<S> {
    pub fn new(
        store: Arc<S>,
        descriptor: &'static EntityDescriptor,
        policy_enforcer: PolicyEnforcer,
        config: ServiceConfig,
    ) -> Self {
        Self {
            controller: EntityController::new(store, descriptor),
            policy_enforcer,
            config,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.controller.descriptor()
    }

    pub(crate) async fn grant(
        &self,
        ctx: &CallerContext,
        action: Action,
    ) -> Result<Grant, DomainError> {
        let grant = self
            .policy_enforcer
            .grant(ctx, &self.descriptor().resource, action)
            .await?;
        Ok(grant)
    }

    /// # Errors
    ///
    /// See [`EntityController::list`].
    pub async fn list(
        &self,
        ctx: &CallerContext,
        mut options: ListOptions,
    ) -> Result<Listing, DomainError> {
        options.limit = Some(self.config.page_limit(options.limit));
        let grant = self.grant(ctx, Action::Read).await?;
        self.controller.list(ctx, &grant, &options).await
    }

    /// # Errors
    ///
    /// See [`EntityController::get_one`].
    pub async fn get(&self, ctx: &CallerContext, id: Uuid) -> Result<Record, DomainError> {
        let grant = self.grant(ctx, Action::Read).await?;
        self.controller.get_one(ctx, &grant, &id_value(id)).await
    }

    /// # Errors
    ///
    /// See [`EntityController::create`].
    pub async fn create(&self, ctx: &CallerContext, body: Value) -> Result<Record, DomainError> {
        let grant = self.grant(ctx, Action::Create).await?;
        self.controller.create(ctx, &grant, body).await
    }

    /// PUT.
    ///
    /// # Errors
    ///
    /// See [`EntityController::replace`].
    pub async fn replace(
        &self,
        ctx: &CallerContext,
        id: Uuid,
        body: Value,
    ) -> Result<Record, DomainError> {
        let grant = self.grant(ctx, Action::Update).await?;
        self.controller
            .replace(ctx, &grant, &id_value(id), body)
            .await
    }

    /// PATCH.
    ///
    /// # Errors
    ///
    /// See [`EntityController::patch`].
    pub async fn patch(
        &self,
        ctx: &CallerContext,
        id: Uuid,
        body: Value,
    ) -> Result<Record, DomainError> {
        let grant = self.grant(ctx, Action::Update).await?;
        self.controller.patch(ctx, &grant, &id_value(id), body).await
    }

    /// # Errors
    ///
    /// See [`EntityController::delete`].
    pub async fn delete(
        &self,
        ctx: &CallerContext,
        id: Uuid,
        mode: DeleteMode,
    ) -> Result<(), DomainError> {
        let grant = self.grant(ctx, Action::Delete).await?;
        self.controller
            .delete(ctx, &grant, &id_value(id), mode)
            .await
    }
}

/// Every service of the module, sharing one store and one enforcer.
pub struct AppServices<S: EntityStore> {
    pub users: ResourceService<S>,
    pub shelters: ResourceService<S>,
    pub tutors: ResourceService<S>,
    pub pets: ResourceService<S>,
    pub adoptions: AdoptionsService<S>,
}

impl<S: EntityStore> AppServices<S> {
    pub fn new(
        store: &Arc<S>,
        resolver: Arc<dyn AccessResolverClient>,
        config: ServiceConfig,
    ) -> Self {
        let policy_enforcer = PolicyEnforcer::new(resolver);
        let resource = |descriptor: &'static EntityDescriptor| {
            ResourceService::new(
                Arc::clone(store),
                descriptor,
                policy_enforcer.clone(),
                config,
            )
        };
        Self {
            users: resource(&USERS),
            shelters: resource(&SHELTERS),
            tutors: resource(&TUTORS),
            pets: resource(&PETS),
            adoptions: AdoptionsService::new(Arc::clone(store), policy_enforcer.clone(), config),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn page_limit_clamps() {
        let config = ServiceConfig::default();
        assert_eq!(config.page_limit(None), 50);
        assert_eq!(config.page_limit(Some(0)), 1);
        assert_eq!(config.page_limit(Some(5_000)), 1000);
    }

    #[test]
    fn config_follows_module_config() {
        let module = AdoptionCenterConfig {
            default_page_size: 5,
            max_page_size: 10,
            permissions_path: None,
        };
        let config = ServiceConfig::from(&module);
        assert_eq!(config.page_limit(None), 5);
        assert_eq!(config.page_limit(Some(11)), 10);
    }
}
