use std::sync::Arc;

use access_resolver_sdk::AccessResolverClient;
use adoptly_db::{EntityStore, MemoryStore};
use anyhow::Context;
use static_access_plugin::{Service as StaticAccessService, StaticAccessPluginConfig};
use tracing::info;

use crate::config::AdoptionCenterConfig;
use crate::domain::service::{AppServices, ServiceConfig};

/// The adoption center, wired: one store, one access resolver, and the
/// services built on them.
pub struct AdoptionCenter<S: EntityStore> {
    store: Arc<S>,
    services: Arc<AppServices<S>>,
}

impl<S: EntityStore> AdoptionCenter<S> {
    /// Load the rule table (embedded, then `permissions_path`, then the
    /// environment) and build the services over `store`.
    ///
    /// # Errors
    ///
    /// Fails when the rule table cannot be loaded or contains an invalid rule.
    pub fn init(config: &AdoptionCenterConfig, store: Arc<S>) -> anyhow::Result<Self> {
        info!("Initializing adoption center module");

        let rules = StaticAccessPluginConfig::load(config.permissions_path.as_deref())?;
        let resolver = StaticAccessService::new(rules).context("invalid access rules")?;
        let resources: Vec<&str> = resolver.resources().collect();
        info!(?resources, "access rules ready");

        Ok(Self::with_resolver(config, store, Arc::new(resolver)))
    }

    /// Build the services around an existing resolver.
    pub fn with_resolver(
        config: &AdoptionCenterConfig,
        store: Arc<S>,
        resolver: Arc<dyn AccessResolverClient>,
    ) -> Self {
        let services = Arc::new(AppServices::new(
            &store,
            resolver,
            ServiceConfig::from(config),
        ));
        info!("Adoption center module initialized");
        Self { store, services }
    }

    #[must_use]
    pub fn services(&self) -> Arc<AppServices<S>> {
        Arc::clone(&self.services)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl AdoptionCenter<MemoryStore> {
    /// The module over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Same as [`AdoptionCenter::init`].
    pub fn in_memory(config: &AdoptionCenterConfig) -> anyhow::Result<Self> {
        Self::init(config, Arc::new(MemoryStore::new()))
    }
}
