//! Client implementation for the static access resolver plugin.

use access_resolver_sdk::{
    AccessResolverClient, AccessResolverError, EvaluationRequest, EvaluationResponse,
};
use async_trait::async_trait;

use super::service::Service;

#[async_trait]
impl AccessResolverClient for Service {
    async fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> Result<EvaluationResponse, AccessResolverError> {
        Service::evaluate(self, &request)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_PERMISSIONS, StaticAccessPluginConfig};
    use access_resolver_sdk::{Action, Grant, PolicyEnforcer, ResourceType};
    use adoptly_security::{CallerContext, ColumnPolicy, Role};
    use std::sync::Arc;
    use uuid::Uuid;

    const USERS: ResourceType = ResourceType { name: "users" };

    fn service() -> Service {
        Service::new(StaticAccessPluginConfig::from_yaml(DEFAULT_PERMISSIONS).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn plugin_trait_evaluates_successfully() {
        let service = service();
        let plugin: &dyn AccessResolverClient = &service;

        let request = EvaluationRequest {
            subject: access_resolver_sdk::Subject {
                id: Uuid::nil(),
                role: None,
                authenticated: false,
            },
            resource: "users".to_owned(),
            action: Action::Create,
        };

        let result = plugin.evaluate(request).await;
        assert!(result.is_ok());
        assert!(result.unwrap().decision);
    }

    #[tokio::test]
    async fn enforcer_compiles_plugin_decisions() {
        let enforcer = PolicyEnforcer::new(Arc::new(service()));
        let ctx = CallerContext::authenticated(Uuid::new_v4(), Role::Tutor);

        let grant = enforcer.grant(&ctx, &USERS, Action::Read).await.unwrap();
        assert_eq!(
            grant,
            Grant::Allowed {
                ownership_required: true,
                columns: ColumnPolicy::exclude(["password"]),
            }
        );

        let signup = enforcer
            .grant(&CallerContext::anonymous(), &USERS, Action::Create)
            .await
            .unwrap();
        assert!(signup.is_granted());
        assert!(!signup.ownership_required());
    }
}
