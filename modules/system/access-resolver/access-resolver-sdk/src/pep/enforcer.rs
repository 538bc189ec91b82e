//! Policy Enforcement Point (`PEP`) object.
//!
//! [`PolicyEnforcer`] encapsulates the full PEP flow:
//! build evaluation request → call PDP → compile the response to a [`Grant`].
//!
//! Constructed once during service initialisation with the resolver client.
//! The resource type is supplied per call via a [`ResourceType`] descriptor,
//! so a single enforcer can serve all resource types in a service.

use std::sync::Arc;

use adoptly_security::{CallerContext, Role};
use uuid::Uuid;

use crate::api::AccessResolverClient;
use crate::error::AccessResolverError;
use crate::models::{Action, EvaluationRequest, Grant, Subject};
use crate::pep::compiler::{GrantCompileError, compile_to_grant};

/// Error from the PEP enforcement flow.
///
/// A denial is not an error: it compiles to [`Grant::Denied`].
#[derive(Debug, thiserror::Error)]
pub enum EnforcerError {
    /// The evaluation call failed.
    #[error("access evaluation failed: {0}")]
    EvaluationFailed(#[from] AccessResolverError),

    /// The response could not be compiled into a grant.
    #[error("grant compilation failed: {0}")]
    CompileFailed(#[from] GrantCompileError),
}

/// Static descriptor for a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceType {
    /// Resource name as used in the rule table (e.g. `"pets"`).
    pub name: &'static str,
}

/// Policy Enforcement Point.
///
/// Holds the resolver client. Cloneable and cheap to pass around
/// (`Arc` inside).
///
/// # Example
///
/// ```ignore
/// use access_resolver_sdk::{Action, pep::{PolicyEnforcer, ResourceType}};
///
/// const SHELTERS: ResourceType = ResourceType { name: "shelters" };
///
/// let enforcer = PolicyEnforcer::new(resolver.clone());
/// let grant = enforcer.grant(&ctx, &SHELTERS, Action::Read).await?;
/// ```
#[derive(Clone)]
pub struct PolicyEnforcer {
    resolver: Arc<dyn AccessResolverClient>,
}

impl PolicyEnforcer {
    /// Create a new enforcer.
    pub fn new(resolver: Arc<dyn AccessResolverClient>) -> Self {
        Self { resolver }
    }

    /// Build an evaluation request for the caller.
    #[must_use]
    pub fn build_request(
        &self,
        ctx: &CallerContext,
        resource: &ResourceType,
        action: Action,
    ) -> EvaluationRequest {
        EvaluationRequest {
            subject: Subject {
                id: ctx.subject_id(),
                role: ctx.role(),
                authenticated: ctx.is_authenticated(),
            },
            resource: resource.name.to_owned(),
            action,
        }
    }

    /// Execute the full PEP flow for a caller: build request → evaluate →
    /// compile to [`Grant`].
    ///
    /// # Errors
    ///
    /// - [`EnforcerError::EvaluationFailed`] if the PDP call fails
    /// - [`EnforcerError::CompileFailed`] if the response is malformed
    pub async fn grant(
        &self,
        ctx: &CallerContext,
        resource: &ResourceType,
        action: Action,
    ) -> Result<Grant, EnforcerError> {
        let request = self.build_request(ctx, resource, action);
        self.evaluate(request).await
    }

    /// Resolve a grant from a bare role, without a caller identity.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyEnforcer::grant`].
    pub async fn resolve(
        &self,
        resource: &ResourceType,
        action: Action,
        role: Option<Role>,
    ) -> Result<Grant, EnforcerError> {
        let request = EvaluationRequest {
            subject: Subject {
                id: Uuid::nil(),
                role,
                authenticated: role.is_some(),
            },
            resource: resource.name.to_owned(),
            action,
        };
        self.evaluate(request).await
    }

    async fn evaluate(&self, request: EvaluationRequest) -> Result<Grant, EnforcerError> {
        let resource = request.resource.clone();
        let action = request.action;
        let response = self.resolver.evaluate(request).await?;
        let grant = compile_to_grant(&response)?;
        tracing::debug!(
            resource = %resource,
            action = %action,
            granted = grant.is_granted(),
            ownership = grant.ownership_required(),
            "access grant resolved"
        );
        Ok(grant)
    }
}

impl std::fmt::Debug for PolicyEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEnforcer").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::{ColumnAttributes, EvaluationResponse};
    use adoptly_security::{ColumnPath, ColumnPolicy};

    const SUBJECT: &str = "22222222-2222-2222-2222-222222222222";
    const PETS: ResourceType = ResourceType { name: "pets" };

    /// Allows administrators everything; everyone else is denied.
    struct AdminOnlyMock;

    #[async_trait]
    impl AccessResolverClient for AdminOnlyMock {
        async fn evaluate(
            &self,
            req: EvaluationRequest,
        ) -> Result<EvaluationResponse, AccessResolverError> {
            if req.subject.role == Some(Role::Administrator) {
                Ok(EvaluationResponse {
                    decision: true,
                    ownership: false,
                    attributes: ColumnAttributes {
                        excluded: Some(vec![]),
                        included: None,
                    },
                })
            } else {
                Ok(EvaluationResponse::deny())
            }
        }
    }

    /// Grants with a broken attribute set.
    struct BrokenMock;

    #[async_trait]
    impl AccessResolverClient for BrokenMock {
        async fn evaluate(
            &self,
            _req: EvaluationRequest,
        ) -> Result<EvaluationResponse, AccessResolverError> {
            Ok(EvaluationResponse {
                decision: true,
                ownership: false,
                attributes: ColumnAttributes {
                    excluded: Some(vec![]),
                    included: Some(vec![ColumnPath::all_root()]),
                },
            })
        }
    }

    /// Always fails.
    struct FailingMock;

    #[async_trait]
    impl AccessResolverClient for FailingMock {
        async fn evaluate(
            &self,
            req: EvaluationRequest,
        ) -> Result<EvaluationResponse, AccessResolverError> {
            Err(AccessResolverError::UnknownResource(req.resource))
        }
    }

    fn enforcer(mock: impl AccessResolverClient + 'static) -> PolicyEnforcer {
        PolicyEnforcer::new(Arc::new(mock))
    }

    #[test]
    fn build_request_carries_caller() {
        let subject = Uuid::parse_str(SUBJECT).unwrap();
        let ctx = CallerContext::authenticated(subject, Role::Shelter);

        let req = enforcer(AdminOnlyMock).build_request(&ctx, &PETS, Action::Update);
        assert_eq!(req.subject.id, subject);
        assert_eq!(req.subject.role, Some(Role::Shelter));
        assert!(req.subject.authenticated);
        assert_eq!(req.resource, "pets");
        assert_eq!(req.action, Action::Update);
    }

    #[tokio::test]
    async fn grant_for_admin_is_unrestricted() {
        let ctx = CallerContext::authenticated(Uuid::parse_str(SUBJECT).unwrap(), Role::Administrator);
        let grant = enforcer(AdminOnlyMock)
            .grant(&ctx, &PETS, Action::Read)
            .await
            .unwrap();
        assert_eq!(
            grant,
            Grant::Allowed {
                ownership_required: false,
                columns: ColumnPolicy::unrestricted(),
            }
        );
    }

    #[tokio::test]
    async fn anonymous_caller_is_denied() {
        let grant = enforcer(AdminOnlyMock)
            .grant(&CallerContext::anonymous(), &PETS, Action::Read)
            .await
            .unwrap();
        assert_eq!(grant, Grant::Denied);
    }

    #[tokio::test]
    async fn resolve_is_pure() {
        let enforcer = enforcer(AdminOnlyMock);
        let first = enforcer
            .resolve(&PETS, Action::Delete, Some(Role::Administrator))
            .await
            .unwrap();
        let second = enforcer
            .resolve(&PETS, Action::Delete, Some(Role::Administrator))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn compile_failure_surfaces() {
        let err = enforcer(BrokenMock)
            .resolve(&PETS, Action::Read, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EnforcerError::CompileFailed(_)));
    }

    #[tokio::test]
    async fn evaluation_failure_surfaces() {
        let err = enforcer(FailingMock)
            .resolve(&PETS, Action::Read, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnforcerError::EvaluationFailed(AccessResolverError::UnknownResource(ref r)) if r == "pets"
        ));
    }
}
