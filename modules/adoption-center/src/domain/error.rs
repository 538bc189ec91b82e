use access_resolver_sdk::{AccessResolverError, EnforcerError};
use adoptly_db::{GuardError, SelectError, StoreError};
use thiserror::Error;

/// Domain-specific errors using thiserror
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Only owner is authorized to perform this action")]
    NotOwner,

    /// No rule grants the action to an anonymous caller.
    #[error("Authentication required")]
    Unauthenticated,

    /// No rule grants the action to the caller's role.
    #[error("Not authorized to perform this action")]
    Forbidden,

    #[error("Method {0} is not allowed")]
    MethodNotAllowed(String),

    #[error("{}", patch_message(.0.as_deref()))]
    PatchPropertyNotAllowed(Option<String>),

    #[error("Identity fields cannot be replaced")]
    IdReplacement,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// Broken rule table or entity wiring. Never a caller mistake.
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn patch_message(path: Option<&str>) -> String {
    match path {
        Some(path) => format!("Property '{path}' is not allowed to be updated"),
        None => "No property is allowed to be updated".to_owned(),
    }
}

impl DomainError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn misconfigured(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "access configuration fault");
        Self::Misconfigured(message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The denial for a caller, depending on whether they authenticated.
    #[must_use]
    pub fn denied(authenticated: bool) -> Self {
        if authenticated {
            Self::Forbidden
        } else {
            Self::Unauthenticated
        }
    }

    /// Authorization and write-policy rejections; deterministic for a given input.
    #[must_use]
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotOwner
                | Self::Unauthenticated
                | Self::Forbidden
                | Self::MethodNotAllowed(_)
                | Self::PatchPropertyNotAllowed(_)
                | Self::IdReplacement
        )
    }
}

impl From<GuardError> for DomainError {
    fn from(e: GuardError) -> Self {
        tracing::warn!(error = %e, "write rejected by column policy");
        match e {
            GuardError::MethodNotAllowed(method) => Self::MethodNotAllowed(method),
            GuardError::PatchPropertyNotAllowed(path) => Self::PatchPropertyNotAllowed(path),
            GuardError::IdReplacement => Self::IdReplacement,
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EntityNotFound { entity } => Self::NotFound { entity },
            StoreError::Conflict { .. } | StoreError::ForeignChild { .. } => {
                Self::Conflict(e.to_string())
            }
            StoreError::Unsupported { .. } => Self::misconfigured(e.to_string()),
            StoreError::Internal(message) => Self::Database(message),
        }
    }
}

impl From<SelectError> for DomainError {
    fn from(e: SelectError) -> Self {
        Self::misconfigured(e.to_string())
    }
}

impl From<AccessResolverError> for DomainError {
    fn from(e: AccessResolverError) -> Self {
        match e {
            AccessResolverError::UnknownResource(_)
            | AccessResolverError::MisconfiguredRule { .. } => Self::misconfigured(e.to_string()),
            AccessResolverError::Internal(message) => Self::Internal(message),
        }
    }
}

impl From<EnforcerError> for DomainError {
    fn from(e: EnforcerError) -> Self {
        match e {
            EnforcerError::EvaluationFailed(inner) => inner.into(),
            EnforcerError::CompileFailed(_) => Self::misconfigured(e.to_string()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use adoptly_security::ColumnPolicyError;

    #[test]
    fn not_owner_message_is_stable() {
        assert_eq!(
            DomainError::NotOwner.to_string(),
            "Only owner is authorized to perform this action"
        );
    }

    #[test]
    fn guard_errors_keep_their_kind() {
        assert_eq!(
            DomainError::from(GuardError::PatchPropertyNotAllowed(Some("adopted".to_owned()))),
            DomainError::PatchPropertyNotAllowed(Some("adopted".to_owned()))
        );
        assert_eq!(
            DomainError::from(GuardError::MethodNotAllowed("PUT".to_owned())),
            DomainError::MethodNotAllowed("PUT".to_owned())
        );
        assert_eq!(DomainError::from(GuardError::IdReplacement), DomainError::IdReplacement);
    }

    #[test]
    fn store_not_found_propagates() {
        assert_eq!(
            DomainError::from(StoreError::EntityNotFound { entity: "Pet" }),
            DomainError::NotFound { entity: "Pet" }
        );
    }

    #[test]
    fn configuration_faults_are_misconfigured() {
        let err = DomainError::from(AccessResolverError::MisconfiguredRule {
            resource: "pets".to_owned(),
            index: 2,
            source: ColumnPolicyError::BothListsSet,
        });
        assert!(matches!(err, DomainError::Misconfigured(_)));

        let err = DomainError::from(SelectError::EmptyProjection { entity: "Pet" });
        assert!(matches!(err, DomainError::Misconfigured(_)));

        let err = DomainError::from(StoreError::Unsupported {
            entity: "Adoption",
            operation: "soft delete",
        });
        assert!(matches!(err, DomainError::Misconfigured(_)));
    }

    #[test]
    fn denial_depends_on_authentication() {
        assert_eq!(DomainError::denied(false), DomainError::Unauthenticated);
        assert_eq!(DomainError::denied(true), DomainError::Forbidden);
        assert!(DomainError::Forbidden.is_policy_rejection());
        assert!(!DomainError::bad_request("x").is_policy_rejection());
    }
}
