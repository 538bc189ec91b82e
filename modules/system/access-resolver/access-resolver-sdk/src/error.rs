//! Error types for the access resolver.

use adoptly_security::ColumnPolicyError;
use thiserror::Error;

/// Errors raised while evaluating a request.
///
/// Access denial is not an error: it is expressed as
/// `EvaluationResponse.decision == false`. Every variant here is a
/// configuration or infrastructure fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessResolverError {
    /// The rule table has no entry for the resource. Always a wiring bug.
    #[error("no access rules declared for resource '{0}'")]
    UnknownResource(String),

    /// A rule's column attributes are invalid.
    #[error("rule #{index} of resource '{resource}' is misconfigured: {source}")]
    MisconfiguredRule {
        resource: String,
        index: usize,
        source: ColumnPolicyError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}
