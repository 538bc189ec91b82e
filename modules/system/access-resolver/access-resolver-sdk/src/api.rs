//! Public API trait for the access resolver.

use async_trait::async_trait;

use crate::error::AccessResolverError;
use crate::models::{EvaluationRequest, EvaluationResponse};

/// Policy decision point consumed by services acting as enforcement points.
///
/// ```ignore
/// let response = resolver.evaluate(request).await?;
/// ```
#[async_trait]
pub trait AccessResolverClient: Send + Sync {
    /// Evaluate an access request against the rule table.
    ///
    /// # Errors
    ///
    /// - `UnknownResource` if the resource has no rules
    /// - `MisconfiguredRule` if the matched rule has invalid attributes
    /// - `Internal` for unexpected errors
    async fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> Result<EvaluationResponse, AccessResolverError>;
}
