//! PEP grant compiler.
//!
//! Compiles PDP evaluation responses into a [`Grant`].
//!
//! | decision | attributes              | Result |
//! |----------|-------------------------|--------|
//! | false    | (ignored)               | `Grant::Denied` |
//! | true     | exactly one list        | `Grant::Allowed` |
//! | true     | both lists / no list    | `InvalidAttributes` |
//!
//! A denied response short-circuits: its attributes are never inspected.

use adoptly_security::ColumnPolicyError;

use crate::models::{EvaluationResponse, Grant};

/// Error during grant compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantCompileError {
    /// An allowing response carried unusable column attributes.
    #[error("granted response has invalid column attributes: {0}")]
    InvalidAttributes(#[from] ColumnPolicyError),
}

/// Compile an evaluation response into a [`Grant`].
///
/// # Errors
///
/// [`GrantCompileError::InvalidAttributes`] when a granted response declares
/// both column lists or neither.
pub fn compile_to_grant(response: &EvaluationResponse) -> Result<Grant, GrantCompileError> {
    if !response.decision {
        return Ok(Grant::Denied);
    }
    let columns = response.attributes.to_policy().inspect_err(|e| {
        tracing::error!(error = %e, "PDP granted access with invalid column attributes");
    })?;
    Ok(Grant::Allowed {
        ownership_required: response.ownership,
        columns,
    })
}
