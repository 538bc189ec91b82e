use http::StatusCode;

use super::problem::Problem;
use crate::domain::error::DomainError;

/// Convert a domain error into the problem document returned to the client.
///
/// Server-side faults are logged here and reported without their details.
pub fn domain_error_to_problem(err: &DomainError, instance: &str) -> Problem {
    let problem = match err {
        DomainError::NotOwner => {
            Problem::new(StatusCode::FORBIDDEN, "Forbidden", err.to_string()).with_code("NOT_OWNER")
        }
        DomainError::Forbidden => {
            Problem::new(StatusCode::FORBIDDEN, "Forbidden", err.to_string()).with_code("FORBIDDEN")
        }
        DomainError::Unauthenticated => {
            Problem::new(StatusCode::UNAUTHORIZED, "Unauthorized", err.to_string())
                .with_code("UNAUTHENTICATED")
        }
        DomainError::PatchPropertyNotAllowed(_) => {
            Problem::new(StatusCode::FORBIDDEN, "Forbidden", err.to_string())
                .with_code("PROPERTY_NOT_ALLOWED")
        }
        DomainError::MethodNotAllowed(_) => Problem::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed",
            err.to_string(),
        )
        .with_code("METHOD_NOT_ALLOWED"),
        DomainError::IdReplacement => {
            Problem::new(StatusCode::BAD_REQUEST, "Bad Request", err.to_string())
                .with_code("ID_REPLACEMENT")
        }
        DomainError::BadRequest(message) => {
            Problem::new(StatusCode::BAD_REQUEST, "Bad Request", message.clone())
                .with_code("BAD_REQUEST")
        }
        DomainError::Conflict(message) => {
            Problem::new(StatusCode::CONFLICT, "Conflict", message.clone()).with_code("CONFLICT")
        }
        DomainError::NotFound { .. } => {
            Problem::new(StatusCode::NOT_FOUND, "Not Found", err.to_string()).with_code("NOT_FOUND")
        }
        DomainError::Misconfigured(_) | DomainError::Database(_) | DomainError::Internal(_) => {
            tracing::error!(error = %err, %instance, "request failed");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "An internal error occurred",
            )
            .with_code("INTERNAL")
        }
    };
    problem.with_instance(instance)
}

impl From<DomainError> for Problem {
    fn from(e: DomainError) -> Self {
        domain_error_to_problem(&e, "")
    }
}
