//! REST-facing shapes. Routing lives in the host application; this module
//! only turns domain outcomes into RFC 9457 problem documents.

pub mod error;
pub mod problem;

pub use error::domain_error_to_problem;
pub use problem::{APPLICATION_PROBLEM_JSON, Problem};
