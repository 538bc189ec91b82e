//! PEP (Policy Enforcement Point) helpers.
//!
//! - [`PolicyEnforcer`] - PEP object (build → evaluate → compile)
//! - [`ResourceType`] - Static descriptor for a resource type
//! - [`compile_to_grant`] - Low-level: compile an evaluation response into a [`Grant`](crate::Grant)

pub mod compiler;
pub mod enforcer;

pub use compiler::{GrantCompileError, compile_to_grant};
pub use enforcer::{EnforcerError, PolicyEnforcer, ResourceType};
