#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Access Resolver SDK
//!
//! This crate provides the public API of the access resolver:
//!
//! - [`AccessResolverClient`] - Public API trait for consumers
//! - [`EvaluationRequest`], [`EvaluationResponse`] - Evaluation models
//! - [`Rule`], [`RoleMatcher`], [`ColumnAttributes`] - Rule table models
//! - [`Grant`] - The compiled per-request decision
//! - [`AccessResolverError`] - Error types
//! - [`pep`] - PEP helpers ([`PolicyEnforcer`], [`ResourceType`], compiler)
//!
//! ## Usage
//!
//! ```ignore
//! use access_resolver_sdk::{Action, pep::{PolicyEnforcer, ResourceType}};
//!
//! const PETS: ResourceType = ResourceType { name: "pets" };
//!
//! // Create an enforcer once, during init; it serves all resource types.
//! let enforcer = PolicyEnforcer::new(resolver);
//!
//! let grant = enforcer.grant(&ctx, &PETS, Action::Update).await?;
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod pep;

pub use api::AccessResolverClient;
pub use error::AccessResolverError;
pub use models::{
    ANYONE, Action, ColumnAttributes, EvaluationRequest, EvaluationResponse, Grant, RoleMatcher,
    Rule, Subject,
};
pub use pep::{EnforcerError, GrantCompileError, PolicyEnforcer, ResourceType, compile_to_grant};
