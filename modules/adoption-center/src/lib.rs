#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Adoption Center Module
//!
//! Access-controlled CRUD for users, shelters, tutors, pets and adoptions.
//!
//! Every operation resolves a [`Grant`](access_resolver_sdk::Grant) for the
//! caller's role from the static rule table, then runs the generic
//! [`EntityController`](domain::controller::EntityController): denied
//! grants are rejected, ownership-gated grants restrict rows to what the
//! caller owns, and the grant's column policy projects reads and gates
//! writes.
//!
//! ```ignore
//! let center = AdoptionCenter::in_memory(&AdoptionCenterConfig::default())?;
//! let pets = center.services().pets.list(&ctx, ListOptions::default()).await?;
//! ```

pub mod api;
pub mod config;
pub mod domain;
pub mod module;

pub use config::AdoptionCenterConfig;
pub use domain::controller::{DeleteMode, ListOptions, Listing};
pub use domain::error::DomainError;
pub use domain::service::{AppServices, ResourceService, ServiceConfig};
pub use module::AdoptionCenter;

#[cfg(test)]
mod test_support;
