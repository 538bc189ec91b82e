#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Security primitives shared by Adoptly crates.
//!
//! - [`context`]: the [`CallerContext`] a request runs as
//! - [`column_policy`]: column paths and the include/exclude [`ColumnPolicy`]
//! - [`owner_scope`]: the [`OwnerScope`] row restriction for owned reads

pub mod column_policy;
pub mod context;
pub mod owner_scope;

pub use column_policy::{ColumnPath, ColumnPolicy, ColumnPolicyError, WILDCARD};
pub use context::{CallerContext, CallerContextBuilder, Role};
pub use owner_scope::{OwnerFilter, OwnerScope, ScopeValue};
