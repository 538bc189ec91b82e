#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Data layer for Adoptly entities.
//!
//! - [`entity`]: static entity metadata and the [`Record`] shape
//! - [`columns`]: column selection from a [`ColumnPolicy`](adoptly_security::ColumnPolicy)
//! - [`guard`]: PUT/PATCH gating and identity immutability
//! - [`merge`]: PATCH deep merge
//! - [`store`]: the [`EntityStore`] contract; [`memory`] implements it in memory

pub mod columns;
pub mod entity;
pub mod guard;
pub mod memory;
pub mod merge;
pub mod store;

pub use columns::{SelectError, all_columns, project, select_columns};
pub use entity::{EntityMeta, Record, RelationKind, RelationMeta, lookup_path};
pub use guard::{
    GuardError, assert_no_id_replacement, assert_patch_allowed, assert_replace_allowed,
    flatten_paths,
};
pub use memory::MemoryStore;
pub use merge::merge_record;
pub use store::{EntityStore, FindQuery, StoreError};
