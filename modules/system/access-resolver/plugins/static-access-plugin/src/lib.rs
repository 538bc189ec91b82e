#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static Access Resolver Plugin
//!
//! Evaluates access requests against a rule table loaded once at start-up.
//! Each resource owns an ordered list of rules; the first rule whose action
//! and roles match the request decides.
//!
//! ## Configuration
//!
//! The default table ships embedded (`permissions.yaml`). It can be replaced
//! per resource by a YAML file and tuned through `ADOPTLY_ACCESS__*`
//! environment variables:
//!
//! ```yaml
//! vendor: "adoptly"
//! priority: 100
//! resources:
//!   pets:
//!     - action: crud
//!       roles: [ADMINISTRATOR]
//!       attributes: { excluded: [] }
//!     - action: read
//!       roles: NONE
//!       attributes: { excluded: [deletedAt] }
//! ```

pub mod config;
pub mod domain;

pub use config::StaticAccessPluginConfig;
pub use domain::Service;
