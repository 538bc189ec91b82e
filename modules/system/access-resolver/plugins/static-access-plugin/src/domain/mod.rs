//! Domain layer for the static access resolver plugin.

mod client;
pub mod service;

pub use service::Service;
