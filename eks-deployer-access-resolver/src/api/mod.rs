//! Deployer access resolver API

mod resolve_cluster_admins;
pub use resolve_cluster_admins::{register_cluster_admins, resolve_cluster_admins};
pub mod model;
