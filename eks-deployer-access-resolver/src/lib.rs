//! This crate provides the core logic for granting the identity that deploys
//! an EKS cluster administrator access to it:
//! - Caller identity lookup (STS, or a fixed identity)
//! - Principal ARN parsing, classification and canonicalization to a role
//! - Role / assumed-role session ARN expansion
//! - Registration into the `aws-auth` authorization mapping
//! - Typed deployment context shared between stacks
//!

pub mod api;
pub mod aws;
pub mod context;
mod errors;
pub mod principal;
pub mod registrar;

// Re-exports for a small, focused public API
pub use api::model::{ClusterAdminGrant, ResolverConfig};
pub use api::{register_cluster_admins, resolve_cluster_admins};
pub use aws::{sts::StsIdentityProvider, CallerIdentity, IdentityProvider, StaticIdentityProvider};
pub use context::{Architecture, DeploymentContext};
pub use errors::{ResolutionError, Result};
pub use principal::forms::{expand, expand_with, PrincipalForms, SessionMatching};
pub use principal::normalizer::{canonicalize, classify, normalize};
pub use principal::{CanonicalRoleReference, Classification, PrincipalArn};
pub use registrar::config_map::{AwsAuthConfigMap, MapRole};
pub use registrar::{
    administrator_entries, AccessPolicyEntry, AuthorizationMapping, ConflictMode,
    RegistrationOutcome, ADMINISTRATOR_GROUP,
};
