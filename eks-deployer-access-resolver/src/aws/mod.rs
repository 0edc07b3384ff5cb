//! AWS SDK integration: caller identity lookup.

/// sts calls
pub mod sts;

use async_trait::async_trait;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// The currently authenticated caller, as reported by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    /// Caller ARN (e.g. arn:aws:sts::123456789012:assumed-role/Admin/SessionName)
    pub arn: String,
    /// Account owning the caller (e.g. 123456789012)
    pub account_id: String,
}

/// Source of the caller identity.
///
/// Failures are fatal to the resolution chain; implementations don't retry.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch the identity of the current caller
    async fn fetch_caller_identity(&self) -> Result<CallerIdentity>;
}

/// Identity provider returning a fixed identity
#[derive(Debug, Clone, new)]
pub struct StaticIdentityProvider {
    identity: CallerIdentity,
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn fetch_caller_identity(&self) -> Result<CallerIdentity> {
        Ok(self.identity.clone())
    }
}
