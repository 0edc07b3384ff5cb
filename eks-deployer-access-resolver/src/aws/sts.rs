use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::{operation::get_caller_identity::GetCallerIdentityOutput, Client as StsClient};
use log::debug;

use super::{CallerIdentity, IdentityProvider};
use crate::errors::{ResolutionError, Result};

/// Identity provider backed by STS GetCallerIdentity
pub struct StsIdentityProvider {
    client: StsClient,
}

impl StsIdentityProvider {
    /// Wrap an existing STS client
    pub const fn new(client: StsClient) -> Self {
        Self { client }
    }

    /// Build a client from the standard credential provider chain.
    ///
    /// # Arguments
    ///
    /// * `region` - Region override, otherwise resolved from the environment
    /// * `profile` - Named profile override
    pub async fn from_env(region: Option<String>, profile: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        Self::new(StsClient::new(&config))
    }
}

#[async_trait]
impl IdentityProvider for StsIdentityProvider {
    async fn fetch_caller_identity(&self) -> Result<CallerIdentity> {
        let out = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| {
                ResolutionError::identity_fetch_with_source(
                    "STS GetCallerIdentity failed; make sure AWS credentials are configured",
                    e,
                )
            })?;

        let identity = caller_identity_from_output(&out)?;
        debug!(
            "STS reports caller {} in account {}",
            identity.arn, identity.account_id
        );
        Ok(identity)
    }
}

/// Extract the caller identity from a GetCallerIdentity response
pub(crate) fn caller_identity_from_output(out: &GetCallerIdentityOutput) -> Result<CallerIdentity> {
    let arn = out
        .arn()
        .map(ToString::to_string)
        .ok_or_else(|| ResolutionError::identity_fetch("STS GetCallerIdentity missing Arn"))?;
    let account_id = out
        .account()
        .map(ToString::to_string)
        .ok_or_else(|| ResolutionError::identity_fetch("STS GetCallerIdentity missing Account"))?;

    Ok(CallerIdentity::new(arn, account_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_identity_from_output() {
        let out = GetCallerIdentityOutput::builder()
            .arn("arn:aws:sts::123456789012:assumed-role/Admin/session1")
            .account("123456789012")
            .user_id("AROAEXAMPLE:session1")
            .build();

        let identity = caller_identity_from_output(&out).expect("complete response");
        assert_eq!(
            identity.arn,
            "arn:aws:sts::123456789012:assumed-role/Admin/session1"
        );
        assert_eq!(identity.account_id, "123456789012");
    }

    #[test]
    fn test_caller_identity_missing_account() {
        let out = GetCallerIdentityOutput::builder()
            .arn("arn:aws:sts::123456789012:assumed-role/Admin/session1")
            .build();

        let err = caller_identity_from_output(&out).expect_err("missing account");
        assert!(matches!(err, ResolutionError::IdentityFetchFailed { .. }));
        assert!(err.to_string().contains("Account"));
    }
}
