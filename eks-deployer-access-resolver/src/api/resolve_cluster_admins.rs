use log::{debug, info};
use std::time::Instant;

use crate::{
    api::model::{ClusterAdminGrant, ResolverConfig},
    aws::IdentityProvider,
    errors::Result,
    principal::{forms::expand_with, normalizer::normalize},
    registrar::{entries_for, AuthorizationMapping},
};

/// Resolve the deploying identity into the entries that grant it cluster access.
///
/// Fetches the caller identity once, normalizes it to its backing role and
/// expands the role into its role and session forms. Nothing is registered.
pub async fn resolve_cluster_admins(
    provider: &dyn IdentityProvider,
    config: &ResolverConfig,
) -> Result<ClusterAdminGrant> {
    let started = Instant::now();

    let caller = provider.fetch_caller_identity().await?;
    debug!(
        "Resolving caller {} (account {})",
        caller.arn, caller.account_id
    );

    let role = normalize(&caller)?;
    let forms = expand_with(&role, config.session_matching);
    let entries = entries_for(&forms, config.groups.as_slice());

    debug!(
        "Resolved {} entries for role {} in {:?}",
        entries.len(),
        forms.role_arn,
        started.elapsed()
    );

    Ok(ClusterAdminGrant {
        caller,
        role,
        forms,
        entries,
        registration: None,
    })
}

/// Resolve the deploying identity and register it in the mapping.
///
/// On any error the mapping is left as it was.
pub async fn register_cluster_admins(
    provider: &dyn IdentityProvider,
    mapping: &mut AuthorizationMapping,
    config: &ResolverConfig,
) -> Result<ClusterAdminGrant> {
    let mut grant = resolve_cluster_admins(provider, config).await?;

    let outcome = mapping.register_with(&grant.entries, config.conflict_mode)?;
    info!(
        "Granted {:?} to {} via {} mapping entries",
        config.groups,
        grant.forms.role_arn,
        grant.entries.len()
    );

    grant.registration = Some(outcome);
    Ok(grant)
}
