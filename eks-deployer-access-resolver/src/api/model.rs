//! Configuration and result types of the resolver API

use serde::Serialize;

use crate::{
    aws::CallerIdentity,
    principal::{forms::PrincipalForms, forms::SessionMatching, CanonicalRoleReference},
    registrar::{AccessPolicyEntry, ConflictMode, RegistrationOutcome, ADMINISTRATOR_GROUP},
};

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// How the session form is written
    pub session_matching: SessionMatching,
    /// How the registrar treats re-registration with different groups
    pub conflict_mode: ConflictMode,
    /// Groups granted to the deployer
    pub groups: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            session_matching: SessionMatching::default(),
            conflict_mode: ConflictMode::default(),
            groups: vec![ADMINISTRATOR_GROUP.to_string()],
        }
    }
}

/// Everything derived for one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterAdminGrant {
    /// Identity that ran the deployment
    pub caller: CallerIdentity,
    /// Role backing the caller
    pub role: CanonicalRoleReference,
    /// Role and session ARN forms
    pub forms: PrincipalForms,
    /// Entries to register
    pub entries: Vec<AccessPolicyEntry>,
    /// Present once the entries were registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationOutcome>,
}
