use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::CanonicalRoleReference;

/// How the session form of a role is written into the authorization mapping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMatching {
    /// `arn:<partition>:sts::<account>:assumed-role/<role>/*`, any session name
    #[default]
    Wildcard,
    /// The authorization layer maps sessions back to their role on its own;
    /// the session form collapses to the role ARN.
    RoleArnOnly,
}

impl FromStr for SessionMatching {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wildcard" => Ok(Self::Wildcard),
            "role-arn-only" => Ok(Self::RoleArnOnly),
            other => Err(format!(
                "unknown session matching '{other}', expected 'wildcard' or 'role-arn-only'"
            )),
        }
    }
}

impl fmt::Display for SessionMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "wildcard"),
            Self::RoleArnOnly => write!(f, "role-arn-only"),
        }
    }
}

/// Both ARN forms under which a role shows up during cluster authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalForms {
    /// `arn:<partition>:iam::<account>:role/<role>`
    pub role_arn: String,
    /// Live session form, see [`SessionMatching`]
    pub assumed_role_arn: String,
}

impl PrincipalForms {
    /// Distinct ARNs, role form first
    pub fn distinct(&self) -> Vec<&str> {
        let mut arns = vec![self.role_arn.as_str()];
        if self.assumed_role_arn != self.role_arn {
            arns.push(self.assumed_role_arn.as_str());
        }
        arns
    }
}

/// Expand a role reference into its role and wildcard session ARNs
pub fn expand(reference: &CanonicalRoleReference) -> PrincipalForms {
    expand_with(reference, SessionMatching::Wildcard)
}

/// Expand a role reference using the given session matching
pub fn expand_with(reference: &CanonicalRoleReference, matching: SessionMatching) -> PrincipalForms {
    let role_arn = format!(
        "arn:{}:iam::{}:role/{}",
        reference.partition, reference.account_id, reference.role_name
    );
    let assumed_role_arn = match matching {
        SessionMatching::Wildcard => format!(
            "arn:{}:sts::{}:assumed-role/{}/*",
            reference.partition, reference.account_id, reference.role_name
        ),
        SessionMatching::RoleArnOnly => role_arn.clone(),
    };

    PrincipalForms {
        role_arn,
        assumed_role_arn,
    }
}
