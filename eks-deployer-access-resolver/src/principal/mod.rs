//! Principal ARNs: parsing, classification and the role forms derived from them.

/// classification and canonicalization
pub mod normalizer;

/// role ARN / assumed-role ARN derivation
pub mod forms;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::errors::{ResolutionError, Result};

/// Number of `:`-delimited fields in a principal ARN
const ARN_FIELD_COUNT: usize = 6;

/// Default partition for principals that don't carry one
pub const DEFAULT_PARTITION: &str = "aws";

/// A principal ARN split into its structural fields.
///
/// `arn:<partition>:<service>:<region>:<account>:<resource>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalArn {
    /// Partition (e.g. "aws", "aws-cn", "aws-us-gov")
    pub partition: String,
    /// Issuing service, "sts" for sessions and "iam" for users and roles
    pub service: String,
    /// Region, empty for IAM and global STS principals
    pub region: String,
    /// Account ID, empty for some AWS-managed principals
    pub account: String,
    /// Resource part (e.g. "assumed-role/Admin/session1")
    pub resource: String,
}

impl PrincipalArn {
    /// Parse a raw ARN string
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.splitn(ARN_FIELD_COUNT, ':').collect();
        if fields.len() < ARN_FIELD_COUNT {
            return Err(ResolutionError::malformed_arn(
                raw,
                format!(
                    "expected {} ':'-delimited fields, found {}",
                    ARN_FIELD_COUNT,
                    fields.len()
                ),
            ));
        }
        if fields[0] != "arn" {
            return Err(ResolutionError::malformed_arn(
                raw,
                "ARN must start with 'arn:'",
            ));
        }
        if fields[1].is_empty() {
            return Err(ResolutionError::malformed_arn(raw, "partition is empty"));
        }

        Ok(Self {
            partition: fields[1].to_string(),
            service: fields[2].to_string(),
            region: fields[3].to_string(),
            account: fields[4].to_string(),
            resource: fields[5].to_string(),
        })
    }
}

impl FromStr for PrincipalArn {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PrincipalArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

/// What kind of principal an ARN names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Classification {
    /// A temporary session of an IAM role
    AssumedRole {
        /// Role the session was assumed from
        role_name: String,
        /// Session name, different on every deployment
        session_name: String,
    },
    /// A long-lived IAM user
    IamUser {
        /// User name (without path)
        user_name: String,
    },
    /// An IAM role
    IamRole {
        /// Role name (without path)
        role_name: String,
    },
    /// Anything else: account root, federated users, non-principal resources
    Unrecognized {
        /// The ARN as it was received
        raw: String,
    },
}

impl Classification {
    /// Short label used in diagnostics
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AssumedRole { .. } => "assumed-role",
            Self::IamUser { .. } => "iam-user",
            Self::IamRole { .. } => "iam-role",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }

    /// Role name backing the principal, if it has one
    pub fn role_name(&self) -> Option<&str> {
        match self {
            Self::AssumedRole { role_name, .. } | Self::IamRole { role_name } => Some(role_name),
            Self::IamUser { .. } | Self::Unrecognized { .. } => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssumedRole {
                role_name,
                session_name,
            } => write!(f, "assumed-role {role_name} (session {session_name})"),
            Self::IamUser { user_name } => write!(f, "iam-user {user_name}"),
            Self::IamRole { role_name } => write!(f, "iam-role {role_name}"),
            Self::Unrecognized { raw } => write!(f, "unrecognized principal {raw}"),
        }
    }
}

/// The durable IAM role behind a classified principal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalRoleReference {
    /// Partition the role lives in
    pub partition: String,
    /// Account owning the role
    pub account_id: String,
    /// Role name, without path
    pub role_name: String,
}

impl CanonicalRoleReference {
    /// Reference in the default `aws` partition
    pub fn new(account_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            partition: DEFAULT_PARTITION.to_string(),
            account_id: account_id.into(),
            role_name: role_name.into(),
        }
    }

    /// Same role, placed in another partition
    #[must_use]
    pub fn in_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }
}
