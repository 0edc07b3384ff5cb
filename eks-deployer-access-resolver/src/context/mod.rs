//! Typed deployment context shared between independently deployed stacks.
//!
//! Cluster name, VPC id, OIDC issuer and node architecture are produced by one
//! stack and consumed by the next. They are validated here, at the boundary,
//! before anything downstream uses them.

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr, sync::OnceLock};

use crate::errors::{ResolutionError, Result};

const MAX_CLUSTER_NAME_LEN: usize = 100;

static CLUSTER_NAME_PATTERN: OnceLock<Regex> = OnceLock::new();
static VPC_ID_PATTERN: OnceLock<Regex> = OnceLock::new();

fn cluster_name_pattern() -> &'static Regex {
    CLUSTER_NAME_PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9A-Za-z][A-Za-z0-9\-_]*$").expect("cluster name pattern is valid")
    })
}

fn vpc_id_pattern() -> &'static Regex {
    VPC_ID_PATTERN
        .get_or_init(|| Regex::new(r"^vpc-[0-9a-f]{8,17}$").expect("VPC id pattern is valid"))
}

/// CPU architecture of the cluster's worker nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// x86_64 nodes (t3 instances, AL2_x86_64 AMIs)
    #[default]
    X86,
    /// arm64 nodes (t4g instances, AL2_ARM_64 AMIs)
    Arm,
}

impl Architecture {
    /// EKS node group AMI type for this architecture
    pub const fn ami_type(self) -> &'static str {
        match self {
            Self::X86 => "AL2_x86_64",
            Self::Arm => "AL2_ARM_64",
        }
    }

    /// Default node instance type for this architecture
    pub const fn default_instance_type(self) -> &'static str {
        match self {
            Self::X86 => "t3.medium",
            Self::Arm => "t4g.medium",
        }
    }
}

impl FromStr for Architecture {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "x86_64" | "amd64" => Ok(Self::X86),
            "arm" | "arm64" | "aarch64" => Ok(Self::Arm),
            other => Err(ResolutionError::invalid_context(
                "architecture",
                format!("unknown architecture '{other}', expected 'x86' or 'arm'"),
            )),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86 => write!(f, "x86"),
            Self::Arm => write!(f, "arm"),
        }
    }
}

/// Values threaded from the cluster stack into dependent stacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentContext {
    /// Name of the EKS cluster
    #[serde(alias = "eksClusterName")]
    pub cluster_name: String,
    /// VPC the cluster runs in
    #[serde(default)]
    pub vpc_id: Option<String>,
    /// OIDC issuer of the cluster, without scheme
    #[serde(default, alias = "eksOidcUrl")]
    pub oidc_issuer: Option<String>,
    /// Worker node architecture
    #[serde(default)]
    pub architecture: Architecture,
}

impl DeploymentContext {
    /// Context for a cluster with no optional values set
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            vpc_id: None,
            oidc_issuer: None,
            architecture: Architecture::default(),
        }
    }

    /// Read and validate a context from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ResolutionError::file_system(path.display().to_string(), e))?;
        debug!("Loaded deployment context from {}", path.display());

        Self::from_json(&json)
    }

    /// Parse and validate a context from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let context: Self =
            serde_json::from_str(json).map_err(|e| ResolutionError::json("deployment context", e))?;
        context.validated()
    }

    /// Check every field, normalizing the OIDC issuer
    pub fn validated(mut self) -> Result<Self> {
        if self.cluster_name.is_empty() {
            return Err(ResolutionError::invalid_context(
                "clusterName",
                "cluster name is empty",
            ));
        }
        if self.cluster_name.len() > MAX_CLUSTER_NAME_LEN {
            return Err(ResolutionError::invalid_context(
                "clusterName",
                format!("cluster name is longer than {MAX_CLUSTER_NAME_LEN} characters"),
            ));
        }
        if !cluster_name_pattern().is_match(&self.cluster_name) {
            return Err(ResolutionError::invalid_context(
                "clusterName",
                format!(
                    "'{}' must start with a letter or digit and contain only letters, digits, '-' and '_'",
                    self.cluster_name
                ),
            ));
        }

        if let Some(vpc_id) = &self.vpc_id {
            if !vpc_id_pattern().is_match(vpc_id) {
                return Err(ResolutionError::invalid_context(
                    "vpcId",
                    format!("'{vpc_id}' is not a VPC id (vpc-<hex>)"),
                ));
            }
        }

        if let Some(issuer) = self.oidc_issuer.take() {
            self.oidc_issuer = Some(normalize_oidc_issuer(&issuer)?);
        }

        Ok(self)
    }

    /// IAM OIDC provider ARN for the cluster's issuer
    pub fn oidc_provider_arn(&self, partition: &str, account_id: &str) -> Option<String> {
        self.oidc_issuer
            .as_ref()
            .map(|issuer| format!("arn:{partition}:iam::{account_id}:oidc-provider/{issuer}"))
    }
}

/// `https://oidc.eks.us-west-2.amazonaws.com/id/ABC/` -> `oidc.eks.us-west-2.amazonaws.com/id/ABC`
fn normalize_oidc_issuer(issuer: &str) -> Result<String> {
    let trimmed = issuer.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    if without_scheme.is_empty() {
        return Err(ResolutionError::invalid_context(
            "oidcIssuer",
            "OIDC issuer is empty",
        ));
    }
    if without_scheme.contains("://") {
        return Err(ResolutionError::invalid_context(
            "oidcIssuer",
            format!("'{issuer}' must be an https issuer URL"),
        ));
    }
    Ok(without_scheme.to_string())
}
