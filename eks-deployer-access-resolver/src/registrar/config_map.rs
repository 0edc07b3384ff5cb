//! The `aws-auth` ConfigMap the EKS authenticator reads role mappings from.
//!
//! `data.mapRoles` holds a YAML list of `{rolearn, username, groups}` records.
//! eksctl and hand-edited clusters write it as block YAML; this crate writes it
//! as JSON, which is valid YAML. Everything else in the object (metadata,
//! `mapUsers`, `mapAccounts`, `binaryData`) is carried through untouched.

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AccessPolicyEntry, AuthorizationMapping, ConflictMode};
use crate::errors::{ResolutionError, Result};

/// ConfigMap name
pub const AWS_AUTH_NAME: &str = "aws-auth";
/// ConfigMap namespace
pub const AWS_AUTH_NAMESPACE: &str = "kube-system";
/// Data key holding the role mappings
pub const MAP_ROLES_KEY: &str = "mapRoles";

/// One record of `data.mapRoles`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRole {
    /// ARN of the AWS role
    pub rolearn: String,
    /// Username inside Kubernetes
    pub username: String,
    /// Groups inside Kubernetes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl From<&AccessPolicyEntry> for MapRole {
    fn from(entry: &AccessPolicyEntry) -> Self {
        Self {
            rolearn: entry.principal_arn.clone(),
            username: entry.username.clone(),
            groups: entry.groups.iter().cloned().collect(),
        }
    }
}

impl From<MapRole> for AccessPolicyEntry {
    fn from(role: MapRole) -> Self {
        Self {
            principal_arn: role.rolearn,
            username: role.username,
            groups: role.groups.into_iter().collect(),
        }
    }
}

/// The `aws-auth` ConfigMap document
#[derive(Debug, Clone, PartialEq)]
pub struct AwsAuthConfigMap(ConfigMap);

impl Default for AwsAuthConfigMap {
    fn default() -> Self {
        Self(ConfigMap {
            metadata: ObjectMeta {
                name: Some(AWS_AUTH_NAME.to_string()),
                namespace: Some(AWS_AUTH_NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }
}

impl From<ConfigMap> for AwsAuthConfigMap {
    fn from(config_map: ConfigMap) -> Self {
        Self(config_map)
    }
}

impl AwsAuthConfigMap {
    /// Parse a ConfigMap JSON document.
    ///
    /// A document of any other kind is a `Json` error.
    pub fn parse(json: &str) -> Result<Self> {
        let config_map: ConfigMap = serde_json::from_str(json)
            .map_err(|e| ResolutionError::json("aws-auth ConfigMap", e))?;

        let metadata = &config_map.metadata;
        if metadata.name.as_deref() != Some(AWS_AUTH_NAME)
            || metadata.namespace.as_deref() != Some(AWS_AUTH_NAMESPACE)
        {
            warn!(
                "ConfigMap is {}/{}, the EKS authenticator only reads {}/{}",
                metadata.namespace.as_deref().unwrap_or_default(),
                metadata.name.as_deref().unwrap_or_default(),
                AWS_AUTH_NAMESPACE,
                AWS_AUTH_NAME
            );
        }
        Ok(Self(config_map))
    }

    /// Object metadata, as read
    pub fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    /// Raw value of a `data` key
    pub fn data(&self, key: &str) -> Option<&str> {
        self.0.data.as_ref()?.get(key).map(String::as_str)
    }

    /// Set a raw `data` key, keeping the others
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
    }

    /// The underlying ConfigMap object
    pub fn into_inner(self) -> ConfigMap {
        self.0
    }

    /// Records of `data.mapRoles`, empty when the key is absent or blank
    pub fn map_roles(&self) -> Result<Vec<MapRole>> {
        match self.data(MAP_ROLES_KEY) {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => serde_yaml::from_str(raw)
                .map_err(|e| ResolutionError::yaml("aws-auth mapRoles", e)),
        }
    }

    /// Serialize the document
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(&self.0)
        } else {
            serde_json::to_string(&self.0)
        };
        json.map_err(|e| ResolutionError::json("aws-auth ConfigMap", e))
    }
}

impl AuthorizationMapping {
    /// The mapping as `mapRoles` records, ordered by role ARN
    pub fn map_roles(&self) -> Vec<MapRole> {
        self.entries().map(MapRole::from).collect()
    }

    /// Load the role mappings already present in a ConfigMap.
    ///
    /// Records are taken as found, including ones without groups; only
    /// entries registered afterwards are validated.
    pub fn from_config_map(config_map: &AwsAuthConfigMap, conflict_mode: ConflictMode) -> Result<Self> {
        let mut mapping = Self::with_conflict_mode(conflict_mode);
        mapping.restore(config_map.map_roles()?.into_iter().map(AccessPolicyEntry::from));
        Ok(mapping)
    }

    /// Write the mapping into `data.mapRoles` of a ConfigMap, keeping other keys
    pub fn write_config_map(&self, config_map: &mut AwsAuthConfigMap) -> Result<()> {
        let map_roles = serde_json::to_string(&self.map_roles())
            .map_err(|e| ResolutionError::json("aws-auth mapRoles", e))?;
        config_map.set_data(MAP_ROLES_KEY, map_roles);
        Ok(())
    }

    /// A fresh `aws-auth` ConfigMap holding this mapping
    pub fn to_config_map(&self) -> Result<AwsAuthConfigMap> {
        let mut config_map = AwsAuthConfigMap::default();
        self.write_config_map(&mut config_map)?;
        Ok(config_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::ADMINISTRATOR_GROUP;

    const ADMIN_ROLE: &str = "arn:aws:iam::123456789012:role/Admin";

    const EXISTING: &str = r#"{
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": "aws-auth", "namespace": "kube-system"},
        "data": {
            "mapRoles": "[{\"rolearn\":\"arn:aws:iam::123456789012:role/NodeRole\",\"username\":\"system:node:{{EC2PrivateDNSName}}\",\"groups\":[\"system:bootstrappers\",\"system:nodes\"]}]",
            "mapUsers": "[]"
        }
    }"#;

    // Shape written by eksctl and by kubectl edit
    const EKSCTL_MAP_ROLES: &str = "\
- rolearn: arn:aws:iam::123456789012:role/NodeRole
  username: system:node:{{EC2PrivateDNSName}}
  groups:
    - system:bootstrappers
    - system:nodes
- rolearn: arn:aws:iam::123456789012:role/ReadOnly
  username: readonly
";

    fn eksctl_config_map() -> AwsAuthConfigMap {
        let mut config_map = AwsAuthConfigMap::default();
        config_map.set_data(MAP_ROLES_KEY, EKSCTL_MAP_ROLES);
        config_map
    }

    #[test]
    fn test_render_config_map() {
        let mut mapping = AuthorizationMapping::new();
        mapping
            .register(&[AccessPolicyEntry::administrator(ADMIN_ROLE)])
            .expect("register");

        let config_map = mapping.to_config_map().expect("render");

        assert_eq!(config_map.metadata().name.as_deref(), Some("aws-auth"));
        assert_eq!(config_map.metadata().namespace.as_deref(), Some("kube-system"));
        let roles = config_map.map_roles().expect("mapRoles");
        assert_eq!(
            roles,
            vec![MapRole {
                rolearn: ADMIN_ROLE.to_string(),
                username: ADMIN_ROLE.to_string(),
                groups: vec![ADMINISTRATOR_GROUP.to_string()],
            }]
        );
    }

    #[test]
    fn test_merge_into_existing_keeps_other_entries() {
        let mut config_map = AwsAuthConfigMap::parse(EXISTING).expect("parse");
        let mut mapping =
            AuthorizationMapping::from_config_map(&config_map, ConflictMode::Reject).expect("load");
        assert_eq!(mapping.len(), 1);

        mapping
            .register(&[AccessPolicyEntry::administrator(ADMIN_ROLE)])
            .expect("register");
        mapping.write_config_map(&mut config_map).expect("write");

        let roles = config_map.map_roles().expect("mapRoles");
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[1].username, "system:node:{{EC2PrivateDNSName}}");
        assert_eq!(config_map.data("mapUsers"), Some("[]"));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config_map = AwsAuthConfigMap::parse(EXISTING).expect("parse");
        let json = config_map.to_json(false).expect("serialize");

        assert_eq!(AwsAuthConfigMap::parse(&json).expect("reparse"), config_map);
    }

    #[test]
    fn test_yaml_map_roles_load() {
        let roles = eksctl_config_map().map_roles().expect("yaml mapRoles");

        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].rolearn, "arn:aws:iam::123456789012:role/NodeRole");
        assert_eq!(roles[0].username, "system:node:{{EC2PrivateDNSName}}");
        assert_eq!(roles[0].groups, vec!["system:bootstrappers", "system:nodes"]);
        assert_eq!(roles[1].username, "readonly");
        assert!(roles[1].groups.is_empty());
    }

    #[test]
    fn test_records_without_groups_survive_registration() {
        let mut config_map = eksctl_config_map();
        let mut mapping = AuthorizationMapping::from_config_map(&config_map, ConflictMode::Reject)
            .expect("load records without groups");

        mapping
            .register(&[AccessPolicyEntry::administrator(ADMIN_ROLE)])
            .expect("register");
        mapping.write_config_map(&mut config_map).expect("write");

        let roles = config_map.map_roles().expect("mapRoles");
        assert_eq!(roles.len(), 3);
        let read_only = roles
            .iter()
            .find(|role| role.rolearn == "arn:aws:iam::123456789012:role/ReadOnly")
            .expect("read-only role kept");
        assert_eq!(read_only.username, "readonly");
        assert!(read_only.groups.is_empty());
    }

    #[test]
    fn test_malformed_map_roles_is_an_error() {
        let mut config_map = AwsAuthConfigMap::default();
        config_map.set_data(MAP_ROLES_KEY, "- rolearn: [unterminated\n");

        assert!(matches!(
            config_map.map_roles(),
            Err(ResolutionError::Yaml { .. })
        ));
    }

    #[test]
    fn test_metadata_survives_rewrite() {
        let json = r#"{
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "aws-auth",
                "namespace": "kube-system",
                "resourceVersion": "48213",
                "uid": "5b3c0a1e-8f0d-4c1a-9f3e-2d7c1a0b9e44",
                "labels": {"app.kubernetes.io/managed-by": "eksctl"},
                "annotations": {"example.com/owner": "platform"}
            },
            "data": {"mapRoles": ""}
        }"#;
        let mut config_map = AwsAuthConfigMap::parse(json).expect("parse");
        let mut mapping =
            AuthorizationMapping::from_config_map(&config_map, ConflictMode::Overwrite).expect("load");
        mapping
            .register(&[AccessPolicyEntry::administrator(ADMIN_ROLE)])
            .expect("register");
        mapping.write_config_map(&mut config_map).expect("write");

        let rendered: serde_json::Value =
            serde_json::from_str(&config_map.to_json(false).expect("serialize")).expect("json");
        let metadata = &rendered["metadata"];
        assert_eq!(metadata["resourceVersion"], "48213");
        assert_eq!(metadata["uid"], "5b3c0a1e-8f0d-4c1a-9f3e-2d7c1a0b9e44");
        assert_eq!(metadata["labels"]["app.kubernetes.io/managed-by"], "eksctl");
        assert_eq!(metadata["annotations"]["example.com/owner"], "platform");
        assert_eq!(rendered["kind"], "ConfigMap");
    }

    #[test]
    fn test_parse_rejects_other_kinds() {
        let json = r#"{"apiVersion":"v1","kind":"Secret","metadata":{"name":"aws-auth","namespace":"kube-system"}}"#;
        assert!(matches!(
            AwsAuthConfigMap::parse(json),
            Err(ResolutionError::Json { .. })
        ));
    }
}
