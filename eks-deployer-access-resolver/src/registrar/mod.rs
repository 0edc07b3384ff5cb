//! Access policy registration into the cluster's authorization mapping.
//!
//! The mapping is keyed by principal ARN and only ever grows. A batch of
//! entries is validated in full before anything is written, so either every
//! entry of a batch lands or none does.

/// aws-auth ConfigMap rendering
pub mod config_map;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{ResolutionError, Result};
use crate::principal::forms::PrincipalForms;

/// Kubernetes group with full control over the cluster
pub const ADMINISTRATOR_GROUP: &str = "system:masters";

/// One principal registered in the authorization mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyEntry {
    /// Principal ARN, also the mapping key
    pub principal_arn: String,
    /// Kubernetes user name the principal authenticates as
    pub username: String,
    /// Kubernetes groups granted to the principal
    pub groups: BTreeSet<String>,
}

impl AccessPolicyEntry {
    /// Entry whose username is the principal ARN itself
    pub fn new<I, S>(principal_arn: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let principal_arn = principal_arn.into();
        Self {
            username: principal_arn.clone(),
            principal_arn,
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Administrator entry for a principal
    pub fn administrator(principal_arn: impl Into<String>) -> Self {
        Self::new(principal_arn, [ADMINISTRATOR_GROUP])
    }

    fn validate(&self) -> Result<()> {
        if self.principal_arn.trim().is_empty() {
            return Err(ResolutionError::invalid_entry("principal ARN is empty"));
        }
        if self.username.trim().is_empty() {
            return Err(ResolutionError::invalid_entry(format!(
                "username for '{}' is empty",
                self.principal_arn
            )));
        }
        if self.groups.is_empty() {
            return Err(ResolutionError::invalid_entry(format!(
                "'{}' has no groups",
                self.principal_arn
            )));
        }
        Ok(())
    }
}

/// Entries granting every distinct form of a role the given groups
pub fn entries_for<S: AsRef<str>>(forms: &PrincipalForms, groups: &[S]) -> Vec<AccessPolicyEntry> {
    forms
        .distinct()
        .into_iter()
        .map(|arn| AccessPolicyEntry::new(arn, groups.iter().map(|group| group.as_ref())))
        .collect()
}

/// `system:masters` entries for every distinct form of a role
pub fn administrator_entries(forms: &PrincipalForms) -> Vec<AccessPolicyEntry> {
    entries_for(forms, &[ADMINISTRATOR_GROUP])
}

/// What to do when a principal is re-registered with different groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictMode {
    /// Last write wins
    #[default]
    Overwrite,
    /// Fail the whole batch with `RegistrationConflict`
    Reject,
}

/// Counts of what a registration did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationOutcome {
    /// New keys added
    pub inserted: usize,
    /// Keys already present with identical entries
    pub unchanged: usize,
    /// Keys whose entry was replaced
    pub overwritten: usize,
}

/// The cluster-side table of principal ARN -> username and groups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationMapping {
    entries: BTreeMap<String, AccessPolicyEntry>,
    conflict_mode: ConflictMode,
}

impl AuthorizationMapping {
    /// Empty mapping with the default conflict mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty mapping with the given conflict mode
    pub fn with_conflict_mode(conflict_mode: ConflictMode) -> Self {
        Self {
            entries: BTreeMap::new(),
            conflict_mode,
        }
    }

    /// Change the conflict mode for subsequent registrations
    pub fn set_conflict_mode(&mut self, conflict_mode: ConflictMode) {
        self.conflict_mode = conflict_mode;
    }

    /// Merge entries into the mapping, all or nothing.
    ///
    /// Re-registering an identical entry is a no-op. Re-registering a key with
    /// different groups overwrites it, or fails under [`ConflictMode::Reject`];
    /// a changed username alone is always overwritten.
    pub fn register(&mut self, entries: &[AccessPolicyEntry]) -> Result<RegistrationOutcome> {
        self.register_with(entries, self.conflict_mode)
    }

    /// [`register`](Self::register) with an explicit conflict mode for this batch
    pub fn register_with(
        &mut self,
        entries: &[AccessPolicyEntry],
        conflict_mode: ConflictMode,
    ) -> Result<RegistrationOutcome> {
        // Validate the whole batch first; the mapping is untouched on error
        let mut planned: BTreeMap<&str, &AccessPolicyEntry> = BTreeMap::new();
        for entry in entries {
            entry.validate()?;

            let key = entry.principal_arn.as_str();
            let current = planned
                .get(key)
                .copied()
                .or_else(|| self.entries.get(key));
            if let Some(existing) = current.filter(|existing| existing.groups != entry.groups) {
                if conflict_mode == ConflictMode::Reject {
                    return Err(ResolutionError::RegistrationConflict {
                        principal_arn: entry.principal_arn.clone(),
                        existing: existing.groups.clone(),
                        requested: entry.groups.clone(),
                    });
                }
                warn!(
                    "Overwriting mapping for {}: groups {:?} -> {:?}",
                    key, existing.groups, entry.groups
                );
            }
            planned.insert(key, entry);
        }

        let mut outcome = RegistrationOutcome::default();
        for (key, entry) in planned {
            match self.entries.get(key) {
                None => outcome.inserted += 1,
                Some(existing) if existing == entry => {
                    outcome.unchanged += 1;
                    continue;
                }
                Some(_) => outcome.overwritten += 1,
            }
            debug!("Mapping {} to groups {:?}", key, entry.groups);
            self.entries.insert(key.to_string(), entry.clone());
        }

        info!(
            "Registered access policy entries: {} inserted, {} unchanged, {} overwritten",
            outcome.inserted, outcome.unchanged, outcome.overwritten
        );
        Ok(outcome)
    }

    /// Load entries as they were found in an existing mapping.
    ///
    /// Nothing is validated: the authenticator already accepted these records.
    /// A repeated key keeps its last record, as it does in the authenticator.
    pub(crate) fn restore(&mut self, entries: impl IntoIterator<Item = AccessPolicyEntry>) {
        for entry in entries {
            let key = entry.principal_arn.clone();
            if self.entries.insert(key, entry).is_some() {
                debug!("Existing mapping repeats a record, keeping the last one");
            }
        }
    }

    /// Entry for a principal
    pub fn get(&self, principal_arn: &str) -> Option<&AccessPolicyEntry> {
        self.entries.get(principal_arn)
    }

    /// Entries ordered by principal ARN
    pub fn entries(&self) -> impl Iterator<Item = &AccessPolicyEntry> {
        self.entries.values()
    }

    /// Number of mapped principals
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no principals
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
