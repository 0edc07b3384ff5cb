//! ARN normalization
//!
//! Deployment identities are almost always short-lived `assumed-role` sessions.
//! Access must be granted to the role behind the session, since the session
//! name changes on every deployment, so normalization strips the session
//! component and keeps `{partition, account, role}`.

use log::{debug, trace};

use super::{CanonicalRoleReference, Classification, PrincipalArn};
use crate::aws::CallerIdentity;
use crate::errors::{ResolutionError, Result};

const ASSUMED_ROLE_PREFIX: &str = "assumed-role/";
const USER_PREFIX: &str = "user/";
const ROLE_PREFIX: &str = "role/";

/// Classify a raw principal ARN.
///
/// Fails with `MalformedArn` when the ARN doesn't have 6 `:`-delimited fields,
/// or when a role-bearing resource is missing its name segments.
pub fn classify(arn: &str) -> Result<Classification> {
    PrincipalArn::parse(arn)?.classify()
}

impl PrincipalArn {
    /// Classify this ARN by its resource part
    pub fn classify(&self) -> Result<Classification> {
        let raw = self.to_string();

        let classification = if let Some(rest) = self.resource.strip_prefix(ASSUMED_ROLE_PREFIX) {
            // assumed-role/<role>/<session>
            let mut parts = rest.splitn(2, '/');
            let role_name = parts.next().unwrap_or_default();
            let Some(session_name) = parts.next() else {
                return Err(ResolutionError::malformed_arn(
                    raw,
                    "assumed-role resource must have the form assumed-role/<role>/<session>",
                ));
            };
            if role_name.is_empty() || session_name.is_empty() {
                return Err(ResolutionError::malformed_arn(
                    raw,
                    "assumed-role resource has an empty role or session name",
                ));
            }
            Classification::AssumedRole {
                role_name: role_name.to_string(),
                session_name: session_name.to_string(),
            }
        } else if let Some(rest) = self.resource.strip_prefix(USER_PREFIX) {
            Classification::IamUser {
                user_name: last_path_segment(rest).to_string(),
            }
        } else if let Some(rest) = self.resource.strip_prefix(ROLE_PREFIX) {
            let role_name = last_path_segment(rest);
            if role_name.is_empty() {
                return Err(ResolutionError::malformed_arn(raw, "role name is empty"));
            }
            if role_name.len() != rest.len() {
                debug!("Dropping IAM path from role '{}' in {}", rest, raw);
            }
            Classification::IamRole {
                role_name: role_name.to_string(),
            }
        } else {
            Classification::Unrecognized { raw }
        };

        trace!("Classified {} as {}", self, classification);
        Ok(classification)
    }
}

/// `service-role/Admin` -> `Admin`
fn last_path_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Derive the durable role reference for a classified principal.
///
/// Only role-bearing principals canonicalize. Users and unrecognized
/// principals fail with `UnsupportedPrincipalKind`; there is no fallback to
/// granting the bare identity.
pub fn canonicalize(
    account_id: &str,
    classification: &Classification,
) -> Result<CanonicalRoleReference> {
    if let Some(role_name) = classification.role_name() {
        return Ok(CanonicalRoleReference::new(account_id, role_name));
    }

    let principal = match classification {
        Classification::IamUser { user_name } => format!("user/{user_name}"),
        Classification::Unrecognized { raw } => raw.clone(),
        other => other.to_string(),
    };
    Err(ResolutionError::unsupported_principal(
        classification.kind(),
        principal,
    ))
}

/// Resolve a caller identity to the role it should be granted as.
///
/// Parses and classifies the ARN, checks that it belongs to the caller's
/// account and canonicalizes it in the ARN's own partition.
pub fn normalize(identity: &CallerIdentity) -> Result<CanonicalRoleReference> {
    let arn = PrincipalArn::parse(&identity.arn)?;

    if !arn.account.is_empty() && arn.account != identity.account_id {
        return Err(ResolutionError::AccountMismatch {
            arn_account: arn.account,
            caller_account: identity.account_id.clone(),
        });
    }

    let classification = arn.classify()?;
    let reference = match canonicalize(&identity.account_id, &classification) {
        Ok(reference) => reference,
        // Report the full ARN rather than the resource fragment
        Err(ResolutionError::UnsupportedPrincipalKind { kind, .. }) => {
            return Err(ResolutionError::unsupported_principal(kind, identity.arn.as_str()))
        }
        Err(e) => return Err(e),
    };

    debug!(
        "Normalized {} ({}) to role {} in account {}",
        identity.arn,
        classification.kind(),
        reference.role_name,
        reference.account_id
    );
    Ok(reference.in_partition(arn.partition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ACCOUNT: &str = "123456789012";

    #[test]
    fn test_classify_assumed_role() {
        let classification =
            classify("arn:aws:sts::123456789012:assumed-role/Admin/session1").expect("should parse");
        assert_eq!(
            classification,
            Classification::AssumedRole {
                role_name: "Admin".to_string(),
                session_name: "session1".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_iam_user_and_role() {
        assert_eq!(
            classify("arn:aws:iam::123456789012:user/alice").expect("should parse"),
            Classification::IamUser {
                user_name: "alice".to_string()
            }
        );
        assert_eq!(
            classify("arn:aws:iam::123456789012:role/Admin").expect("should parse"),
            Classification::IamRole {
                role_name: "Admin".to_string()
            }
        );
    }

    #[test]
    fn test_classify_role_with_path_drops_path() {
        assert_eq!(
            classify("arn:aws:iam::123456789012:role/service-role/Deployer").expect("should parse"),
            Classification::IamRole {
                role_name: "Deployer".to_string()
            }
        );
    }

    #[test]
    fn test_classify_root_is_unrecognized() {
        let raw = "arn:aws:iam::123456789012:root";
        assert_eq!(
            classify(raw).expect("should parse"),
            Classification::Unrecognized {
                raw: raw.to_string()
            }
        );
    }

    #[test]
    fn test_classify_federated_user_is_unrecognized() {
        let raw = "arn:aws:sts::123456789012:federated-user/bob";
        assert!(matches!(
            classify(raw).expect("should parse"),
            Classification::Unrecognized { .. }
        ));
    }

    #[test]
    fn test_classify_malformed() {
        for raw in [
            "not-an-arn",
            "arn:aws:sts::123456789012",
            "arn:aws:sts::123456789012:assumed-role/Admin",
            "arn:aws:sts::123456789012:assumed-role//session",
            "arn:aws:sts::123456789012:assumed-role/Admin/",
            "arn:aws:iam::123456789012:role/",
        ] {
            let err = classify(raw).expect_err(raw);
            assert!(
                matches!(err, ResolutionError::MalformedArn { ref arn, .. } if arn == raw),
                "unexpected error for {raw}: {err}"
            );
        }
    }

    #[test]
    fn test_canonicalize_rejects_user_and_unrecognized() {
        let user = Classification::IamUser {
            user_name: "alice".to_string(),
        };
        let root = Classification::Unrecognized {
            raw: "arn:aws:iam::123456789012:root".to_string(),
        };

        assert!(matches!(
            canonicalize(ACCOUNT, &user),
            Err(ResolutionError::UnsupportedPrincipalKind { .. })
        ));
        assert!(matches!(
            canonicalize(ACCOUNT, &root),
            Err(ResolutionError::UnsupportedPrincipalKind { .. })
        ));
    }

    #[test]
    fn test_normalize_keeps_partition() {
        let identity = CallerIdentity::new(
            "arn:aws-cn:sts::680431765560:assumed-role/Deployer/ci-run".to_string(),
            "680431765560".to_string(),
        );
        let reference = normalize(&identity).expect("should normalize");

        assert_eq!(reference.partition, "aws-cn");
        assert_eq!(reference.account_id, "680431765560");
        assert_eq!(reference.role_name, "Deployer");
    }

    #[test]
    fn test_normalize_rejects_account_mismatch() {
        let identity = CallerIdentity::new(
            "arn:aws:sts::111111111111:assumed-role/Admin/s".to_string(),
            ACCOUNT.to_string(),
        );
        assert!(matches!(
            normalize(&identity),
            Err(ResolutionError::AccountMismatch { .. })
        ));
    }

    #[test]
    fn test_normalize_user_reports_full_arn() {
        let identity = CallerIdentity::new(
            "arn:aws:iam::123456789012:user/alice".to_string(),
            ACCOUNT.to_string(),
        );
        match normalize(&identity) {
            Err(ResolutionError::UnsupportedPrincipalKind { kind, arn }) => {
                assert_eq!(kind, "iam-user");
                assert_eq!(arn, "arn:aws:iam::123456789012:user/alice");
            }
            other => panic!("expected UnsupportedPrincipalKind, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_canonical_reference_ignores_session(
            role in "[A-Za-z0-9+=,.@_-]{1,64}",
            session in "[A-Za-z0-9+=,.@_-]{2,64}",
            account in "[0-9]{12}",
        ) {
            let raw = format!("arn:aws:sts::{account}:assumed-role/{role}/{session}");
            let classification = classify(&raw).expect("should classify");
            prop_assert_eq!(
                &classification,
                &Classification::AssumedRole { role_name: role.clone(), session_name: session }
            );
            let reference = canonicalize(&account, &classification).expect("should canonicalize");
            prop_assert_eq!(reference, CanonicalRoleReference::new(account, role));
        }

        #[test]
        fn prop_role_and_session_forms_canonicalize_identically(
            role in "[A-Za-z0-9+=,.@_-]{1,64}",
            session in "[A-Za-z0-9+=,.@_-]{2,64}",
            account in "[0-9]{12}",
        ) {
            let session_arn = format!("arn:aws:sts::{account}:assumed-role/{role}/{session}");
            let role_arn = format!("arn:aws:iam::{account}:role/{role}");

            let from_session = canonicalize(&account, &classify(&session_arn).expect("session")).expect("session ref");
            let from_role = canonicalize(&account, &classify(&role_arn).expect("role")).expect("role ref");
            prop_assert_eq!(from_session, from_role);
        }

        #[test]
        fn prop_users_never_canonicalize(
            user in "[A-Za-z0-9+=,.@_-]{1,64}",
            account in "[0-9]{12}",
        ) {
            let raw = format!("arn:aws:iam::{account}:user/{user}");
            let result = canonicalize(&account, &classify(&raw).expect("should classify"));
            let is_unsupported = matches!(result, Err(ResolutionError::UnsupportedPrincipalKind { .. }));
            prop_assert!(is_unsupported);
        }
    }
}
