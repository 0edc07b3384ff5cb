//! Error handling module

use std::collections::BTreeSet;
use thiserror::Error;

/// Result type alias for operations that can fail with `ResolutionError`
pub type Result<T> = std::result::Result<T, ResolutionError>;

/// Error type for principal resolution and access registration.
///
/// Every variant is fatal to the deployment: none of these conditions is
/// transient, so callers propagate them instead of retrying.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The ambient caller identity could not be obtained
    #[error("Failed to fetch caller identity: {message}")]
    IdentityFetchFailed {
        /// Diagnostic describing what went wrong
        message: String,
        /// Optional underlying error (SDK, credentials, transport)
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The ARN does not have the structure of an IAM/STS principal ARN
    #[error("Malformed ARN '{arn}': {reason}")]
    MalformedArn {
        /// The offending raw string
        arn: String,
        /// Which structural check failed
        reason: String,
    },

    /// The principal cannot be traced back to a durable IAM role
    #[error("Unsupported principal kind '{kind}' for '{arn}': only IAM roles and assumed-role sessions can be granted cluster access")]
    UnsupportedPrincipalKind {
        /// Classification of the principal (e.g. "iam-user", "unrecognized")
        kind: String,
        /// The raw ARN that was classified
        arn: String,
    },

    /// The ARN names an account other than the one the caller authenticated in
    #[error("Principal ARN belongs to account '{arn_account}' but the caller identity reports account '{caller_account}'")]
    AccountMismatch {
        /// Account parsed out of the ARN
        arn_account: String,
        /// Account reported alongside the ARN
        caller_account: String,
    },

    /// A mapping entry already exists for the principal with different groups
    #[error("Principal '{principal_arn}' is already mapped to groups {existing:?}, refusing to remap it to {requested:?}")]
    RegistrationConflict {
        /// Key of the conflicting entry
        principal_arn: String,
        /// Groups currently registered
        existing: BTreeSet<String>,
        /// Groups the new entry asked for
        requested: BTreeSet<String>,
    },

    /// An entry cannot be written into the authorization mapping
    #[error("Invalid access policy entry: {message}")]
    InvalidEntry {
        /// Detailed error message
        message: String,
    },

    /// A deployment context value failed validation
    #[error("Invalid deployment context field '{field}': {message}")]
    InvalidContext {
        /// Name of the offending field
        field: String,
        /// Detailed validation error message
        message: String,
    },

    /// JSON parsing and serialization errors with context
    #[error("JSON error in {context}: {source}")]
    Json {
        /// Document being processed (e.g., "aws-auth ConfigMap")
        context: String,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// YAML parsing errors with context
    #[error("YAML error in {context}: {source}")]
    Yaml {
        /// Document being processed (e.g., "aws-auth mapRoles")
        context: String,
        /// The underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// File system errors while reading input documents
    #[error("Failed to read '{path}': {source}")]
    FileSystem {
        /// Path that could not be read
        path: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ResolutionError {
    /// Create an identity fetch error without an underlying cause
    pub(crate) fn identity_fetch(message: impl Into<String>) -> Self {
        Self::IdentityFetchFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an identity fetch error with source
    pub(crate) fn identity_fetch_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::IdentityFetchFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a malformed ARN error
    pub(crate) fn malformed_arn(arn: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedArn {
            arn: arn.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported principal kind error
    pub(crate) fn unsupported_principal(kind: impl Into<String>, arn: impl Into<String>) -> Self {
        Self::UnsupportedPrincipalKind {
            kind: kind.into(),
            arn: arn.into(),
        }
    }

    /// Create an invalid entry error
    pub(crate) fn invalid_entry(message: impl Into<String>) -> Self {
        Self::InvalidEntry {
            message: message.into(),
        }
    }

    /// Create an invalid context error
    pub(crate) fn invalid_context(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidContext {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a JSON error with the document it occurred in
    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a YAML error with the document it occurred in
    pub(crate) fn yaml(context: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            context: context.into(),
            source,
        }
    }

    /// Create a file system error for the path being read
    pub(crate) fn file_system(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_arn_includes_raw_string() {
        let error = ResolutionError::malformed_arn("not-an-arn", "expected 6 fields");

        assert!(matches!(error, ResolutionError::MalformedArn { .. }));
        assert!(error.to_string().contains("not-an-arn"));
        assert!(error.to_string().contains("expected 6 fields"));
    }

    #[test]
    fn test_identity_fetch_error_keeps_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no credentials");
        let error = ResolutionError::identity_fetch_with_source("STS call failed", io_error);

        assert!(error.to_string().contains("STS call failed"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
