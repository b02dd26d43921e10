//! Standardized error types following the `error-consumers-<domain>-<number>` format.

use thiserror::Error;

use crate::consumers::types::{ConsumerField, ProtectionLayer};

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-consumers-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-consumers-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-consumers-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-consumers-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when an authority URL cannot be parsed
    #[error("error-consumers-config-5 Invalid URL for {0}: {1}")]
    InvalidUrl(String, String),

    /// The process-wide local encryption key is absent or malformed
    #[error("error-consumers-config-6 Local encryption unavailable: {0}")]
    LocalEncryptionUnavailable(String),

    /// Error when a scope name is empty or contains whitespace
    #[error("error-consumers-config-7 Invalid scope: {0}")]
    InvalidScope(String),
}

/// Identity gate errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No credential was presented, no call was made
    #[error("error-consumers-identity-1 Missing credential: {0}")]
    MissingCredential(String),

    /// The identity authority could not be reached or answered unusably
    #[error("error-consumers-identity-2 Identity authority unreachable: {0}")]
    IdentityAuthorityUnreachable(String),

    /// The credential is valid but does not carry the required scope
    #[error("error-consumers-identity-3 Insufficient scope: '{0}' is required")]
    InsufficientScope(String),

    /// The identity authority refused the credential itself
    #[error("error-consumers-identity-4 Credential rejected by identity authority (HTTP {0})")]
    CredentialRejected(u16),
}

/// Consumer definition validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Error when the body is not a JSON object
    #[error("error-consumers-validation-1 Consumer definition must be a JSON object")]
    NotAnObject,

    /// oauth_version absent or not one of the supported versions
    #[error("error-consumers-validation-2 'oauth_version' must be either '1.0' or '2.0', got {0}")]
    InvalidVersion(String),

    /// A field required for this version is absent or empty
    #[error("error-consumers-validation-3 Missing parameter '{0}'")]
    MissingField(ConsumerField),

    /// A field is present but unusable
    #[error("error-consumers-validation-4 Invalid parameter '{0}': {1}")]
    InvalidField(ConsumerField, String),
}

/// Secret protection errors
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// The remote encryption authority failed or rejected the request
    #[error("error-consumers-protection-1 Component based encryption of the app secret failed: {0}")]
    RemoteEncryptionFailed(String),

    /// Local AEAD encryption failed
    #[error("error-consumers-protection-2 Local encryption of the app secret failed: {0}")]
    LocalEncryptionFailed(String),

    /// Local ciphertext did not authenticate
    #[error("error-consumers-protection-3 Local ciphertext rejected")]
    LocalDecryptionFailed,

    /// The protector chain did not produce a required layer
    #[error("error-consumers-protection-4 Secret protection incomplete, missing {0} layer")]
    IncompleteProtection(ProtectionLayer),
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-consumers-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when database operation fails
    #[error("error-consumers-storage-2 Database error: {0}")]
    DatabaseError(String),

    /// Error when stored data cannot be read back
    #[error("error-consumers-storage-3 Invalid data: {0}")]
    InvalidData(String),

    /// A consumer with this component id already exists
    #[error("error-consumers-storage-4 Consumer '{0}' already exists")]
    Conflict(String),
}

/// Who can correct a failed request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Correctable by changing the request
    Client,
    /// Correctable by retrying later or fixing a dependency
    Dependency,
    /// A defect or misconfiguration of this service
    Internal,
}

/// Registration pipeline stage that produced an error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationStage {
    Authorize,
    Validate,
    Protect(ProtectionLayer),
    Persist,
}

impl std::fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStage::Authorize => write!(f, "authorize"),
            RegistrationStage::Validate => write!(f, "validate"),
            RegistrationStage::Protect(layer) => write!(f, "protect_{}", layer),
            RegistrationStage::Persist => write!(f, "persist"),
        }
    }
}

/// Terminal outcome of a failed registration
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Authorization(#[from] IdentityError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{source}")]
    Protection {
        layer: ProtectionLayer,
        #[source]
        source: ProtectionError,
    },

    #[error(transparent)]
    Persistence(#[from] StorageError),
}

impl RegistrationError {
    /// Stage of the pipeline the request failed in
    pub fn stage(&self) -> RegistrationStage {
        match self {
            RegistrationError::Authorization(_) => RegistrationStage::Authorize,
            RegistrationError::Validation(_) => RegistrationStage::Validate,
            RegistrationError::Protection { layer, .. } => RegistrationStage::Protect(*layer),
            RegistrationError::Persistence(_) => RegistrationStage::Persist,
        }
    }

    pub fn fault(&self) -> Fault {
        match self {
            RegistrationError::Authorization(IdentityError::IdentityAuthorityUnreachable(_)) => {
                Fault::Dependency
            }
            RegistrationError::Authorization(_) | RegistrationError::Validation(_) => Fault::Client,
            RegistrationError::Protection {
                source: ProtectionError::RemoteEncryptionFailed(_),
                ..
            } => Fault::Dependency,
            RegistrationError::Protection { .. } => Fault::Internal,
            RegistrationError::Persistence(StorageError::Conflict(_)) => Fault::Client,
            RegistrationError::Persistence(StorageError::ConnectionFailed(_)) => Fault::Dependency,
            RegistrationError::Persistence(_) => Fault::Internal,
        }
    }
}

/// Read path errors
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Authorization(#[from] IdentityError),

    /// No consumer is registered under this component id
    #[error("error-consumers-lookup-1 Component '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        let missing: RegistrationError = IdentityError::MissingCredential("Authorization".into()).into();
        assert_eq!(missing.fault(), Fault::Client);
        assert_eq!(missing.stage(), RegistrationStage::Authorize);

        let unreachable: RegistrationError =
            IdentityError::IdentityAuthorityUnreachable("timeout".into()).into();
        assert_eq!(unreachable.fault(), Fault::Dependency);

        let conflict: RegistrationError = StorageError::Conflict("slack".into()).into();
        assert_eq!(conflict.fault(), Fault::Client);
        assert_eq!(conflict.stage(), RegistrationStage::Persist);

        let remote = RegistrationError::Protection {
            layer: ProtectionLayer::Remote,
            source: ProtectionError::RemoteEncryptionFailed("HTTP 500".into()),
        };
        assert_eq!(remote.fault(), Fault::Dependency);
        assert_eq!(remote.stage().to_string(), "protect_remote");

        let incomplete = RegistrationError::Protection {
            layer: ProtectionLayer::Local,
            source: ProtectionError::IncompleteProtection(ProtectionLayer::Local),
        };
        assert_eq!(incomplete.fault(), Fault::Internal);
    }

    #[test]
    fn test_error_codes_in_messages() {
        let err = ValidationError::MissingField(ConsumerField::RequestTokenUrl);
        assert_eq!(
            err.to_string(),
            "error-consumers-validation-3 Missing parameter 'request_token_url'"
        );

        let err = StorageError::Conflict("slack".to_string());
        assert!(err.to_string().contains("Consumer 'slack' already exists"));
    }
}
