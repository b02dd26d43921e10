//! Environment-based configuration types for the consumer registry runtime.

use anyhow::Result;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt;
use std::time::Duration;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::ConfigError;

/// Scope a credential must carry to register consumers
pub const DEFAULT_REGISTRATION_SCOPE: &str = "oauth:manage";

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

/// Certificate bundles for HTTPS connections
#[derive(Clone)]
pub struct CertificateBundles(Vec<String>);

/// Bound applied to every call to a remote authority
#[derive(Clone)]
pub struct HttpClientTimeout(Duration);

/// Base URL of a remote authority
#[derive(Clone, Debug)]
pub struct AuthorityUrl(Url);

/// Process-wide AES-256 key for the local protection layer
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalEncryptionKey([u8; 32]);

/// Scope required by the registration operation
#[derive(Clone)]
pub struct RegistrationScope(String);

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub certificate_bundles: CertificateBundles,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    pub identity_authority_url: AuthorityUrl,
    pub encryption_authority_url: AuthorityUrl,
    pub local_encryption_key: LocalEncryptionKey,
    pub registration_scope: RegistrationScope,
    pub storage_backend: String,
    pub database_url: Option<String>,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let certificate_bundles: CertificateBundles =
            optional_env("CERTIFICATE_BUNDLES").try_into()?;
        let default_user_agent = format!("consumers/{}", version()?);
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let identity_authority_url = AuthorityUrl::parse(
            "IDENTITY_AUTHORITY_URL",
            &require_env("IDENTITY_AUTHORITY_URL")?,
        )?;
        let encryption_authority_url = AuthorityUrl::parse(
            "ENCRYPTION_AUTHORITY_URL",
            &require_env("ENCRYPTION_AUTHORITY_URL")?,
        )?;
        let local_encryption_key: LocalEncryptionKey =
            optional_env("LOCAL_ENCRYPTION_KEY").try_into()?;
        let registration_scope: RegistrationScope =
            default_env("REGISTRATION_SCOPE", DEFAULT_REGISTRATION_SCOPE).try_into()?;
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = optional_env("DATABASE_URL");
        let user_agent = default_env("USER_AGENT", &default_user_agent);

        Ok(Self {
            version: version()?,
            http_port,
            certificate_bundles,
            user_agent,
            http_client_timeout,
            identity_authority_url,
            encryption_authority_url,
            local_encryption_key,
            registration_scope,
            storage_backend,
            database_url,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<Option<String>> for CertificateBundles {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.unwrap_or_default();
        Ok(Self(
            value
                .split(';')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect::<Vec<String>>(),
        ))
    }
}

impl TryFrom<String> for CertificateBundles {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(Some(value))
    }
}

impl AsRef<Vec<String>> for CertificateBundles {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }

        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value.clone(), e.to_string()))?;
        if duration.is_zero() {
            return Err(ConfigError::DurationParsingFailed(
                value,
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self(duration))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl AuthorityUrl {
    /// Parse the URL held in environment variable `name`
    pub fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        let url =
            Url::parse(value).map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(
                name.to_string(),
                format!("'{}' is not an http(s) URL", value),
            ));
        }
        Ok(Self(url))
    }
}

impl AsRef<Url> for AuthorityUrl {
    fn as_ref(&self) -> &Url {
        &self.0
    }
}

impl LocalEncryptionKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<Option<String>> for LocalEncryptionKey {
    type Error = ConfigError;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
            ConfigError::LocalEncryptionUnavailable("LOCAL_ENCRYPTION_KEY must be set".to_string())
        })?;

        let mut decoded = STANDARD.decode(value.trim()).map_err(|e| {
            ConfigError::LocalEncryptionUnavailable(format!(
                "LOCAL_ENCRYPTION_KEY is not valid base64: {}",
                e
            ))
        })?;

        let key: Result<[u8; 32], _> = decoded.as_slice().try_into();
        let length = decoded.len();
        decoded.zeroize();

        key.map(Self).map_err(|_| {
            ConfigError::LocalEncryptionUnavailable(format!(
                "LOCAL_ENCRYPTION_KEY must decode to 32 bytes, got {}",
                length
            ))
        })
    }
}

impl AsRef<[u8; 32]> for LocalEncryptionKey {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for LocalEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LocalEncryptionKey([redacted])")
    }
}

impl TryFrom<String> for RegistrationScope {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_string();
        if value.is_empty() || value.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidScope(value));
        }
        Ok(Self(value))
    }
}

impl AsRef<String> for RegistrationScope {
    fn as_ref(&self) -> &String {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_encryption_key() {
        let encoded = STANDARD.encode([3u8; 32]);
        let key = LocalEncryptionKey::try_from(Some(encoded)).unwrap();
        assert_eq!(key.as_ref(), &[3u8; 32]);
        assert_eq!(format!("{:?}", key), "LocalEncryptionKey([redacted])");

        let missing = LocalEncryptionKey::try_from(None);
        assert!(matches!(
            missing,
            Err(ConfigError::LocalEncryptionUnavailable(_))
        ));

        let empty = LocalEncryptionKey::try_from(Some("  ".to_string()));
        assert!(matches!(empty, Err(ConfigError::LocalEncryptionUnavailable(_))));

        let not_base64 = LocalEncryptionKey::try_from(Some("not base64!".to_string()));
        assert!(matches!(
            not_base64,
            Err(ConfigError::LocalEncryptionUnavailable(_))
        ));

        let short = LocalEncryptionKey::try_from(Some(STANDARD.encode([3u8; 16])));
        match short {
            Err(ConfigError::LocalEncryptionUnavailable(message)) => {
                assert!(message.contains("got 16"));
            }
            _ => panic!("expected a short key to be rejected"),
        }
    }

    #[test]
    fn test_http_client_timeout() {
        let timeout = HttpClientTimeout::try_from("10s".to_string()).unwrap();
        assert_eq!(timeout.as_ref(), &Duration::from_secs(10));

        let timeout = HttpClientTimeout::try_from("2m".to_string()).unwrap();
        assert_eq!(timeout.as_ref(), &Duration::from_secs(120));

        let timeout = HttpClientTimeout::try_from("".to_string()).unwrap();
        assert_eq!(timeout.as_ref(), &Duration::from_secs(10));

        assert!(HttpClientTimeout::try_from("0s".to_string()).is_err());
        assert!(HttpClientTimeout::try_from("soon".to_string()).is_err());
    }

    #[test]
    fn test_authority_url() {
        let url = AuthorityUrl::parse("X", "https://connection.example.com/manage/tokens/verify")
            .unwrap();
        assert_eq!(url.as_ref().host_str(), Some("connection.example.com"));

        assert!(AuthorityUrl::parse("X", "ftp://example.com").is_err());
        assert!(AuthorityUrl::parse("X", "mailto:ops@example.com").is_err());
        assert!(AuthorityUrl::parse("X", "example.com").is_err());
    }

    #[test]
    fn test_registration_scope() {
        let scope = RegistrationScope::try_from("oauth:manage".to_string()).unwrap();
        assert_eq!(scope.as_ref(), "oauth:manage");

        assert!(RegistrationScope::try_from("".to_string()).is_err());
        assert!(RegistrationScope::try_from("oauth manage".to_string()).is_err());
    }
}
