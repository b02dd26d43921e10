//! Consumer definitions, protected records, and their read projections.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::ProtectionError;

/// OAuth protocol version spoken by a consumer's provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OAuthVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "2.0")]
    V2_0,
}

impl OAuthVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthVersion::V1_0 => "1.0",
            OAuthVersion::V2_0 => "2.0",
        }
    }

    /// Parse the exact wire value; anything else is unsupported
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1.0" => Some(OAuthVersion::V1_0),
            "2.0" => Some(OAuthVersion::V2_0),
            _ => None,
        }
    }
}

impl fmt::Display for OAuthVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input fields a consumer definition may carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsumerField {
    ComponentId,
    AuthUrl,
    TokenUrl,
    RequestTokenUrl,
    AppKey,
    AppSecret,
    FriendlyName,
    OAuthVersion,
}

impl ConsumerField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerField::ComponentId => "component_id",
            ConsumerField::AuthUrl => "auth_url",
            ConsumerField::TokenUrl => "token_url",
            ConsumerField::RequestTokenUrl => "request_token_url",
            ConsumerField::AppKey => "app_key",
            ConsumerField::AppSecret => "app_secret",
            ConsumerField::FriendlyName => "friendly_name",
            ConsumerField::OAuthVersion => "oauth_version",
        }
    }

    /// Whether the value must parse as an absolute URL
    pub fn is_url(&self) -> bool {
        matches!(
            self,
            ConsumerField::AuthUrl | ConsumerField::TokenUrl | ConsumerField::RequestTokenUrl
        )
    }
}

impl fmt::Display for ConsumerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plaintext consumer secret.
///
/// Only lives in memory between validation and the protection stages.
/// Not serializable, redacted in debug output, and wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AppSecret(String);

impl AppSecret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AppSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppSecret([redacted])")
    }
}

/// A consumer definition that passed validation.
///
/// Carries exactly the fields of the requirement matrix.
#[derive(Clone, Debug)]
pub struct ValidatedDefinition {
    pub component_id: String,
    pub friendly_name: String,
    pub app_key: String,
    pub app_secret: AppSecret,
    pub oauth_version: OAuthVersion,
    pub auth_url: String,
    pub token_url: String,
    pub request_token_url: Option<String>,
}

/// Independent protection layers applied to a consumer secret
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtectionLayer {
    /// Ciphertext from the per-integration encryption authority
    Remote,
    /// Ciphertext under the process-wide symmetric key
    Local,
}

impl fmt::Display for ProtectionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtectionLayer::Remote => f.write_str("remote"),
            ProtectionLayer::Local => f.write_str("local"),
        }
    }
}

/// Ciphertexts collected from the protector chain, keyed by layer
#[derive(Clone, Debug, Default)]
pub struct ProtectedSecret {
    layers: std::collections::BTreeMap<ProtectionLayer, Vec<u8>>,
}

impl ProtectedSecret {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layer: ProtectionLayer, ciphertext: Vec<u8>) {
        self.layers.insert(layer, ciphertext);
    }

    fn take(&mut self, layer: ProtectionLayer) -> Result<Vec<u8>, ProtectionError> {
        self.layers
            .remove(&layer)
            .filter(|ciphertext| !ciphertext.is_empty())
            .ok_or(ProtectionError::IncompleteProtection(layer))
    }
}

/// Persisted consumer, owned by the registry.
///
/// Never holds a plaintext secret; both ciphertexts are always present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectedConsumerRecord {
    pub component_id: String,
    pub friendly_name: String,
    pub app_key: String,
    pub oauth_version: OAuthVersion,
    pub auth_url: String,
    pub token_url: String,
    pub request_token_url: Option<String>,
    pub secret_remote_cipher: Vec<u8>,
    pub secret_local_cipher: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl ProtectedConsumerRecord {
    /// Replace the plaintext secret of `definition` with its two ciphertexts.
    ///
    /// Fails if either layer is missing or empty.
    pub fn seal(
        definition: ValidatedDefinition,
        mut protected: ProtectedSecret,
    ) -> Result<Self, ProtectionError> {
        let secret_remote_cipher = protected.take(ProtectionLayer::Remote)?;
        let secret_local_cipher = protected.take(ProtectionLayer::Local)?;

        let ValidatedDefinition {
            component_id,
            friendly_name,
            app_key,
            oauth_version,
            auth_url,
            token_url,
            request_token_url,
            ..
        } = definition;

        Ok(Self {
            component_id,
            friendly_name,
            app_key,
            oauth_version,
            auth_url,
            token_url,
            request_token_url,
            secret_remote_cipher,
            secret_local_cipher,
            created_at: Utc::now(),
        })
    }

    pub fn summary(&self) -> ConsumerSummary {
        ConsumerSummary {
            component_id: self.component_id.clone(),
            friendly_name: self.friendly_name.clone(),
            app_key: self.app_key.clone(),
            oauth_version: self.oauth_version,
        }
    }

    pub fn detail(&self) -> ConsumerDetail {
        ConsumerDetail {
            component_id: self.component_id.clone(),
            friendly_name: self.friendly_name.clone(),
            app_key: self.app_key.clone(),
            oauth_version: self.oauth_version,
            auth_url: self.auth_url.clone(),
            token_url: self.token_url.clone(),
            request_token_url: self.request_token_url.clone(),
            secret_remote_cipher: STANDARD.encode(&self.secret_remote_cipher),
            secret_local_cipher: STANDARD.encode(&self.secret_local_cipher),
            created_at: self.created_at,
        }
    }
}

/// List projection: identifying and descriptive fields only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSummary {
    pub component_id: String,
    pub friendly_name: String,
    pub app_key: String,
    pub oauth_version: OAuthVersion,
}

/// Single-record projection, ciphertexts base64 encoded
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerDetail {
    pub component_id: String,
    pub friendly_name: String,
    pub app_key: String,
    pub oauth_version: OAuthVersion,
    pub auth_url: String,
    pub token_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_token_url: Option<String>,
    pub secret_remote_cipher: String,
    pub secret_local_cipher: String,
    pub created_at: DateTime<Utc>,
}

/// Acknowledgment of a created consumer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub status: String,
    pub component_id: String,
}

impl RegistrationReceipt {
    pub fn created(component_id: String) -> Self {
        Self {
            status: "created".to_string(),
            component_id,
        }
    }
}
