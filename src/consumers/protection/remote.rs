//! Encryption by the per-integration encryption authority.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::{ProtectionContext, SecretProtector};
use crate::consumers::types::{AppSecret, ProtectionLayer};
use crate::errors::ProtectionError;

/// Header carrying the caller's tenant identity
pub const TENANT_TOKEN_HEADER: &str = "X-Tenant-Token";

/// Calls `POST <base>/<component_id>/encrypt` with the plaintext as body.
///
/// The ciphertext is bound by the authority to the component and the tenant
/// identity that requested it. Nothing is retried.
pub struct RemoteSecretEncryptor {
    http_client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl RemoteSecretEncryptor {
    pub fn new(http_client: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http_client,
            base_url,
            timeout,
        }
    }

    /// Encryption endpoint for one component
    pub fn encrypt_url(&self, component_id: &str) -> Result<Url, ProtectionError> {
        // `push` drops dot segments, which would unbind the ciphertext from the component
        if component_id.is_empty() || component_id == "." || component_id == ".." {
            return Err(ProtectionError::RemoteEncryptionFailed(format!(
                "'{}' cannot address a component",
                component_id
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProtectionError::RemoteEncryptionFailed(format!(
                    "encryption authority URL '{}' cannot be a base",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push(component_id)
            .push("encrypt");
        Ok(url)
    }
}

#[async_trait]
impl SecretProtector for RemoteSecretEncryptor {
    fn layer(&self) -> ProtectionLayer {
        ProtectionLayer::Remote
    }

    async fn protect(
        &self,
        secret: &AppSecret,
        context: &ProtectionContext<'_>,
    ) -> Result<Vec<u8>, ProtectionError> {
        let url = self.encrypt_url(context.component_id)?;

        let response = self
            .http_client
            .post(url)
            .header(TENANT_TOKEN_HEADER, context.caller_identity)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(secret.expose().to_string())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                ProtectionError::RemoteEncryptionFailed(format!(
                    "transport failure: {}",
                    e.without_url()
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProtectionError::RemoteEncryptionFailed(format!(
                "rejected with HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            ProtectionError::RemoteEncryptionFailed(format!("unreadable response: {}", e))
        })?;
        if body.is_empty() {
            return Err(ProtectionError::RemoteEncryptionFailed(
                "empty ciphertext".to_string(),
            ));
        }

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor(base: &str) -> RemoteSecretEncryptor {
        RemoteSecretEncryptor::new(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_encrypt_url() {
        let url = encryptor("https://syrup.example.com/docker")
            .encrypt_url("keboola.ex-slack")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://syrup.example.com/docker/keboola.ex-slack/encrypt"
        );

        let url = encryptor("https://syrup.example.com/docker/")
            .encrypt_url("slack")
            .unwrap();
        assert_eq!(url.as_str(), "https://syrup.example.com/docker/slack/encrypt");
    }

    #[test]
    fn test_encrypt_url_rejects_dot_segments() {
        let encryptor = encryptor("https://syrup.example.com/docker");
        for component_id in [".", "..", ""] {
            assert!(
                matches!(
                    encryptor.encrypt_url(component_id),
                    Err(ProtectionError::RemoteEncryptionFailed(_))
                ),
                "{component_id:?}"
            );
        }
    }

    #[test]
    fn test_encrypt_url_escapes_component_id() {
        let url = encryptor("https://syrup.example.com")
            .encrypt_url("../admin?x=1")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://syrup.example.com/..%2Fadmin%3Fx=1/encrypt"
        );
    }
}
