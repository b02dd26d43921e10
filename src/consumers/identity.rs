//! Identity gate backed by a remote identity authority.
//!
//! The authority maps a bearer credential to the scopes granted to it. The gate
//! keeps no state and makes exactly one bounded call per check.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::errors::IdentityError;

/// Header carrying the bearer credential
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Scopes granted to a verified credential
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrantedScopes {
    scopes: HashSet<String>,
    description: Option<String>,
}

impl GrantedScopes {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            description: None,
        }
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Human readable label the authority returned for the credential
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Checks presented credentials against an identity authority
#[async_trait]
pub trait IdentityGate: Send + Sync {
    /// Ask the authority which scopes `credential` carries
    async fn verify(&self, credential: &str) -> Result<GrantedScopes, IdentityError>;

    /// Verify a credential without requiring any particular scope
    async fn authenticate(&self, credential: Option<&str>) -> Result<GrantedScopes, IdentityError> {
        let credential = credential
            .filter(|value| !value.is_empty())
            .ok_or_else(|| IdentityError::MissingCredential(AUTHORIZATION_HEADER.to_string()))?;
        self.verify(credential).await
    }

    /// Succeeds iff the credential is present, verifies, and carries `required_scope`
    async fn authorize(
        &self,
        credential: Option<&str>,
        required_scope: &str,
    ) -> Result<GrantedScopes, IdentityError> {
        let granted = self.authenticate(credential).await?;
        if granted.contains(required_scope) {
            Ok(granted)
        } else {
            Err(IdentityError::InsufficientScope(required_scope.to_string()))
        }
    }
}

#[derive(Deserialize)]
struct TokenVerificationResponse {
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Identity gate calling `GET <verify_url>` with the credential as a bearer token
pub struct HttpIdentityGate {
    http_client: reqwest::Client,
    verify_url: Url,
    timeout: Duration,
}

impl HttpIdentityGate {
    pub fn new(http_client: reqwest::Client, verify_url: Url, timeout: Duration) -> Self {
        Self {
            http_client,
            verify_url,
            timeout,
        }
    }
}

#[async_trait]
impl IdentityGate for HttpIdentityGate {
    async fn verify(&self, credential: &str) -> Result<GrantedScopes, IdentityError> {
        let response = self
            .http_client
            .get(self.verify_url.clone())
            .bearer_auth(credential)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = ?e, "identity authority request failed");
                IdentityError::IdentityAuthorityUnreachable(e.to_string())
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(IdentityError::CredentialRejected(status.as_u16()));
        }
        if !status.is_success() {
            return Err(IdentityError::IdentityAuthorityUnreachable(format!(
                "identity authority returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenVerificationResponse = response.json().await.map_err(|e| {
            IdentityError::IdentityAuthorityUnreachable(format!("malformed response: {}", e))
        })?;

        let mut granted = GrantedScopes::new(body.scopes);
        granted.description = body.description;
        Ok(granted)
    }
}
