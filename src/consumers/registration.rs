//! Consumer registration pipeline.
//!
//! One request moves through `Start → Authorized → Validated → Protected(..)
//! → Persisted` and stops at the first failure. Nothing is written before the
//! final step, so a failed registration never leaves a partial record.

use serde_json::Value;
use std::sync::Arc;

use crate::consumers::identity::{AUTHORIZATION_HEADER, IdentityGate};
use crate::consumers::protection::{ProtectionContext, SecretProtector, TENANT_TOKEN_HEADER};
use crate::consumers::types::{
    ProtectedConsumerRecord, ProtectedSecret, ProtectionLayer, RegistrationReceipt,
};
use crate::consumers::validation;
use crate::errors::{IdentityError, ProtectionError, RegistrationError};
use crate::storage::traits::ConsumerStore;

/// Inbound registration: credentials from the request boundary plus the untrusted body
#[derive(Clone, Debug, Default)]
pub struct RegistrationRequest {
    /// Bearer credential checked against the identity authority
    pub credential: Option<String>,
    /// Tenant identity the remote ciphertext is bound to
    pub caller_identity: Option<String>,
    pub definition: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RegistrationState {
    Start,
    Authorized,
    Validated,
    Protected(ProtectionLayer),
    Persisted,
}

/// Registers consumers: authorize, validate, protect the secret, persist
pub struct RegistrationService {
    identity_gate: Arc<dyn IdentityGate>,
    protectors: Vec<Arc<dyn SecretProtector>>,
    storage: Arc<dyn ConsumerStore>,
    required_scope: String,
}

impl RegistrationService {
    /// Create a new registration service.
    ///
    /// `protectors` run in order; the record is sealed only when both the
    /// remote and the local layer produced ciphertext.
    pub fn new(
        identity_gate: Arc<dyn IdentityGate>,
        protectors: Vec<Arc<dyn SecretProtector>>,
        storage: Arc<dyn ConsumerStore>,
        required_scope: String,
    ) -> Self {
        Self {
            identity_gate,
            protectors,
            storage,
            required_scope,
        }
    }

    /// Run the whole pipeline for one request
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        let result = self.run(request).await;

        if let Err(err) = &result {
            tracing::warn!(stage = %err.stage(), fault = ?err.fault(), error = %err, "consumer registration failed");
        }

        result
    }

    async fn run(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        let mut state = RegistrationState::Start;

        let credential = present(request.credential.as_deref())
            .ok_or_else(|| IdentityError::MissingCredential(AUTHORIZATION_HEADER.to_string()))?;
        let caller_identity = present(request.caller_identity.as_deref())
            .ok_or_else(|| IdentityError::MissingCredential(TENANT_TOKEN_HEADER.to_string()))?;

        let granted = self
            .identity_gate
            .authorize(Some(credential), &self.required_scope)
            .await?;
        tracing::debug!(credential = ?granted.description(), "credential carries the registration scope");
        advance(&mut state, RegistrationState::Authorized, None);

        let definition = validation::validate(&request.definition)?;
        let component_id = definition.component_id.clone();
        advance(&mut state, RegistrationState::Validated, Some(&component_id));

        let context = ProtectionContext {
            component_id: &component_id,
            caller_identity,
        };
        let mut protected = ProtectedSecret::new();
        for protector in &self.protectors {
            let layer = protector.layer();
            let ciphertext = protector
                .protect(&definition.app_secret, &context)
                .await
                .map_err(|source| RegistrationError::Protection { layer, source })?;
            protected.insert(layer, ciphertext);
            advance(&mut state, RegistrationState::Protected(layer), Some(&component_id));
        }

        let record = ProtectedConsumerRecord::seal(definition, protected).map_err(|source| {
            let layer = match &source {
                ProtectionError::IncompleteProtection(layer) => *layer,
                _ => ProtectionLayer::Local,
            };
            RegistrationError::Protection { layer, source }
        })?;

        self.storage.insert_consumer(&record).await?;
        advance(&mut state, RegistrationState::Persisted, Some(&component_id));

        tracing::info!(component_id = %component_id, "consumer registered");
        Ok(RegistrationReceipt::created(component_id))
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn advance(state: &mut RegistrationState, next: RegistrationState, component_id: Option<&str>) {
    tracing::debug!(from = ?state, to = ?next, component_id = ?component_id, "registration stage complete");
    *state = next;
}
