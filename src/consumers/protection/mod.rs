//! Secret protection layers.
//!
//! Each layer independently turns a plaintext consumer secret into ciphertext.
//! The registration pipeline runs them in order and does not care how many
//! there are or how they work.

mod local;
mod remote;

pub use local::LocalSecretEncryptor;
pub use remote::{RemoteSecretEncryptor, TENANT_TOKEN_HEADER};

use async_trait::async_trait;

use crate::consumers::types::{AppSecret, ProtectionLayer};
use crate::errors::ProtectionError;

/// Who a secret is being protected for
#[derive(Clone, Copy, Debug)]
pub struct ProtectionContext<'a> {
    pub component_id: &'a str,
    /// Tenant identity performing the registration
    pub caller_identity: &'a str,
}

/// One protection layer for consumer secrets
#[async_trait]
pub trait SecretProtector: Send + Sync {
    /// The layer this protector produces ciphertext for
    fn layer(&self) -> ProtectionLayer;

    /// Encrypt `secret`, returning opaque ciphertext
    async fn protect(
        &self,
        secret: &AppSecret,
        context: &ProtectionContext<'_>,
    ) -> Result<Vec<u8>, ProtectionError>;
}
