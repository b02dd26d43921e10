//! Encryption under the process-wide symmetric key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use rand::RngCore;

use super::{ProtectionContext, SecretProtector};
use crate::config::LocalEncryptionKey;
use crate::consumers::types::{AppSecret, ProtectionLayer};
use crate::errors::ProtectionError;

const FORMAT_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AES-256-GCM with a random nonce per secret.
///
/// Layout: `version(1) || nonce(12) || ciphertext || tag(16)`.
pub struct LocalSecretEncryptor {
    cipher: Aes256Gcm,
}

impl LocalSecretEncryptor {
    pub fn new(key: &LocalEncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_ref().into()),
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, ProtectionError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| ProtectionError::LocalEncryptionFailed("AEAD seal failed".to_string()))?;

        let mut output = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        output.push(FORMAT_VERSION);
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&sealed);
        Ok(output)
    }

    /// Fails closed on any tampering, truncation, or unknown format.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ProtectionError> {
        if ciphertext.len() < 1 + NONCE_LEN + TAG_LEN || ciphertext[0] != FORMAT_VERSION {
            return Err(ProtectionError::LocalDecryptionFailed);
        }

        let (nonce, sealed) = ciphertext[1..].split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| ProtectionError::LocalDecryptionFailed)
    }
}

#[async_trait]
impl SecretProtector for LocalSecretEncryptor {
    fn layer(&self) -> ProtectionLayer {
        ProtectionLayer::Local
    }

    async fn protect(
        &self,
        secret: &AppSecret,
        _context: &ProtectionContext<'_>,
    ) -> Result<Vec<u8>, ProtectionError> {
        self.encrypt(secret.expose().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor() -> LocalSecretEncryptor {
        LocalSecretEncryptor::new(&LocalEncryptionKey::from_bytes([7u8; 32]))
    }

    #[test]
    fn test_decrypt_recovers_secret() {
        let encryptor = encryptor();
        let ciphertext = encryptor.encrypt(b"s1").unwrap();

        assert_eq!(ciphertext[0], FORMAT_VERSION);
        assert_eq!(ciphertext.len(), 1 + NONCE_LEN + 2 + TAG_LEN);
        assert_eq!(encryptor.decrypt(&ciphertext).unwrap(), b"s1");
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let encryptor = encryptor();
        let first = encryptor.encrypt(b"s1").unwrap();
        let second = encryptor.encrypt(b"s1").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_tampering_fails_closed() {
        let encryptor = encryptor();
        let ciphertext = encryptor.encrypt(b"client-secret").unwrap();

        for index in 0..ciphertext.len() {
            let mut tampered = ciphertext.clone();
            tampered[index] ^= 0x01;
            assert!(matches!(
                encryptor.decrypt(&tampered),
                Err(ProtectionError::LocalDecryptionFailed)
            ));
        }

        assert!(matches!(
            encryptor.decrypt(&ciphertext[..ciphertext.len() - 1]),
            Err(ProtectionError::LocalDecryptionFailed)
        ));
        assert!(matches!(
            encryptor.decrypt(&[]),
            Err(ProtectionError::LocalDecryptionFailed)
        ));
    }

    #[test]
    fn test_other_key_cannot_decrypt() {
        let ciphertext = encryptor().encrypt(b"s1").unwrap();
        let other = LocalSecretEncryptor::new(&LocalEncryptionKey::from_bytes([8u8; 32]));
        assert!(other.decrypt(&ciphertext).is_err());
    }

    #[tokio::test]
    async fn test_protect_reports_local_layer() {
        let encryptor = encryptor();
        let context = ProtectionContext {
            component_id: "slack",
            caller_identity: "tenant",
        };
        let ciphertext = encryptor
            .protect(&AppSecret::new("s1".to_string()), &context)
            .await
            .unwrap();

        assert_eq!(encryptor.layer(), ProtectionLayer::Local);
        assert_eq!(encryptor.decrypt(&ciphertext).unwrap(), b"s1");
    }
}
