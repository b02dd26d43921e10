//! OAuth consumer registration core.
//!
//! Validates consumer definitions, checks the caller against the identity
//! authority, protects the consumer secret in two independent layers and hands
//! the sealed record to the registry.

pub mod identity;
pub mod protection;
pub mod registration;
pub mod types;
pub mod validation;

pub use identity::{GrantedScopes, HttpIdentityGate, IdentityGate};
pub use protection::{
    LocalSecretEncryptor, ProtectionContext, RemoteSecretEncryptor, SecretProtector,
};
pub use registration::{RegistrationRequest, RegistrationService};
