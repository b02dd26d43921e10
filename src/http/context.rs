//! Application state shared by request handlers.

use std::sync::Arc;

use crate::consumers::{IdentityGate, RegistrationService};
use crate::storage::traits::ConsumerStore;

#[derive(Clone)]
pub struct AppState {
    /// Verifies bearer credentials on every endpoint
    pub identity_gate: Arc<dyn IdentityGate>,
    pub registration_service: Arc<RegistrationService>,
    /// Read side of the registry
    pub consumer_store: Arc<dyn ConsumerStore>,
}
