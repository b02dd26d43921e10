//! Handles /consumers - consumer registration and lookup

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
};
use serde_json::{Value, json};

use crate::{
    consumers::{
        RegistrationRequest,
        types::{ConsumerDetail, ConsumerSummary, RegistrationReceipt},
    },
    errors::{Fault, IdentityError, LookupError, RegistrationError, StorageError},
    http::{
        context::AppState,
        middleware_auth::{BearerCredential, TenantToken},
    },
};

type ErrorResponse = (StatusCode, ResponseJson<Value>);

/// POST /consumers
pub async fn register_consumer_handler(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
    TenantToken(caller_identity): TenantToken,
    body: Bytes,
) -> Result<(StatusCode, ResponseJson<RegistrationReceipt>), ErrorResponse> {
    // A body that is not JSON at all fails validation, after authorization
    let definition = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let request = RegistrationRequest {
        credential,
        caller_identity,
        definition,
    };

    match state.registration_service.register(request).await {
        Ok(receipt) => Ok((StatusCode::CREATED, ResponseJson(receipt))),
        Err(e) => Err(registration_error_response(&e)),
    }
}

/// GET /consumers
pub async fn list_consumers_handler(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
) -> Result<ResponseJson<Vec<ConsumerSummary>>, ErrorResponse> {
    list_consumers(&state, credential.as_deref())
        .await
        .map(ResponseJson)
        .map_err(|e| lookup_error_response(&e))
}

/// GET /consumers/{component_id}
pub async fn get_consumer_handler(
    State(state): State<AppState>,
    Path(component_id): Path<String>,
    BearerCredential(credential): BearerCredential,
) -> Result<ResponseJson<ConsumerDetail>, ErrorResponse> {
    get_consumer(&state, credential.as_deref(), &component_id)
        .await
        .map(ResponseJson)
        .map_err(|e| lookup_error_response(&e))
}

async fn list_consumers(
    state: &AppState,
    credential: Option<&str>,
) -> Result<Vec<ConsumerSummary>, LookupError> {
    state.identity_gate.authenticate(credential).await?;
    Ok(state.consumer_store.list_consumers().await?)
}

async fn get_consumer(
    state: &AppState,
    credential: Option<&str>,
    component_id: &str,
) -> Result<ConsumerDetail, LookupError> {
    state.identity_gate.authenticate(credential).await?;
    state
        .consumer_store
        .get_consumer(component_id)
        .await?
        .map(|record| record.detail())
        .ok_or_else(|| LookupError::NotFound(component_id.to_string()))
}

fn registration_error_response(e: &RegistrationError) -> ErrorResponse {
    let (status, error_code, description) = match (e.fault(), e) {
        (
            Fault::Client,
            RegistrationError::Authorization(IdentityError::InsufficientScope(_)),
        ) => (StatusCode::FORBIDDEN, "insufficient_scope", e.to_string()),
        (Fault::Client, RegistrationError::Authorization(_)) => {
            (StatusCode::UNAUTHORIZED, "unauthorized", e.to_string())
        }
        (Fault::Client, RegistrationError::Persistence(StorageError::Conflict(_))) => {
            (StatusCode::CONFLICT, "consumer_exists", e.to_string())
        }
        (Fault::Client, _) => (StatusCode::BAD_REQUEST, "invalid_consumer", e.to_string()),
        (Fault::Dependency, _) => (
            StatusCode::BAD_GATEWAY,
            "dependency_unavailable",
            e.to_string(),
        ),
        (Fault::Internal, _) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Internal server error".to_string(),
        ),
    };

    (
        status,
        ResponseJson(json!({
            "error": error_code,
            "error_description": description,
            "stage": e.stage().to_string(),
        })),
    )
}

fn lookup_error_response(e: &LookupError) -> ErrorResponse {
    let (status, error_code, description, stage) = match e {
        LookupError::Authorization(IdentityError::IdentityAuthorityUnreachable(_)) => (
            StatusCode::BAD_GATEWAY,
            "dependency_unavailable",
            e.to_string(),
            "authorize",
        ),
        LookupError::Authorization(_) => (
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            e.to_string(),
            "authorize",
        ),
        LookupError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            "consumer_not_found",
            e.to_string(),
            "lookup",
        ),
        LookupError::Storage(StorageError::ConnectionFailed(_)) => (
            StatusCode::BAD_GATEWAY,
            "dependency_unavailable",
            e.to_string(),
            "lookup",
        ),
        LookupError::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Internal server error".to_string(),
            "lookup",
        ),
    };

    (
        status,
        ResponseJson(json!({
            "error": error_code,
            "error_description": description,
            "stage": stage,
        })),
    )
}
