//! Credential extractors.
//!
//! Both extractors only read headers. Whether a missing credential is an error
//! is decided by the identity gate, so extraction itself never rejects.

use axum::extract::FromRequestParts;
use http::header::AUTHORIZATION;
use http::request::Parts;
use std::convert::Infallible;

use crate::consumers::protection::TENANT_TOKEN_HEADER;

/// Bearer credential from `Authorization: Bearer <token>`
///
/// Any other authorization scheme is treated as no credential at all.
#[derive(Clone, Debug, Default)]
pub struct BearerCredential(pub Option<String>);

/// Tenant token from the `X-Tenant-Token` header
#[derive(Clone, Debug, Default)]
pub struct TenantToken(pub Option<String>);

impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer)
            .map(str::to_string);
        Ok(Self(credential))
    }
}

impl<S> FromRequestParts<S> for TenantToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(TENANT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self(token))
    }
}

fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
