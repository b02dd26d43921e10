//! Consumer definition validation.
//!
//! Which fields a definition must carry depends on its OAuth version. The
//! dependency is expressed as data in [`FIELD_REQUIREMENTS`] so that adding a
//! protocol version is a table edit.

use serde_json::{Map, Value};
use std::collections::HashMap;
use url::Url;

use crate::consumers::types::{AppSecret, ConsumerField, OAuthVersion, ValidatedDefinition};
use crate::errors::ValidationError;

/// When a field must be supplied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// Copied through when supplied, never required
    Optional,
    /// Required for every version
    Always,
    /// Required for the listed versions and dropped for all others
    ForVersions(&'static [OAuthVersion]),
}

impl Requirement {
    /// Whether the field is part of the definition for `version`
    pub fn applies_to(&self, version: OAuthVersion) -> bool {
        match self {
            Requirement::Optional | Requirement::Always => true,
            Requirement::ForVersions(versions) => versions.contains(&version),
        }
    }

    pub fn is_required(&self, version: OAuthVersion) -> bool {
        match self {
            Requirement::Optional => false,
            Requirement::Always => true,
            Requirement::ForVersions(versions) => versions.contains(&version),
        }
    }
}

/// The field requirement matrix, checked in order.
///
/// Fields not listed here never reach storage. `app_secret` is read as
/// plaintext and replaced by ciphertexts before persisting; supplied
/// ciphertext fields are ignored.
pub const FIELD_REQUIREMENTS: &[(ConsumerField, Requirement)] = &[
    (ConsumerField::ComponentId, Requirement::Always),
    (ConsumerField::AuthUrl, Requirement::Always),
    (ConsumerField::TokenUrl, Requirement::Always),
    (
        ConsumerField::RequestTokenUrl,
        Requirement::ForVersions(&[OAuthVersion::V1_0]),
    ),
    (ConsumerField::AppKey, Requirement::Always),
    (ConsumerField::AppSecret, Requirement::Always),
    (ConsumerField::FriendlyName, Requirement::Always),
    (ConsumerField::OAuthVersion, Requirement::Always),
];

/// Validate an untrusted consumer definition.
pub fn validate(raw: &Value) -> Result<ValidatedDefinition, ValidationError> {
    let object = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    let version = parse_version(object)?;

    let mut accepted: HashMap<ConsumerField, String> = HashMap::new();
    for (field, requirement) in FIELD_REQUIREMENTS {
        if !requirement.applies_to(version) {
            continue;
        }

        match field_value(object, *field)? {
            Some(value) => {
                if field.is_url() {
                    check_url(*field, &value)?;
                }
                if *field == ConsumerField::ComponentId {
                    check_component_id(&value)?;
                }
                accepted.insert(*field, value);
            }
            None if requirement.is_required(version) => {
                return Err(ValidationError::MissingField(*field));
            }
            None => {}
        }
    }

    let mut required = |field: ConsumerField| {
        accepted
            .remove(&field)
            .ok_or(ValidationError::MissingField(field))
    };

    Ok(ValidatedDefinition {
        component_id: required(ConsumerField::ComponentId)?,
        friendly_name: required(ConsumerField::FriendlyName)?,
        app_key: required(ConsumerField::AppKey)?,
        app_secret: AppSecret::new(required(ConsumerField::AppSecret)?),
        oauth_version: version,
        auth_url: required(ConsumerField::AuthUrl)?,
        token_url: required(ConsumerField::TokenUrl)?,
        request_token_url: accepted.remove(&ConsumerField::RequestTokenUrl),
    })
}

fn parse_version(object: &Map<String, Value>) -> Result<OAuthVersion, ValidationError> {
    match object.get(ConsumerField::OAuthVersion.as_str()) {
        Some(Value::String(value)) => OAuthVersion::parse(value)
            .ok_or_else(|| ValidationError::InvalidVersion(format!("'{}'", value))),
        Some(other) => Err(ValidationError::InvalidVersion(other.to_string())),
        None => Err(ValidationError::InvalidVersion("nothing".to_string())),
    }
}

/// Present and non-empty string value of `field`, if any
fn field_value(
    object: &Map<String, Value>,
    field: ConsumerField,
) -> Result<Option<String>, ValidationError> {
    match object.get(field.as_str()) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ValidationError::InvalidField(
            field,
            "expected a string".to_string(),
        )),
    }
}

fn check_url(field: ConsumerField, value: &str) -> Result<(), ValidationError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidField(field, format!("not an absolute URL: {}", e)))
}

/// Component ids address the encryption authority as one path segment
fn check_component_id(value: &str) -> Result<(), ValidationError> {
    if value == "." || value == ".." {
        return Err(ValidationError::InvalidField(
            ConsumerField::ComponentId,
            "dot segments are not component ids".to_string(),
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::InvalidField(
            ConsumerField::ComponentId,
            "only ASCII letters, digits, '.', '_' and '-' are allowed".to_string(),
        ));
    }
    Ok(())
}
