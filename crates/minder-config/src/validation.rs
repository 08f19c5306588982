//! Configuration validation

use crate::schema::RawConfig;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Duplicate profile ID: {0}")]
    DuplicateProfileId(String),

    #[error("Duplicate item ID: {0}")]
    DuplicateItemId(String),

    #[error("Duplicate credential token for device '{0}'")]
    DuplicateToken(String),

    #[error("Credential for device '{device_id}': {message}")]
    CredentialError { device_id: String, message: String },

    #[error("Limit row ({profile}, {item}): {message}")]
    LimitError {
        profile: String,
        item: String,
        message: String,
    },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut profile_ids = HashSet::new();
    for profile in &config.profiles {
        if !profile_ids.insert(profile.id.as_str()) {
            errors.push(ValidationError::DuplicateProfileId(profile.id.clone()));
        }
    }

    let mut item_ids = HashSet::new();
    for item in &config.items {
        if !item_ids.insert(item.id.as_str()) {
            errors.push(ValidationError::DuplicateItemId(item.id.clone()));
        }
    }

    let mut tokens = HashSet::new();
    for cred in &config.service.credentials {
        if cred.token.is_empty() {
            errors.push(ValidationError::CredentialError {
                device_id: cred.device_id.clone(),
                message: "token cannot be empty".into(),
            });
        }
        if !tokens.insert(cred.token.as_str()) {
            errors.push(ValidationError::DuplicateToken(cred.device_id.clone()));
        }
        if parse_role(&cred.role).is_none() {
            errors.push(ValidationError::CredentialError {
                device_id: cred.device_id.clone(),
                message: format!("unknown role '{}'", cred.role),
            });
        }
    }

    let mut limit_keys = HashSet::new();
    for row in &config.limits {
        if !profile_ids.contains(row.profile.as_str()) {
            errors.push(ValidationError::LimitError {
                profile: row.profile.clone(),
                item: row.item.clone(),
                message: "unknown profile".into(),
            });
        }
        if !item_ids.contains(row.item.as_str()) {
            errors.push(ValidationError::LimitError {
                profile: row.profile.clone(),
                item: row.item.clone(),
                message: "unknown item".into(),
            });
        }
        if !limit_keys.insert((row.profile.as_str(), row.item.as_str())) {
            errors.push(ValidationError::LimitError {
                profile: row.profile.clone(),
                item: row.item.clone(),
                message: "duplicate limit row".into(),
            });
        }
    }

    errors
}

/// Parse a role string as written in the config file
pub fn parse_role(role: &str) -> Option<minder_api::SurfaceRole> {
    match role.to_lowercase().as_str() {
        "kiosk" => Some(minder_api::SurfaceRole::Kiosk),
        "content" => Some(minder_api::SurfaceRole::Content),
        "admin" => Some(minder_api::SurfaceRole::Admin),
        _ => None,
    }
}
