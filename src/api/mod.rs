use aide::axum::ApiRouter;
use rand::distributions::Alphanumeric;
use rand::Rng;
use schemars::JsonSchema;
use serde::Serialize;

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};

pub mod admins;
pub mod auth;
pub mod ledger;
pub mod members;
pub mod stats;

/// Minimum accepted password length for admin accounts.
const MIN_PASSWORD_LENGTH: usize = 4;

const PASSWORD_SALT_LENGTH: usize = 16;

pub fn init(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .merge(auth::router(app_state.clone()))
        .merge(admins::router(app_state.clone()))
        .merge(members::router(app_state.clone()))
        .merge(ledger::router(app_state.clone()))
        .merge(stats::router(app_state))
}

/// Response envelope used by all endpoints.
#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(data: T, message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_owned()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_owned()),
            data: None,
        }
    }
}

/// Hash a password with a fresh random salt.
///
/// The result stores the salt in the first `PASSWORD_SALT_LENGTH` bytes,
/// followed by the argon2 hash.
pub fn password_hash_create(password: &str) -> ServiceResult<Vec<u8>> {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_SALT_LENGTH)
        .map(char::from)
        .collect();
    let hash = argon2rs::argon2i_simple(password, &salt);

    let mut result = salt.into_bytes();
    result.extend_from_slice(&hash);
    Ok(result)
}

/// Check a password against a salt-prefixed hash from `password_hash_create`.
pub fn password_hash_verify(hash: &[u8], password: &str) -> ServiceResult<bool> {
    if hash.len() <= PASSWORD_SALT_LENGTH {
        return Ok(false);
    }

    let (salt, expected) = hash.split_at(PASSWORD_SALT_LENGTH);
    let salt = std::str::from_utf8(salt)
        .map_err(|_| ServiceError::InternalServerError("corrupt password hash".to_string()))?;
    let actual = argon2rs::argon2i_simple(password, salt);

    Ok(actual.as_slice() == expected)
}
