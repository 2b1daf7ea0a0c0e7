use aide::OperationOutput;
use axum::{http::StatusCode, response::IntoResponse, Json};
use schemars::JsonSchema;
use serde_json::json;

/// Represent errors in the application
///
/// All `ServiceError`s can be transformed to http errors.
#[derive(Debug, Clone, PartialEq, JsonSchema)]
pub enum ServiceError {
    BadRequest(&'static str),
    Unauthorized(&'static str),
    NotFound,
    Conflict(&'static str),
    InternalServerError(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for ServiceError {}

/// Helper for `ServiceError` result
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::InternalServerError(err.to_string())
    }
}

impl OperationOutput for ServiceError {
    type Inner = String;
}
impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ServiceError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            ServiceError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.to_string()),
            ServiceError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ServiceError::Conflict(message) => (StatusCode::CONFLICT, message.to_string()),
            ServiceError::InternalServerError(cause) => (StatusCode::INTERNAL_SERVER_ERROR, cause),
        };

        (
            status,
            Json(json!({
                "success": false,
                "message": message,
            })),
        )
            .into_response()
    }
}
