use std::ops::Add;

use aide::axum::routing::{get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use aide::OperationOutput;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use headers::{HeaderMap, HeaderValue};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::request_state::RequestState;
use crate::SESSION_COOKIE_NAME;

use super::{password_hash_verify, ApiResponse};

/// Sessions expire this many hours after login, not sliding.
const SESSION_HOURS: i64 = 8;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/auth/login", post_with(login, login_docs))
        .api_route("/auth/logout", post_with(logout, logout_docs))
        .api_route("/auth/me", get_with(get_current_admin, get_current_admin_docs))
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct SessionAdminDto {
    pub username: String,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct LoginDto {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Sets the session cookie next to the response envelope.
#[derive(Debug, PartialEq)]
pub struct LoginResponseDto {
    pub token: String,
    pub username: String,
}

impl OperationOutput for LoginResponseDto {
    type Inner = ApiResponse<SessionAdminDto>;
}
impl IntoResponse for LoginResponseDto {
    fn into_response(self) -> axum::response::Response {
        let cookie = HeaderValue::from_str(
            format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                SESSION_COOKIE_NAME, self.token
            )
            .as_str(),
        )
        .unwrap();

        let mut header = HeaderMap::new();
        header.insert(header::SET_COOKIE, cookie);
        (
            StatusCode::OK,
            header,
            Json(ApiResponse::with_message(
                SessionAdminDto {
                    username: self.username,
                },
                "Login successful!",
            )),
        )
            .into_response()
    }
}

async fn login(mut state: RequestState, form: Json<LoginDto>) -> ServiceResult<LoginResponseDto> {
    let form = form.0;

    let (username, password) = match (form.username, form.password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            (username, password)
        }
        _ => return Err(ServiceError::BadRequest("Username and password are required!")),
    };

    let admin = state.db.get_admin_by_username(&username).await?;
    if let Some(admin) = admin {
        if password_hash_verify(&admin.password_hash, &password)? {
            let token = state
                .db
                .create_session_token(admin.id, Utc::now().add(Duration::hours(SESSION_HOURS)))
                .await?;

            return Ok(LoginResponseDto {
                token,
                username: admin.username,
            });
        }
    }

    Err(ServiceError::Unauthorized("Invalid username or password!"))
}

fn login_docs(op: TransformOperation) -> TransformOperation {
    op.description("Login with username and password.")
        .tag("auth")
        .response::<200, Json<ApiResponse<SessionAdminDto>>>()
        .response_with::<400, (), _>(|res| res.description("Missing username or password!"))
        .response_with::<401, (), _>(|res| res.description("Invalid username or password!"))
}

/// Clears the session cookie next to the response envelope.
#[derive(Debug, PartialEq)]
pub struct LogoutResponseDto;

impl OperationOutput for LogoutResponseDto {
    type Inner = ApiResponse<()>;
}
impl IntoResponse for LogoutResponseDto {
    fn into_response(self) -> axum::response::Response {
        let cookie = HeaderValue::from_str(
            format!(
                "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
                SESSION_COOKIE_NAME
            )
            .as_str(),
        )
        .unwrap();

        let mut header = HeaderMap::new();
        header.insert(header::SET_COOKIE, cookie);
        (
            StatusCode::OK,
            header,
            Json(ApiResponse::message("Logout successful!")),
        )
            .into_response()
    }
}

async fn logout(mut state: RequestState) -> ServiceResult<LogoutResponseDto> {
    if let Some(session) = state.session.take() {
        state.db.delete_session_token(&session.token).await?;
    }

    Ok(LogoutResponseDto)
}

fn logout_docs(op: TransformOperation) -> TransformOperation {
    op.description("Logout the current session.")
        .tag("auth")
        .response::<200, Json<ApiResponse<()>>>()
}

async fn get_current_admin(state: RequestState) -> ServiceResult<Json<ApiResponse<SessionAdminDto>>> {
    let session = state.session_require()?;

    Ok(Json(ApiResponse::data(SessionAdminDto {
        username: session.admin.username.clone(),
    })))
}

fn get_current_admin_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get the admin bound to the current session.")
        .tag("auth")
        .response::<200, Json<ApiResponse<SessionAdminDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}
