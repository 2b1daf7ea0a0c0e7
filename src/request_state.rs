use aide::OperationInput;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization, Cookie};

use crate::{
    database::{AppState, DatabaseConnection},
    error::{ServiceError, ServiceResult},
    models::Session,
    SESSION_COOKIE_NAME,
};

/// Per request context: a store connection and the session resolved from the
/// request, if any.
pub struct RequestState {
    pub db: DatabaseConnection,
    pub session: Option<Session>,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestState
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let connection = state
            .pool
            .acquire()
            .await
            .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;
        let mut db = DatabaseConnection { connection };

        let session = match session_token_from_parts(parts).await {
            Some(token) => db.get_session_by_session_token(&token).await?,
            None => None,
        };

        Ok(Self { db, session })
    }
}

/// Read the session token from the session cookie, falling back to a bearer
/// authorization header.
async fn session_token_from_parts(parts: &mut Parts) -> Option<String> {
    if let Ok(TypedHeader(cookie)) = parts.extract::<TypedHeader<Cookie>>().await {
        if let Some(token) = cookie.get(SESSION_COOKIE_NAME) {
            return Some(token.to_owned());
        }
    }

    if let Ok(TypedHeader(Authorization(bearer))) =
        parts.extract::<TypedHeader<Authorization<Bearer>>>().await
    {
        return Some(bearer.token().to_owned());
    }

    None
}

impl RequestState {
    /// Every admin facing endpoint calls this first. No session, no access.
    pub fn session_require(&self) -> ServiceResult<&Session> {
        self.session
            .as_ref()
            .ok_or(ServiceError::Unauthorized("Login required!"))
    }
}

impl OperationInput for RequestState {}
