use std::sync::Arc;

use aide::openapi::OpenApi;
use axum::Extension;
use tower_http::cors::CorsLayer;

mod api;
mod database;
mod docs;
mod env;
mod error;
mod models;
mod request_state;

use crate::database::{AppState, DatabaseConnection};
use crate::error::{ServiceError, ServiceResult};

pub const SESSION_COOKIE_NAME: &str = "session_token";

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin1234";

#[tokio::main]
async fn main() {
    let result = init().await;

    if let Err(error) = result {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

async fn init() -> ServiceResult<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let app_state = AppState::connect(env::DATABASE_URL.as_str()).await;
    ensure_default_admin(&app_state).await?;

    let mut open_api = OpenApi::default();
    let router = aide::axum::ApiRouter::new()
        .nest_api_service("/api", api::init(app_state.clone()))
        .nest_api_service("/docs", docs::docs_routes())
        .finish_api_with(&mut open_api, docs::api_docs)
        .layer(Extension(Arc::new(open_api)))
        .layer(CorsLayer::very_permissive());

    let address = format!("{}:{}", env::API_HOST.as_str(), env::API_PORT.as_str());
    log::info!("Start http server at {}", address);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;

    Ok(())
}

/// Seed the initial admin account if the admins table is empty.
async fn ensure_default_admin(app_state: &AppState) -> ServiceResult<()> {
    let connection = app_state
        .pool
        .acquire()
        .await
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;
    let mut db = DatabaseConnection { connection };

    if db.count_admins().await? == 0 {
        let password_hash = api::password_hash_create(DEFAULT_ADMIN_PASSWORD)?;
        db.create_admin(DEFAULT_ADMIN_USERNAME, &password_hash)
            .await?;

        log::warn!(
            "Created default admin account '{}' with password '{}'.",
            DEFAULT_ADMIN_USERNAME,
            DEFAULT_ADMIN_PASSWORD
        );
        log::warn!("Change this password after the first login!");
    }

    Ok(())
}
