use std::sync::Arc;

use aide::{
    axum::{
        routing::{get, get_with},
        ApiRouter, IntoApiResponse,
    },
    openapi::{OpenApi, Tag},
    redoc::Redoc,
    transform::TransformOpenApi,
};
use axum::{response::IntoResponse, Extension, Json};

pub fn api_docs(api: TransformOpenApi) -> TransformOpenApi {
    api.title("point-ledger-server")
        .summary("Administration backend for member point tracking")
        .tag(Tag {
            name: "auth".into(),
            description: Some("Admin login and session handling".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "admins".into(),
            description: Some("Admin account management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "members".into(),
            description: Some("Member management".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "points".into(),
            description: Some("Point ledger and history".into()),
            ..Default::default()
        })
        .tag(Tag {
            name: "stats".into(),
            description: Some("Aggregated member statistics".into()),
            ..Default::default()
        })
        .security_scheme(
            "SessionToken",
            aide::openapi::SecurityScheme::ApiKey {
                location: aide::openapi::ApiKeyLocation::Cookie,
                name: crate::SESSION_COOKIE_NAME.into(),
                description: Some("Session cookie issued by /api/auth/login.".into()),
                extensions: Default::default(),
            },
        )
}

pub fn docs_routes() -> ApiRouter {
    // We infer the return types for these routes
    // as an example.
    //
    // As a result, the `serve_redoc` route will
    // have the `text/html` content-type correctly set
    // with a 200 status.
    aide::gen::infer_responses(true);

    let router = ApiRouter::new()
        .api_route_with(
            "/",
            get_with(
                Redoc::new("/docs/api.json")
                    .with_title("point-ledger-server")
                    .axum_handler(),
                |op| op.description("This documentation page."),
            ),
            |p| p.security_requirement("SessionToken"),
        )
        .route("/api.json", get(serve_docs));

    // Afterwards we disable response inference because
    // it might be incorrect for other routes.
    aide::gen::infer_responses(false);

    router
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoApiResponse {
    Json(api).into_response()
}
