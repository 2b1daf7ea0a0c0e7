use aide::axum::routing::{delete_with, get_with, put_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::Path;
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::request_state::RequestState;

use super::{password_hash_create, ApiResponse, MIN_PASSWORD_LENGTH};

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/admins",
            get_with(list_admins, list_admins_docs).post_with(create_admin, create_admin_docs),
        )
        .api_route(
            "/admins/:id/password",
            put_with(update_admin_password, update_admin_password_docs),
        )
        .api_route("/admins/:id", delete_with(delete_admin, delete_admin_docs))
        .with_state(app_state)
}

/// Admin identity without the password hash. The hash never leaves the store
/// layer.
#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct AdminDto {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

impl From<&models::Admin> for AdminDto {
    fn from(value: &models::Admin) -> Self {
        Self {
            id: value.id,
            username: value.username.to_owned(),
            created_at: format!("{:?}", value.created_at),
        }
    }
}

async fn list_admins(mut state: RequestState) -> ServiceResult<Json<ApiResponse<Vec<AdminDto>>>> {
    state.session_require()?;

    let admins = state.db.get_all_admins().await?;
    Ok(Json(ApiResponse::data(
        admins.iter().map(|a| a.into()).collect(),
    )))
}

fn list_admins_docs(op: TransformOperation) -> TransformOperation {
    op.description("List all admin accounts.")
        .tag("admins")
        .response::<200, Json<ApiResponse<Vec<AdminDto>>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct CreateAdminDto {
    pub username: Option<String>,
    pub password: Option<String>,
}

async fn create_admin(
    mut state: RequestState,
    form: Json<CreateAdminDto>,
) -> ServiceResult<Json<ApiResponse<AdminDto>>> {
    state.session_require()?;
    let form = form.0;

    let (username, password) = match (form.username, form.password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            (username, password)
        }
        _ => return Err(ServiceError::BadRequest("Username and password are required!")),
    };
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::BadRequest(
            "The password must be at least 4 characters long!",
        ));
    }

    let password_hash = password_hash_create(&password)?;
    let admin = state.db.create_admin(&username, &password_hash).await?;

    Ok(Json(ApiResponse::with_message(
        AdminDto::from(&admin),
        "Admin account created!",
    )))
}

fn create_admin_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new admin account.")
        .tag("admins")
        .response::<200, Json<ApiResponse<AdminDto>>>()
        .response_with::<400, (), _>(|res| res.description("Missing fields or password too short!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<409, (), _>(|res| res.description("The username is already taken!"))
        .security_requirement("SessionToken")
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct UpdateAdminPasswordDto {
    pub password: Option<String>,
}

async fn update_admin_password(
    mut state: RequestState,
    Path(id): Path<i64>,
    form: Json<UpdateAdminPasswordDto>,
) -> ServiceResult<Json<ApiResponse<()>>> {
    state.session_require()?;

    let password = match form.0.password {
        Some(password) if password.chars().count() >= MIN_PASSWORD_LENGTH => password,
        _ => {
            return Err(ServiceError::BadRequest(
                "The password must be at least 4 characters long!",
            ))
        }
    };

    let password_hash = password_hash_create(&password)?;
    state.db.update_admin_password(id, &password_hash).await?;

    Ok(Json(ApiResponse::message("Password changed!")))
}

fn update_admin_password_docs(op: TransformOperation) -> TransformOperation {
    op.description("Change the password of an admin account.")
        .tag("admins")
        .response::<200, Json<ApiResponse<()>>>()
        .response_with::<400, (), _>(|res| res.description("Password too short!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<404, (), _>(|res| res.description("The requested admin does not exist!"))
        .security_requirement("SessionToken")
}

async fn delete_admin(
    mut state: RequestState,
    Path(id): Path<i64>,
) -> ServiceResult<Json<ApiResponse<()>>> {
    let session = state.session_require()?;

    if session.admin.id == id {
        return Err(ServiceError::BadRequest(
            "The currently signed in account cannot be deleted!",
        ));
    }
    if state.db.count_admins().await? <= 1 {
        return Err(ServiceError::BadRequest(
            "At least one admin account must remain!",
        ));
    }

    state.db.delete_admin(id).await?;
    Ok(Json(ApiResponse::message("Admin account deleted!")))
}

fn delete_admin_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete an admin account.")
        .tag("admins")
        .response::<200, Json<ApiResponse<()>>>()
        .response_with::<400, (), _>(|res| {
            res.description("The last remaining or currently signed in admin cannot be deleted!")
        })
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<404, (), _>(|res| res.description("The requested admin does not exist!"))
        .security_requirement("SessionToken")
}
