use aide::axum::routing::{get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query};
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::request_state::RequestState;

use super::ApiResponse;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/members",
            get_with(list_members, list_members_docs).post_with(create_member, create_member_docs),
        )
        .api_route(
            "/members/:id",
            get_with(get_member, get_member_docs)
                .put_with(update_member, update_member_docs)
                .delete_with(delete_member, delete_member_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct MemberDto {
    pub id: i64,
    pub member_no: String,
    pub name: String,
    pub points: i64,
    pub created_at: String,
}

impl From<&models::Member> for MemberDto {
    fn from(value: &models::Member) -> Self {
        Self {
            id: value.id,
            member_no: value.member_no.to_owned(),
            name: value.name.to_owned(),
            points: value.points,
            created_at: format!("{:?}", value.created_at),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct MemberListQuery {
    /// Substring filter matched against name or member number.
    pub search: Option<String>,
}

async fn list_members(
    mut state: RequestState,
    query: Query<MemberListQuery>,
) -> ServiceResult<Json<ApiResponse<Vec<MemberDto>>>> {
    state.session_require()?;

    let members = state.db.get_all_members(query.0.search.as_deref()).await?;
    Ok(Json(ApiResponse::data(
        members.iter().map(|m| m.into()).collect(),
    )))
}

fn list_members_docs(op: TransformOperation) -> TransformOperation {
    op.description("List all members, newest first, optionally filtered by name or member number.")
        .tag("members")
        .response::<200, Json<ApiResponse<Vec<MemberDto>>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

async fn get_member(
    mut state: RequestState,
    Path(id): Path<i64>,
) -> ServiceResult<Json<ApiResponse<MemberDto>>> {
    state.session_require()?;

    let member = state.db.get_member_by_id(id).await?;
    if let Some(member) = member {
        return Ok(Json(ApiResponse::data(MemberDto::from(&member))));
    }

    Err(ServiceError::NotFound)
}

fn get_member_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get a member by id.")
        .tag("members")
        .response::<200, Json<ApiResponse<MemberDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<404, (), _>(|res| res.description("The requested member does not exist!"))
        .security_requirement("SessionToken")
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveMemberDto {
    pub member_no: Option<String>,
    pub name: Option<String>,
    pub points: Option<i64>,
}

fn require_identity_fields(form: &SaveMemberDto) -> ServiceResult<(&str, &str)> {
    match (form.member_no.as_deref(), form.name.as_deref()) {
        (Some(member_no), Some(name)) if !member_no.is_empty() && !name.is_empty() => {
            Ok((member_no, name))
        }
        _ => Err(ServiceError::BadRequest(
            "Member number and name are required!",
        )),
    }
}

async fn create_member(
    mut state: RequestState,
    form: Json<SaveMemberDto>,
) -> ServiceResult<Json<ApiResponse<MemberDto>>> {
    state.session_require()?;
    let form = form.0;

    let (member_no, name) = require_identity_fields(&form)?;
    let points = form.points.unwrap_or(0);

    let member = state.db.create_member(member_no, name, points).await?;
    Ok(Json(ApiResponse::with_message(
        MemberDto::from(&member),
        "Member registered!",
    )))
}

fn create_member_docs(op: TransformOperation) -> TransformOperation {
    op.description("Register a new member, optionally with an initial point balance.")
        .tag("members")
        .response::<200, Json<ApiResponse<MemberDto>>>()
        .response_with::<400, (), _>(|res| res.description("Missing member number or name!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<409, (), _>(|res| res.description("The member number is already taken!"))
        .security_requirement("SessionToken")
}

async fn update_member(
    mut state: RequestState,
    Path(id): Path<i64>,
    form: Json<SaveMemberDto>,
) -> ServiceResult<Json<ApiResponse<()>>> {
    state.session_require()?;
    let form = form.0;

    let (member_no, name) = require_identity_fields(&form)?;
    state.db.update_member(id, member_no, name).await?;

    Ok(Json(ApiResponse::message("Member updated!")))
}

fn update_member_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update a member's member number and name. Points are only changed through point operations.")
        .tag("members")
        .response::<200, Json<ApiResponse<()>>>()
        .response_with::<400, (), _>(|res| res.description("Missing member number or name!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<404, (), _>(|res| res.description("The requested member does not exist!"))
        .response_with::<409, (), _>(|res| res.description("The member number is already taken!"))
        .security_requirement("SessionToken")
}

async fn delete_member(
    mut state: RequestState,
    Path(id): Path<i64>,
) -> ServiceResult<Json<ApiResponse<()>>> {
    state.session_require()?;

    state.db.delete_member(id).await?;
    Ok(Json(ApiResponse::message("Member deleted!")))
}

fn delete_member_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete a member together with its point history.")
        .tag("members")
        .response::<200, Json<ApiResponse<()>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<404, (), _>(|res| res.description("The requested member does not exist!"))
        .security_requirement("SessionToken")
}
