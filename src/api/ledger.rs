use aide::axum::routing::{get_with, post_with};
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

use super::ApiResponse;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/members/:id/points",
            post_with(apply_points, apply_points_docs),
        )
        .api_route(
            "/members/:id/history",
            get_with(list_history, list_history_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryTypeDto {
    Accrue,
    Consume,
    Adjust,
}

impl From<&models::LedgerEntryType> for LedgerEntryTypeDto {
    fn from(value: &models::LedgerEntryType) -> Self {
        match value {
            models::LedgerEntryType::Accrue => LedgerEntryTypeDto::Accrue,
            models::LedgerEntryType::Consume => LedgerEntryTypeDto::Consume,
            models::LedgerEntryType::Adjust => LedgerEntryTypeDto::Adjust,
        }
    }
}
impl From<LedgerEntryTypeDto> for models::LedgerEntryType {
    fn from(value: LedgerEntryTypeDto) -> Self {
        match value {
            LedgerEntryTypeDto::Accrue => models::LedgerEntryType::Accrue,
            LedgerEntryTypeDto::Consume => models::LedgerEntryType::Consume,
            LedgerEntryTypeDto::Adjust => models::LedgerEntryType::Adjust,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct LedgerEntryDto {
    pub id: i64,
    pub member_id: i64,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryTypeDto,
    pub amount: i64,
    pub note: Option<String>,
    pub created_at: String,
}

impl From<&models::LedgerEntry> for LedgerEntryDto {
    fn from(value: &models::LedgerEntry) -> Self {
        Self {
            id: value.id,
            member_id: value.member_id,
            entry_type: (&value.entry_type).into(),
            amount: value.amount,
            note: value.note.to_owned(),
            created_at: format!("{:?}", value.created_at),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct ApplyPointsDto {
    #[serde(rename = "type")]
    pub entry_type: Option<LedgerEntryTypeDto>,
    pub amount: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct BalanceDto {
    pub points: i64,
}

async fn apply_points(
    mut state: RequestState,
    Path(id): Path<i64>,
    form: Json<ApplyPointsDto>,
) -> ServiceResult<Json<ApiResponse<BalanceDto>>> {
    state.session_require()?;
    let form = form.0;

    let (entry_type, amount) = match (form.entry_type, form.amount) {
        (Some(entry_type), Some(amount)) => (entry_type, amount),
        _ => return Err(ServiceError::BadRequest("Type and amount are required!")),
    };

    let points = state
        .db
        .apply_ledger_entry(id, entry_type.into(), amount, form.note.as_deref())
        .await?;

    Ok(Json(ApiResponse::with_message(
        BalanceDto { points },
        "Points updated!",
    )))
}

fn apply_points_docs(op: TransformOperation) -> TransformOperation {
    op.description("Apply a point operation to a member and append it to the history.")
        .tag("points")
        .response::<200, Json<ApiResponse<BalanceDto>>>()
        .response_with::<400, (), _>(|res| {
            res.description("Missing fields or insufficient point balance!")
        })
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<404, (), _>(|res| res.description("The requested member does not exist!"))
        .security_requirement("SessionToken")
}

async fn list_history(
    mut state: RequestState,
    Path(id): Path<i64>,
) -> ServiceResult<Json<ApiResponse<Vec<LedgerEntryDto>>>> {
    state.session_require()?;

    if state.db.get_member_by_id(id).await?.is_none() {
        return Err(ServiceError::NotFound);
    }

    let history = state.db.get_history_by_member(id).await?;
    Ok(Json(ApiResponse::data(
        history.iter().map(|e| e.into()).collect(),
    )))
}

fn list_history_docs(op: TransformOperation) -> TransformOperation {
    op.description("List the 50 most recent point operations of a member, newest first.")
        .tag("points")
        .response::<200, Json<ApiResponse<Vec<LedgerEntryDto>>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<404, (), _>(|res| res.description("The requested member does not exist!"))
        .security_requirement("SessionToken")
}
