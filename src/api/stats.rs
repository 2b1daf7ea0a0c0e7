use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::Json;
use chrono::{Duration, Local, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::request_state::RequestState;

use super::ApiResponse;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/stats", get_with(get_stats, get_stats_docs))
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct StatsDto {
    pub total_members: i64,
    pub total_points: i64,
    pub today_new: i64,
}

impl From<&models::Stats> for StatsDto {
    fn from(value: &models::Stats) -> Self {
        Self {
            total_members: value.total_members,
            total_points: value.total_points,
            today_new: value.today_new,
        }
    }
}

async fn get_stats(mut state: RequestState) -> ServiceResult<Json<ApiResponse<StatsDto>>> {
    state.session_require()?;

    // "Today" is the local calendar day.
    let day_start = Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|t| t.and_local_timezone(Local).earliest())
        .ok_or_else(|| {
            ServiceError::InternalServerError("could not determine local midnight".to_string())
        })?;
    let day_end = day_start + Duration::days(1);

    let stats = state
        .db
        .get_stats(day_start.with_timezone(&Utc), day_end.with_timezone(&Utc))
        .await?;

    Ok(Json(ApiResponse::data(StatsDto::from(&stats))))
}

fn get_stats_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get member count, total point balance and today's registrations.")
        .tag("stats")
        .response::<200, Json<ApiResponse<StatsDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}
