use axum::extract::{Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{non_blank, parse_bounded, parse_limit};
use crate::{
    db::{timed, STORE_TIMEOUT},
    error::AppError,
    reports::{self, FollowupCandidate, FollowupFilter},
    response::{ok, ApiResult},
    AppState,
};

const DEFAULT_DAYS: i64 = 30;
const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FollowupQuery {
    /// Inactivity threshold in days, 1 to 365 (default 30)
    pub days: Option<String>,
    pub channel: Option<String>,
    /// 1 to 100 (default 50)
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowupResponse {
    pub days_window: i64,
    pub items: Vec<FollowupCandidate>,
}

#[utoipa::path(
    get,
    path = "/api/v1/followups",
    tag = "Reports",
    params(FollowupQuery),
    responses(
        (status = 200, description = "Single-purchase and lapsed members, least recently active first", body = FollowupResponse)
    )
)]
pub async fn list_followups(
    State(state): State<AppState>,
    Query(params): Query<FollowupQuery>,
) -> ApiResult<FollowupResponse> {
    let filter = FollowupFilter {
        days: parse_bounded(params.days.as_deref(), DEFAULT_DAYS, 1, 365),
        channel: non_blank(params.channel.as_deref()),
        limit: parse_limit(params.limit.as_deref(), DEFAULT_LIMIT),
    };

    let items = timed(
        STORE_TIMEOUT,
        reports::followup_candidates(&state.db, &filter, Utc::now()),
    )
    .await
    .map_err(AppError::store("list followups failed"))?;

    ok(FollowupResponse {
        days_window: filter.days,
        items,
    })
}
