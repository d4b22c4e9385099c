use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{
    non_blank, parse_limit, parse_optional_rfc3339, summary::invalidate_summary,
    DEFAULT_LIST_LIMIT,
};
use crate::{
    db::{timed, STORE_TIMEOUT},
    entities::{campaign, CampaignStatus},
    error::AppError,
    response::{ok, ApiResult},
    AppState,
};

const INVALID_STATUS: &str = "status must be draft, active or closed";

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    pub channel: String,
    /// Percentage off, in (0, 100]
    pub discount_pct: f64,
    /// `draft`, `active` (default) or `closed`
    pub status: String,
    /// RFC 3339, optional
    pub start_at: String,
    /// RFC 3339, optional, not before `startAt`
    pub end_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResponse {
    pub id: i32,
    pub name: String,
    pub channel: String,
    pub discount_pct: f64,
    pub status: CampaignStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<campaign::Model> for CampaignResponse {
    fn from(model: campaign::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            channel: model.channel,
            discount_pct: model.discount_pct,
            status: model.status,
            start_at: model.start_at,
            end_at: model.end_at,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCampaignsQuery {
    /// `draft`, `active` or `closed`
    pub status: Option<String>,
    pub channel: Option<String>,
    /// Page size, 1 to 100 (default 20)
    pub limit: Option<String>,
}

/// Blank means no filter; anything else must name a known status.
pub(crate) fn parse_status_filter(raw: Option<&str>) -> Result<Option<CampaignStatus>, AppError> {
    match non_blank(raw) {
        Some(value) => CampaignStatus::parse(&value.to_lowercase())
            .map(Some)
            .ok_or_else(|| AppError::invalid(INVALID_STATUS)),
        None => Ok(None),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    tag = "Campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 200, description = "Created campaign; failures carry code 400 or 500", body = CampaignResponse)
    )
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    payload: Result<Json<CreateCampaignRequest>, JsonRejection>,
) -> ApiResult<CampaignResponse> {
    let Json(req) = payload.map_err(|_| AppError::invalid("invalid campaign payload"))?;

    let name = req.name.trim();
    let channel = req.channel.trim();
    let status = req.status.trim().to_lowercase();

    if name.is_empty() || channel.is_empty() {
        return Err(AppError::invalid("name and channel are required"));
    }
    if !(req.discount_pct > 0.0 && req.discount_pct <= 100.0) {
        return Err(AppError::invalid("discountPct must be in (0, 100]"));
    }
    let status = if status.is_empty() {
        CampaignStatus::Active
    } else {
        CampaignStatus::parse(&status).ok_or_else(|| AppError::invalid(INVALID_STATUS))?
    };

    let start_at = parse_optional_rfc3339(Some(&req.start_at))
        .map_err(|_| AppError::invalid("startAt must be RFC3339 format"))?;
    let end_at = parse_optional_rfc3339(Some(&req.end_at))
        .map_err(|_| AppError::invalid("endAt must be RFC3339 format"))?;
    if let (Some(start), Some(end)) = (start_at, end_at) {
        if end < start {
            return Err(AppError::invalid("endAt cannot be earlier than startAt"));
        }
    }

    let model = campaign::ActiveModel {
        name: Set(name.to_string()),
        channel: Set(channel.to_string()),
        discount_pct: Set(req.discount_pct),
        status: Set(status),
        start_at: Set(start_at),
        end_at: Set(end_at),
        ..Default::default()
    };
    let created = timed(STORE_TIMEOUT, model.insert(&state.db))
        .await
        .map_err(AppError::store("create campaign failed"))?;

    invalidate_summary(&state).await;
    info!(campaign_id = created.id, channel = %created.channel, "campaign created");
    ok(created.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    tag = "Campaigns",
    params(ListCampaignsQuery),
    responses(
        (status = 200, description = "Campaigns, newest first; an unknown status carries code 400", body = Vec<CampaignResponse>)
    )
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(params): Query<ListCampaignsQuery>,
) -> ApiResult<Vec<CampaignResponse>> {
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIST_LIMIT);
    let status = parse_status_filter(params.status.as_deref())?;

    let mut query = campaign::Entity::find()
        .order_by_desc(campaign::Column::Id)
        .limit(limit);
    if let Some(status) = status {
        query = query.filter(campaign::Column::Status.eq(status));
    }
    if let Some(channel) = non_blank(params.channel.as_deref()) {
        query = query.filter(campaign::Column::Channel.eq(channel));
    }

    let campaigns = timed(STORE_TIMEOUT, query.all(&state.db))
        .await
        .map_err(AppError::store("list campaigns failed"))?;

    ok(campaigns.into_iter().map(CampaignResponse::from).collect())
}
