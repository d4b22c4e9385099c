use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{non_blank, parse_limit, summary::invalidate_summary, DEFAULT_LIST_LIMIT};
use crate::{
    db::{is_unique_violation, timed, STORE_TIMEOUT},
    entities::member,
    error::AppError,
    response::{ok, ApiResult},
    AppState,
};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateMemberRequest {
    pub name: String,
    pub phone: String,
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: i32,
    pub name: String,
    pub phone: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

impl From<member::Model> for MemberResponse {
    fn from(model: member::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            phone: model.phone,
            channel: model.channel,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListMembersQuery {
    /// Substring of the name or phone
    pub q: Option<String>,
    /// Page size, 1 to 100 (default 20)
    pub limit: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/members",
    tag = "Members",
    request_body = CreateMemberRequest,
    responses(
        (status = 200, description = "Created member in the envelope; failures carry code 400 or 500", body = MemberResponse)
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    payload: Result<Json<CreateMemberRequest>, JsonRejection>,
) -> ApiResult<MemberResponse> {
    let Json(req) = payload.map_err(|_| AppError::invalid("invalid member payload"))?;

    let name = req.name.trim();
    let phone = req.phone.trim();
    let channel = req.channel.trim();
    if name.is_empty() || phone.is_empty() || channel.is_empty() {
        return Err(AppError::invalid("name, phone and channel are required"));
    }

    let model = member::ActiveModel {
        name: Set(name.to_string()),
        phone: Set(phone.to_string()),
        channel: Set(channel.to_string()),
        ..Default::default()
    };
    let created = timed(STORE_TIMEOUT, model.insert(&state.db))
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::invalid("phone already exists")
            } else {
                AppError::store("create member failed")(e)
            }
        })?;

    invalidate_summary(&state).await;
    info!(member_id = created.id, channel = %created.channel, "member created");
    ok(created.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/members",
    tag = "Members",
    params(ListMembersQuery),
    responses(
        (status = 200, description = "Members, newest first", body = Vec<MemberResponse>)
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    Query(params): Query<ListMembersQuery>,
) -> ApiResult<Vec<MemberResponse>> {
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIST_LIMIT);

    let mut query = member::Entity::find()
        .order_by_desc(member::Column::Id)
        .limit(limit);
    if let Some(keyword) = non_blank(params.q.as_deref()) {
        query = query.filter(
            Condition::any()
                .add(member::Column::Name.contains(keyword.as_str()))
                .add(member::Column::Phone.contains(keyword.as_str())),
        );
    }

    let members = timed(STORE_TIMEOUT, query.all(&state.db))
        .await
        .map_err(AppError::store("list members failed"))?;

    ok(members.into_iter().map(MemberResponse::from).collect())
}
