use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{parse_limit, summary::invalidate_summary, DEFAULT_LIST_LIMIT};
use crate::{
    db::{is_unique_violation, timed, STORE_TIMEOUT},
    entities::{member, order, OrderStatus},
    error::AppError,
    response::{ok, ApiResult},
    AppState,
};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Generated as `ORD-{memberId}-{unix nanos}` when blank
    pub order_no: String,
    pub member_id: i64,
    pub amount_cents: i64,
    /// `pending`, `paid` (default) or `refunded`
    pub status: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i32,
    pub order_no: String,
    pub member_id: i32,
    pub member_name: String,
    pub amount_cents: i64,
    pub status: OrderStatus,
    pub source: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OrderResponse {
    fn new(model: order::Model, member_name: String) -> Self {
        Self {
            id: model.id,
            order_no: model.order_no,
            member_id: model.member_id,
            member_name,
            amount_cents: model.amount_cents,
            status: model.status,
            source: model.source,
            paid_at: model.paid_at,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    /// Only orders of this member; ignored unless a positive integer
    pub member_id: Option<String>,
    /// Page size, 1 to 100 (default 20)
    pub limit: Option<String>,
}

fn generate_order_no(member_id: i64, now: DateTime<Utc>) -> String {
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1_000);
    format!("ORD-{member_id}-{nanos}")
}

/// Inserts `model` if member `member_id` exists, returning the order and the
/// member's name. `None` means the member is unknown and nothing was written.
async fn insert_for_member(
    db: &DatabaseConnection,
    member_id: i32,
    model: order::ActiveModel,
) -> Result<Option<(order::Model, String)>, DbErr> {
    let Some(owner) = member::Entity::find_by_id(member_id).one(db).await? else {
        return Ok(None);
    };
    let created = model.insert(db).await?;
    Ok(Some((created, owner.name)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "Orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Created order with its member name; failures carry code 400 or 500", body = OrderResponse)
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let Json(req) = payload.map_err(|_| AppError::invalid("invalid order payload"))?;

    let source = req.source.trim();
    let status = req.status.trim().to_lowercase();
    let order_no = req.order_no.trim();

    if req.member_id <= 0 || req.amount_cents <= 0 || source.is_empty() {
        return Err(AppError::invalid(
            "memberId, amountCents and source are required",
        ));
    }
    let status = if status.is_empty() {
        OrderStatus::Paid
    } else {
        OrderStatus::parse(&status)
            .ok_or_else(|| AppError::invalid("status must be pending, paid or refunded"))?
    };

    let now = Utc::now();
    let order_no = if order_no.is_empty() {
        generate_order_no(req.member_id, now)
    } else {
        order_no.to_string()
    };

    // Ids beyond i32 cannot exist in the table.
    let member_id =
        i32::try_from(req.member_id).map_err(|_| AppError::invalid("member not found"))?;
    let model = order::ActiveModel {
        order_no: Set(order_no),
        member_id: Set(member_id),
        amount_cents: Set(req.amount_cents),
        status: Set(status),
        source: Set(source.to_string()),
        paid_at: Set((status == OrderStatus::Paid).then_some(now)),
        ..Default::default()
    };
    // One deadline covers both the member lookup and the insert.
    let (created, member_name) = timed(STORE_TIMEOUT, insert_for_member(&state.db, member_id, model))
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::invalid("orderNo already exists")
            } else {
                AppError::store("create order failed")(e)
            }
        })?
        .ok_or_else(|| AppError::invalid("member not found"))?;

    invalidate_summary(&state).await;
    info!(
        order_id = created.id,
        member_id = created.member_id,
        status = created.status.as_str(),
        "order created"
    );
    ok(OrderResponse::new(created, member_name))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "Orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders, newest first", body = Vec<OrderResponse>)
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersQuery>,
) -> ApiResult<Vec<OrderResponse>> {
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIST_LIMIT);
    let member_id = params
        .member_id
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|id| *id > 0);

    let mut query = order::Entity::find()
        .find_also_related(member::Entity)
        .order_by_desc(order::Column::Id)
        .limit(limit);
    if let Some(member_id) = member_id {
        query = query.filter(order::Column::MemberId.eq(member_id));
    }

    let rows = timed(STORE_TIMEOUT, query.all(&state.db))
        .await
        .map_err(AppError::store("list orders failed"))?;

    ok(rows
        .into_iter()
        .map(|(order, owner)| {
            let member_name = owner.map(|m| m.name).unwrap_or_default();
            OrderResponse::new(order, member_name)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_order_number_embeds_member_and_nanos() {
        let at = Utc.timestamp_opt(1_700_000_000, 123).unwrap();
        assert_eq!(generate_order_no(7, at), "ORD-7-1700000000000000123");
    }

    fn paid_order(member_id: i32, order_no: &str) -> order::ActiveModel {
        order::ActiveModel {
            order_no: Set(order_no.to_string()),
            member_id: Set(member_id),
            amount_cents: Set(1500),
            status: Set(OrderStatus::Paid),
            source: Set("wechat".to_string()),
            paid_at: Set(Some(Utc::now())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_for_member_writes_only_for_known_members() {
        let db = crate::db::connect_url("sqlite::memory:").await.unwrap();
        let alice = member::ActiveModel {
            name: Set("Alice".to_string()),
            phone: Set("13900000001".to_string()),
            channel: Set("wechat".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let missing = insert_for_member(&db, alice.id + 1, paid_order(alice.id + 1, "X-1"))
            .await
            .unwrap();
        assert!(missing.is_none());
        assert_eq!(order::Entity::find().all(&db).await.unwrap().len(), 0);

        let (created, name) = insert_for_member(&db, alice.id, paid_order(alice.id, "X-2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name, "Alice");
        assert_eq!(created.order_no, "X-2");
        assert_eq!(created.member_id, alice.id);
    }
}
