//! Read-only business metrics computed from members, orders and campaigns.
//!
//! Every function here issues plain aggregate queries and shapes the result;
//! none of them write. Rates follow one rule, see [`percentage`].

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::{Alias, Expr, Func, Query, SelectStatement, SimpleExpr},
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{
    campaign, member, order, CampaignStatus, OrderStatus,
};

/// `numerator / denominator` as a percentage with two decimals, or 0 when
/// there is nothing to divide by.
pub fn percentage(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    ((numerator as f64 / denominator as f64) * 10000.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub member_count: i64,
    pub order_count: i64,
    pub paid_order_count: i64,
    /// Sum of paid order amounts, minor units
    pub revenue_cents: i64,
    /// Members with two or more paid orders
    pub repurchase_count: i64,
    /// Repurchasers over all members, percent
    pub repurchase_rate: f64,
    pub active_campaign_count: i64,
    /// Member count per channel, largest first
    pub channel_breakdown: Vec<ChannelCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCount {
    pub channel: String,
    pub member_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AttributionFilter {
    pub status: Option<CampaignStatus>,
    pub channel: Option<String>,
    /// Substring of the campaign name
    pub keyword: Option<String>,
    /// Lower bound on campaign creation time
    pub from: Option<DateTime<Utc>>,
    /// Upper bound on campaign creation time
    pub to: Option<DateTime<Utc>>,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttributionRow {
    pub campaign_id: i32,
    pub campaign_name: String,
    pub channel: String,
    pub status: CampaignStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// Members acquired through the campaign's channel
    pub target_member_count: i64,
    /// Paid orders from the channel inside the campaign window
    pub paid_order_count: i64,
    /// Distinct members behind those orders
    pub converted_member_count: i64,
    /// Converted members who are also lifetime repurchasers
    pub repurchase_converted_count: i64,
    pub revenue_cents: i64,
    /// Converted over target members, percent
    pub conversion_rate: f64,
}

#[derive(Debug, Clone)]
pub struct FollowupFilter {
    /// Inactivity threshold in days
    pub days: i64,
    pub channel: Option<String>,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowupCandidate {
    pub member_id: i32,
    pub member_name: String,
    pub phone: String,
    pub channel: String,
    pub paid_order_count: i64,
    pub paid_amount_cents: i64,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub days_since_last_pay: i64,
}

#[derive(Debug, FromQueryResult)]
struct FollowupRow {
    member_id: i32,
    member_name: String,
    phone: String,
    channel: String,
    paid_order_count: i64,
    paid_amount_cents: i64,
    last_paid_at: Option<DateTime<Utc>>,
}

fn is_paid() -> SimpleExpr {
    order::Column::Status.eq(OrderStatus::Paid)
}

/// `CAST(COALESCE(SUM(orders.amount_cents), 0) AS BIGINT)`. Postgres widens
/// `SUM(bigint)` to numeric, hence the cast.
fn amount_sum() -> SimpleExpr {
    Func::cast_as(
        Func::coalesce([
            Expr::col((order::Entity, order::Column::AmountCents)).sum(),
            Expr::val(0).into(),
        ]),
        Alias::new("BIGINT"),
    )
    .into()
}

async fn sum_amount(db: &DatabaseConnection, orders: Select<order::Entity>) -> Result<i64, DbErr> {
    let total = orders
        .select_only()
        .column_as(amount_sum(), "revenue_cents")
        .into_tuple::<i64>()
        .one(db)
        .await?;
    Ok(total.unwrap_or(0))
}

async fn count_distinct_members(
    db: &DatabaseConnection,
    orders: Select<order::Entity>,
) -> Result<i64, DbErr> {
    let count = orders
        .select_only()
        .column_as(
            Expr::col((order::Entity, order::Column::MemberId)).count_distinct(),
            "member_count",
        )
        .into_tuple::<i64>()
        .one(db)
        .await?;
    Ok(count.unwrap_or(0))
}

/// Ids of members with at least two paid orders.
fn repurchasers() -> SelectStatement {
    Query::select()
        .column(order::Column::MemberId)
        .from(order::Entity)
        .and_where(is_paid())
        .group_by_col(order::Column::MemberId)
        .and_having(Expr::expr(Expr::col(order::Column::Id).count()).gte(2))
        .to_owned()
}

#[tracing::instrument(skip(db))]
pub async fn summary(db: &DatabaseConnection) -> Result<Summary, DbErr> {
    let member_count = member::Entity::find().count(db).await? as i64;
    let order_count = order::Entity::find().count(db).await? as i64;
    let active_campaign_count = campaign::Entity::find()
        .filter(campaign::Column::Status.eq(CampaignStatus::Active))
        .count(db)
        .await? as i64;

    let paid_orders = order::Entity::find().filter(is_paid());
    let paid_order_count = paid_orders.clone().count(db).await? as i64;
    let revenue_cents = sum_amount(db, paid_orders).await?;

    // Counted as a subquery: SELECT COUNT(*) FROM (<grouped select>)
    let repurchase_count = order::Entity::find()
        .select_only()
        .column(order::Column::MemberId)
        .filter(is_paid())
        .group_by(order::Column::MemberId)
        .having(Expr::expr(Expr::col((order::Entity, order::Column::Id)).count()).gte(2))
        .count(db)
        .await? as i64;

    let channel_breakdown = channel_breakdown(db).await?;

    Ok(Summary {
        member_count,
        order_count,
        paid_order_count,
        revenue_cents,
        repurchase_count,
        repurchase_rate: percentage(repurchase_count, member_count),
        active_campaign_count,
        channel_breakdown,
    })
}

async fn channel_breakdown(db: &DatabaseConnection) -> Result<Vec<ChannelCount>, DbErr> {
    let member_count = Expr::col((member::Entity, member::Column::Id)).count();
    member::Entity::find()
        .select_only()
        .column(member::Column::Channel)
        .column_as(member_count.clone(), "member_count")
        .group_by(member::Column::Channel)
        .order_by_desc(member_count)
        .order_by_asc(member::Column::Channel)
        .into_model::<ChannelCount>()
        .all(db)
        .await
}

/// Paid orders from the campaign's channel, inside whichever window bounds
/// the campaign has.
fn attributed_orders(campaign: &campaign::Model) -> Condition {
    let mut scope = Condition::all()
        .add(is_paid())
        .add(order::Column::Source.eq(campaign.channel.as_str()));
    if let Some(start_at) = campaign.start_at {
        scope = scope.add(order::Column::PaidAt.gte(start_at));
    }
    if let Some(end_at) = campaign.end_at {
        scope = scope.add(order::Column::PaidAt.lte(end_at));
    }
    scope
}

/// One row per matching campaign, newest campaign first.
///
/// Each campaign costs five aggregate queries. That is fine for the handful
/// of campaigns a small merchant runs; the report is capped at 100 rows.
#[tracing::instrument(skip(db))]
pub async fn campaign_attribution(
    db: &DatabaseConnection,
    filter: &AttributionFilter,
) -> Result<Vec<AttributionRow>, DbErr> {
    let mut query = campaign::Entity::find()
        .order_by_desc(campaign::Column::Id)
        .limit(filter.limit);
    if let Some(status) = filter.status {
        query = query.filter(campaign::Column::Status.eq(status));
    }
    if let Some(channel) = &filter.channel {
        query = query.filter(campaign::Column::Channel.eq(channel.as_str()));
    }
    if let Some(keyword) = &filter.keyword {
        query = query.filter(campaign::Column::Name.contains(keyword.as_str()));
    }
    if let Some(from) = filter.from {
        query = query.filter(campaign::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(campaign::Column::CreatedAt.lte(to));
    }

    let campaigns = query.all(db).await?;
    tracing::debug!("attributing {} campaigns", campaigns.len());

    let mut rows = Vec::with_capacity(campaigns.len());
    for campaign in campaigns {
        rows.push(attribute(db, campaign).await?);
    }
    Ok(rows)
}

async fn attribute(db: &DatabaseConnection, campaign: campaign::Model) -> Result<AttributionRow, DbErr> {
    let target_member_count = member::Entity::find()
        .filter(member::Column::Channel.eq(campaign.channel.as_str()))
        .count(db)
        .await? as i64;

    let scope = attributed_orders(&campaign);
    let paid_order_count = order::Entity::find()
        .filter(scope.clone())
        .count(db)
        .await? as i64;
    let revenue_cents = sum_amount(db, order::Entity::find().filter(scope.clone())).await?;
    let converted_member_count =
        count_distinct_members(db, order::Entity::find().filter(scope.clone())).await?;
    let repurchase_converted_count = count_distinct_members(
        db,
        order::Entity::find()
            .filter(scope)
            .filter(order::Column::MemberId.in_subquery(repurchasers())),
    )
    .await?;

    Ok(AttributionRow {
        campaign_id: campaign.id,
        campaign_name: campaign.name,
        channel: campaign.channel,
        status: campaign.status,
        start_at: campaign.start_at,
        end_at: campaign.end_at,
        target_member_count,
        paid_order_count,
        converted_member_count,
        repurchase_converted_count,
        revenue_cents,
        conversion_rate: percentage(converted_member_count, target_member_count),
    })
}

/// Members worth reaching out to: those who bought exactly once, and those
/// whose latest paid order is at least `filter.days` old. Members who never
/// paid are not candidates. Least recently active first.
#[tracing::instrument(skip(db))]
pub async fn followup_candidates(
    db: &DatabaseConnection,
    filter: &FollowupFilter,
    now: DateTime<Utc>,
) -> Result<Vec<FollowupCandidate>, DbErr> {
    let cutoff = now - Duration::days(filter.days);
    let paid_order_count = Expr::col((order::Entity, order::Column::Id)).count();
    let last_paid_at = Expr::col((order::Entity, order::Column::PaidAt)).max();

    let mut query = member::Entity::find()
        .select_only()
        .column_as(member::Column::Id, "member_id")
        .column_as(member::Column::Name, "member_name")
        .column(member::Column::Phone)
        .column(member::Column::Channel)
        .column_as(paid_order_count.clone(), "paid_order_count")
        .column_as(amount_sum(), "paid_amount_cents")
        .column_as(last_paid_at.clone(), "last_paid_at")
        .join(JoinType::InnerJoin, member::Relation::Order.def())
        .filter(is_paid())
        .group_by(member::Column::Id)
        .group_by(member::Column::Name)
        .group_by(member::Column::Phone)
        .group_by(member::Column::Channel)
        .having(
            Condition::any()
                .add(Expr::expr(paid_order_count).eq(1))
                .add(Expr::expr(last_paid_at.clone()).lte(cutoff)),
        )
        .order_by_asc(last_paid_at)
        .order_by_asc(member::Column::Id)
        .limit(filter.limit);
    if let Some(channel) = &filter.channel {
        query = query.filter(member::Column::Channel.eq(channel.as_str()));
    }

    let rows = query.into_model::<FollowupRow>().all(db).await?;

    Ok(rows
        .into_iter()
        .map(|row| FollowupCandidate {
            days_since_last_pay: row
                .last_paid_at
                .map(|paid_at| (now - paid_at).num_days().max(0))
                .unwrap_or(0),
            member_id: row.member_id,
            member_name: row.member_name,
            phone: row.phone,
            channel: row.channel,
            paid_order_count: row.paid_order_count,
            paid_amount_cents: row.paid_amount_cents,
            last_paid_at: row.last_paid_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(1, 2), 50.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn percentage_of_empty_denominator_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn attribution_scope_only_bounds_present_window_edges() {
        let now = Utc::now();
        let open = campaign::Model {
            id: 1,
            name: "Open".to_string(),
            channel: "wechat".to_string(),
            discount_pct: 10.0,
            status: CampaignStatus::Active,
            start_at: None,
            end_at: None,
            created_at: now,
            updated_at: now,
        };
        let bounded = campaign::Model {
            start_at: Some(now - Duration::days(7)),
            end_at: Some(now),
            ..open.clone()
        };

        assert_eq!(attributed_orders(&open).len(), 2);
        assert_eq!(attributed_orders(&bounded).len(), 4);
    }
}
