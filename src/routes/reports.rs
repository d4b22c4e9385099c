use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{campaigns::parse_status_filter, non_blank, parse_limit, parse_optional_rfc3339, MAX_LIMIT};
use crate::{
    db::{timed, REPORT_TIMEOUT},
    error::AppError,
    reports::{self, AttributionFilter, AttributionRow},
    response::{ok, ApiResult},
    AppState,
};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const CSV_DISPOSITION: &str = "attachment; filename=campaign-attribution.csv";

const CSV_HEADER: [&str; 12] = [
    "campaign_id",
    "campaign_name",
    "channel",
    "status",
    "start_at",
    "end_at",
    "target_member_count",
    "paid_order_count",
    "converted_member_count",
    "repurchase_converted_count",
    "revenue_cents",
    "conversion_rate",
];

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttributionQuery {
    /// `draft`, `active` or `closed`
    pub status: Option<String>,
    pub channel: Option<String>,
    /// Substring of the campaign name
    pub q: Option<String>,
    /// RFC 3339 lower bound on campaign creation
    pub from: Option<String>,
    /// RFC 3339 upper bound on campaign creation
    pub to: Option<String>,
    /// 1 to 100 (default 100)
    pub limit: Option<String>,
}

impl AttributionQuery {
    fn into_filter(self) -> Result<AttributionFilter, AppError> {
        let from = parse_optional_rfc3339(self.from.as_deref())
            .map_err(|_| AppError::invalid("from must be RFC3339 format"))?;
        let to = parse_optional_rfc3339(self.to.as_deref())
            .map_err(|_| AppError::invalid("to must be RFC3339 format"))?;
        if let (Some(from), Some(to)) = (from, to) {
            if to < from {
                return Err(AppError::invalid("to cannot be earlier than from"));
            }
        }

        Ok(AttributionFilter {
            status: parse_status_filter(self.status.as_deref())?,
            channel: non_blank(self.channel.as_deref()),
            keyword: non_blank(self.q.as_deref()),
            from,
            to,
            limit: parse_limit(self.limit.as_deref(), MAX_LIMIT),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttributionResponse {
    pub rows: Vec<AttributionRow>,
}

async fn load_rows(state: &AppState, params: AttributionQuery) -> Result<Vec<AttributionRow>, AppError> {
    let filter = params.into_filter()?;
    timed(
        REPORT_TIMEOUT,
        reports::campaign_attribution(&state.db, &filter),
    )
    .await
    .map_err(AppError::store("campaign attribution failed"))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/campaign-attribution",
    tag = "Reports",
    params(AttributionQuery),
    responses(
        (status = 200, description = "One row per campaign, newest first", body = AttributionResponse)
    )
)]
pub async fn campaign_attribution(
    State(state): State<AppState>,
    Query(params): Query<AttributionQuery>,
) -> ApiResult<AttributionResponse> {
    let rows = load_rows(&state, params).await?;
    ok(AttributionResponse { rows })
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/campaign-attribution/export",
    tag = "Reports",
    params(AttributionQuery),
    responses(
        (status = 200, description = "The attribution rows as a CSV attachment", body = String, content_type = "text/csv")
    )
)]
pub async fn export_campaign_attribution(
    State(state): State<AppState>,
    Query(params): Query<AttributionQuery>,
) -> Result<Response, AppError> {
    let rows = load_rows(&state, params).await?;
    let body = attribution_csv(&rows)?;

    Ok((
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, CSV_DISPOSITION),
        ],
        body,
    )
        .into_response())
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn attribution_csv(rows: &[AttributionRow]) -> Result<String, AppError> {
    let build_failed = |e: &dyn std::fmt::Display| {
        tracing::error!("building attribution csv: {e}");
        AppError::Internal("build csv failed".to_string())
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(|e| build_failed(&e))?;
    for row in rows {
        writer
            .write_record([
                row.campaign_id.to_string(),
                row.campaign_name.clone(),
                row.channel.clone(),
                row.status.as_str().to_string(),
                format_timestamp(row.start_at),
                format_timestamp(row.end_at),
                row.target_member_count.to_string(),
                row.paid_order_count.to_string(),
                row.converted_member_count.to_string(),
                row.repurchase_converted_count.to_string(),
                row.revenue_cents.to_string(),
                format!("{:.2}", row.conversion_rate),
            ])
            .map_err(|e| build_failed(&e))?;
    }

    let bytes = writer.into_inner().map_err(|e| build_failed(&e))?;
    String::from_utf8(bytes).map_err(|e| build_failed(&e))
}
