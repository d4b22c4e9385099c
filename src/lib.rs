pub mod auth;
pub mod cache;
pub mod config;
pub mod cors;
pub mod db;
pub mod entities;
pub mod error;
pub mod reports;
pub mod response;
pub mod routes;

use std::{
    sync::{atomic::AtomicU64, Arc},
    time::Duration,
};

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::{DatabaseConnection, DbErr};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;
use utoipa::OpenApi;

use crate::{
    auth::SessionStore,
    cache::{Cache, LocalCache},
    config::Config,
    routes::{auth as auth_routes, campaigns, followups, members, orders, reports as report_routes, summary},
};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a handler may touch. Cheap to clone; the members are shared.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub cache: Arc<dyn Cache>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<Config>,
    /// Bumped on every summary invalidation in this process.
    pub summary_generation: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, cache: Arc<dyn Cache>, config: Config) -> Self {
        let sessions = SessionStore::with_ttl_secs(config.session_ttl_secs);
        Self {
            db,
            cache,
            sessions: Arc::new(sessions),
            config: Arc::new(config),
            summary_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Migrated in-memory SQLite with the local cache; used by tests and
    /// throwaway instances.
    pub async fn in_memory() -> Result<Self, DbErr> {
        let db = db::connect_url("sqlite::memory:").await?;
        Ok(Self::new(db, Arc::new(LocalCache::new()), Config::local_in_memory()))
    }
}

#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Health",
    responses(
        (status = 200, description = "Database and cache reachable"),
        (status = 500, description = "Database or cache unreachable")
    )
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = db::timed(HEALTH_TIMEOUT, state.db.ping()).await {
        error!("health check: database ping failed: {e}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": "database ping failed" })),
        );
    }

    let cache_ok = matches!(
        tokio::time::timeout(HEALTH_TIMEOUT, state.cache.ping()).await,
        Ok(Ok(()))
    );
    if !cache_ok {
        error!("health check: {} cache ping failed", state.cache.backend_name());
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": "cache ping failed" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "env": state.config.env,
            "db": state.config.database_driver(),
            "cache": state.cache.backend_name(),
        })),
    )
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Merchant Ops Hub API",
        version = "0.1.0",
        description = "Members, orders, campaigns and business reports for a small merchant. \
                       Every /api response is a {code, msg, data} envelope sent with HTTP 200."
    ),
    paths(
        health_check,
        members::create_member,
        members::list_members,
        orders::create_order,
        orders::list_orders,
        campaigns::create_campaign,
        campaigns::list_campaigns,
        followups::list_followups,
        report_routes::campaign_attribution,
        report_routes::export_campaign_attribution,
        summary::get_summary,
        auth_routes::login,
        auth_routes::logout,
        auth_routes::user_info,
        auth_routes::user_list,
        auth_routes::role_list,
        auth_routes::system_menus,
    ),
    components(schemas(
        members::CreateMemberRequest,
        members::MemberResponse,
        orders::CreateOrderRequest,
        orders::OrderResponse,
        campaigns::CreateCampaignRequest,
        campaigns::CampaignResponse,
        followups::FollowupResponse,
        report_routes::AttributionResponse,
        reports::Summary,
        reports::ChannelCount,
        reports::AttributionRow,
        reports::FollowupCandidate,
        entities::OrderStatus,
        entities::CampaignStatus,
        auth_routes::LoginRequest,
        auth_routes::LoginResponse,
        auth::AuthSession,
        auth::directory::UserListItem,
        auth::directory::RoleListItem,
        auth::menus::MenuRoute,
        auth::menus::MenuMeta,
        auth::menus::AuthMark,
    ))
)]
pub struct ApiDoc;

/// Builds the router with every route and middleware applied.
pub fn create_app(state: AppState) -> Router {
    let allow_origin = cors::allow_origin(&state.config.cors_allow_origin);

    let api_routes = Router::new()
        .route("/members", post(members::create_member).get(members::list_members))
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route(
            "/campaigns",
            post(campaigns::create_campaign).get(campaigns::list_campaigns),
        )
        .route("/followups", get(followups::list_followups))
        .route(
            "/reports/campaign-attribution",
            get(report_routes::campaign_attribution),
        )
        .route(
            "/reports/campaign-attribution/export",
            get(report_routes::export_campaign_attribution),
        )
        .route("/summary", get(summary::get_summary));

    let session_routes = Router::new()
        .route("/api/auth/login", post(auth_routes::login))
        .route("/api/auth/logout", post(auth_routes::logout))
        .route("/api/user/info", get(auth_routes::user_info))
        .route("/api/user/list", get(auth_routes::user_list))
        .route("/api/role/list", get(auth_routes::role_list))
        .route("/api/v3/system/menus", get(auth_routes::system_menus));

    Router::new()
        .route("/healthz", get(health_check))
        .route("/api-doc/openapi.json", get(openapi_json))
        .nest("/api/v1", api_routes)
        .merge(session_routes)
        .layer(middleware::from_fn_with_state(allow_origin, cors::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
