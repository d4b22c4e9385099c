//! Handlers for the mock admin login. See [`crate::auth`] for what is and is
//! not real here.

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Query, State},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::parse_bounded;
use crate::{
    auth::{
        directory::{paginate, RoleListItem, UserListItem, ROLES, USERS},
        menus::{filter_by_roles, MenuRoute, SYSTEM_MENUS},
        parse_auth_token, resolve_user, AuthSession, MOCK_PASSWORD,
    },
    error::AppError,
    response::{ok, ApiResult},
    AppState,
};

/// Session of the caller, resolved from the `Authorization` header.
/// Rejects with code 401 when the token is missing, unknown or expired.
pub struct CurrentSession {
    pub token: String,
    pub session: AuthSession,
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_auth_token)
            .ok_or_else(AppError::unauthorized)?;
        let session = state
            .sessions
            .lookup(token)
            .ok_or_else(AppError::unauthorized)?;

        Ok(Self {
            token: token.to_string(),
            session,
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page, 1 to 1000 (default 1)
    pub current: Option<String>,
    /// 1 to 200 (default 10)
    pub size: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub current: i64,
    pub size: i64,
    pub total: i64,
}

impl PageQuery {
    fn page_of<T: Clone>(&self, items: &[T]) -> Page<T> {
        let current = parse_bounded(self.current.as_deref(), 1, 1, 1000);
        let size = parse_bounded(self.size.as_deref(), 10, 1, 200);
        Page {
            records: paginate(items, current as usize, size as usize),
            current,
            size,
            total: items.len() as i64,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session tokens; bad credentials carry code 401", body = LoginResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(req) = payload.map_err(|_| AppError::invalid("invalid login payload"))?;

    let user_name = req.user_name.trim();
    let password = req.password.trim();
    if user_name.is_empty() || password.is_empty() {
        return Err(AppError::invalid("userName and password are required"));
    }

    let invalid_credentials = || AppError::Unauthorized("invalid credentials".to_string());
    if password != MOCK_PASSWORD {
        return Err(invalid_credentials());
    }
    let session = resolve_user(user_name).ok_or_else(invalid_credentials)?;

    info!(user = %session.user_name, "mock login");
    let issued = state.sessions.issue(session);
    ok(LoginResponse {
        token: issued.token,
        refresh_token: issued.refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Session dropped; the token stops working"))
)]
pub async fn logout(State(state): State<AppState>, current: CurrentSession) -> ApiResult<Value> {
    state.sessions.revoke(&current.token);
    info!(user = %current.session.user_name, "mock logout");
    ok(json!({}))
}

#[utoipa::path(
    get,
    path = "/api/user/info",
    tag = "Auth",
    responses((status = 200, description = "Profile of the logged-in user", body = AuthSession))
)]
pub async fn user_info(current: CurrentSession) -> ApiResult<AuthSession> {
    ok(current.session)
}

#[utoipa::path(
    get,
    path = "/api/user/list",
    tag = "Auth",
    params(PageQuery),
    responses((status = 200, description = "Page of mock users", body = Page<UserListItem>))
)]
pub async fn user_list(_current: CurrentSession, Query(params): Query<PageQuery>) -> ApiResult<Page<UserListItem>> {
    ok(params.page_of(&USERS))
}

#[utoipa::path(
    get,
    path = "/api/role/list",
    tag = "Auth",
    params(PageQuery),
    responses((status = 200, description = "Page of mock roles", body = Page<RoleListItem>))
)]
pub async fn role_list(_current: CurrentSession, Query(params): Query<PageQuery>) -> ApiResult<Page<RoleListItem>> {
    ok(params.page_of(&ROLES))
}

#[utoipa::path(
    get,
    path = "/api/v3/system/menus",
    tag = "Auth",
    responses((status = 200, description = "Navigation tree visible to the caller's roles", body = Vec<MenuRoute>))
)]
pub async fn system_menus(current: CurrentSession) -> ApiResult<Vec<MenuRoute>> {
    ok(filter_by_roles(&SYSTEM_MENUS, &current.session.roles))
}
