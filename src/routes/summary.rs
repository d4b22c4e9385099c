use std::{sync::atomic::Ordering, time::Duration};

use axum::extract::State;
use tracing::{debug, warn};

use crate::{
    cache::Cache,
    db::{timed, STORE_TIMEOUT},
    error::AppError,
    reports::{self, Summary},
    response::{ok, ApiResult},
    AppState,
};

pub const SUMMARY_CACHE_KEY: &str = "merchant_ops:summary";
pub const SUMMARY_TTL: Duration = Duration::from_secs(45);

/// Cache faults never fail a request; they only cost a recomputation.
async fn cached_summary(cache: &dyn Cache) -> Option<Summary> {
    let raw = match cache.get(SUMMARY_CACHE_KEY).await {
        Ok(raw) => raw?,
        Err(e) => {
            warn!("summary cache read failed: {e}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!("discarding undecodable cached summary: {e}");
            None
        }
    }
}

/// Writes `summary` unless an invalidation happened since `generation` was
/// read, so a computation that raced a create never repopulates the cache.
async fn store_summary(state: &AppState, generation: u64, summary: &Summary) {
    if state.summary_generation.load(Ordering::SeqCst) != generation {
        debug!("summary went stale while computing, not caching");
        return;
    }
    let encoded = match serde_json::to_string(summary) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("summary encode failed: {e}");
            return;
        }
    };
    if let Err(e) = state.cache.set(SUMMARY_CACHE_KEY, &encoded, SUMMARY_TTL).await {
        warn!("summary cache write failed: {e}");
    }
}

/// Called after every successful create so the next summary read recomputes.
pub(crate) async fn invalidate_summary(state: &AppState) {
    state.summary_generation.fetch_add(1, Ordering::SeqCst);
    if let Err(e) = state.cache.delete(SUMMARY_CACHE_KEY).await {
        warn!("summary cache invalidation failed: {e}");
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/summary",
    tag = "Reports",
    responses(
        (status = 200, description = "Business summary, served from cache for up to 45 seconds", body = Summary)
    )
)]
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Summary> {
    if let Some(summary) = cached_summary(state.cache.as_ref()).await {
        return ok(summary);
    }

    let generation = state.summary_generation.load(Ordering::SeqCst);
    let summary = timed(STORE_TIMEOUT, reports::summary(&state.db))
        .await
        .map_err(AppError::store("summary failed"))?;
    store_summary(&state, generation, &summary).await;

    ok(summary)
}
