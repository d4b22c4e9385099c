use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use thiserror::Error;

use crate::response::Envelope;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input, unknown references and uniqueness conflicts.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    /// A store query failed or timed out. Only `context` reaches the client.
    #[error("{context}")]
    Store {
        context: &'static str,
        #[source]
        source: DbErr,
    },

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidRequest(msg.into())
    }

    pub fn unauthorized() -> Self {
        AppError::Unauthorized("unauthorized".to_string())
    }

    /// Builds a mapper for `map_err` that tags a store failure with the message
    /// the client will see.
    pub fn store(context: &'static str) -> impl FnOnce(DbErr) -> AppError {
        move |source| AppError::Store { context, source }
    }

    /// Status-like code embedded in the envelope.
    pub fn code(&self) -> u16 {
        match self {
            AppError::InvalidRequest(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::Store { .. } | AppError::Internal(_) => 500,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Store { context, source } => {
                tracing::error!(error = %source, "{}", context);
            }
            AppError::Internal(msg) => tracing::error!("{}", msg),
            _ => tracing::debug!(code = self.code(), "request rejected: {}", self),
        }

        let body = Json(Envelope::failure(self.code(), self.to_string()));
        (StatusCode::OK, body).into_response()
    }
}
