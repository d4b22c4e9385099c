use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppError;

pub const SUCCESS_CODE: u16 = 200;

/// Uniform `{code, msg, data}` wrapper. Business failures travel inside a
/// 200 HTTP response with `code` carrying the status-like value.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub msg: String,
    pub data: T,
}

impl Envelope<Value> {
    pub fn failure(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: json!({}),
        }
    }
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, AppError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        code: SUCCESS_CODE,
        msg: "ok".to_string(),
        data,
    }))
}
