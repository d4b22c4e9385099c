use axum::{
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Header value for the configured origin, `*` when unset or not a valid
/// header value.
pub fn allow_origin(configured: &str) -> HeaderValue {
    let configured = configured.trim();
    if configured.is_empty() {
        return HeaderValue::from_static("*");
    }
    HeaderValue::from_str(configured).unwrap_or_else(|_| {
        tracing::warn!("CORS origin {configured:?} is not a valid header value, using *");
        HeaderValue::from_static("*")
    })
}

/// Adds the CORS headers to every response. Preflight requests never reach
/// the handlers and are answered with 204.
pub async fn cors(State(origin): State<HeaderValue>, request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    response
}
