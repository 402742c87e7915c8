use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag every request with an id, reusing the caller's `x-request-id` when it is usable.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_success() || status.is_redirection() {
        debug!(
            target: "shopkeep::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            request_id = %request_id,
            "request served"
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    log_failure(&method, &path, status, elapsed_ms, &request_id, report);
    response
}

fn log_failure(
    method: &Method,
    path: &str,
    status: StatusCode,
    elapsed_ms: u64,
    request_id: &str,
    report: Option<ErrorReport>,
) {
    let (source, chain) = report
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = chain.first().map(String::as_str).unwrap_or("no diagnostic");

    if status.is_server_error() {
        error!(
            target: "shopkeep::http::response",
            status = status.as_u16(),
            %method,
            path,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id,
            "request failed"
        );
    } else {
        warn!(
            target: "shopkeep::http::response",
            status = status.as_u16(),
            %method,
            path,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id,
            "client request error"
        );
    }
}
