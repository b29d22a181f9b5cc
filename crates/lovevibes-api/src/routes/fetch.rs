//! Fetch interception
//!
//! Every request that is not a `/_worker` route is a fetch event against the
//! application origin.

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use lovevibes_core::{Action, FetchOutcome};
use lovevibes_fetch::{FetchRequest, FetchResponse, RequestMode};
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::state::AppState;

/// Response header naming where the answer came from
pub const SOURCE_HEADER: &str = "x-lovevibes-source";

const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::HOST,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Fallback handler: run the request through the interceptor
pub async fn intercept(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let url = origin_url(&state.worker.config().origin, uri.path(), uri.query());

    let mode = request_mode(&method, &headers);
    let mut request = FetchRequest::new(method, url).with_mode(mode).with_body(body);
    request.headers = strip_hop_by_hop(headers);

    let FetchOutcome { action, wait_until } = state.worker.handle_fetch(request.clone()).await;
    let kind = action.kind();
    debug!("{} {} -> {}", request.method, request.url, kind);
    metrics::counter!("lovevibes_fetch_total", "outcome" => kind).increment(1);

    if wait_until.pending() > 0 {
        tokio::spawn(async move {
            // Failures are logged by the task set itself
            let _ = wait_until.finish().await;
        });
    }

    match action {
        Action::ServeCached(response) | Action::ServeFallback(response) => {
            Ok(into_http(response, kind))
        }
        Action::ServeNetwork { response, .. } => Ok(into_http(response, kind)),
        Action::PassThrough => {
            let response = state
                .worker
                .pass_through(&request)
                .await
                .map_err(|e| ApiError::Upstream(e.to_string()))?;
            Ok(into_http(response, kind))
        }
        Action::NoOp => Err(ApiError::NoResponse(request.url.to_string())),
    }
}

/// Point the origin at a request target
///
/// Only the path and query are taken from the target, so a target such as
/// `//other.host/x` stays a path on the origin.
pub(crate) fn origin_url(origin: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = origin.clone();
    url.set_path(path);
    url.set_query(query);
    url
}

/// Derive the request mode from fetch metadata headers
///
/// Without `Sec-Fetch-Mode`, a GET asking for HTML counts as a navigation.
fn request_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    let declared = headers
        .get("sec-fetch-mode")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase());

    match declared.as_deref() {
        Some("navigate") => RequestMode::Navigate,
        Some("same-origin") => RequestMode::SameOrigin,
        Some("no-cors") => RequestMode::NoCors,
        Some(_) => RequestMode::Cors,
        None => {
            let wants_html = headers
                .get(header::ACCEPT)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("text/html"));
            if method == Method::GET && wants_html {
                RequestMode::Navigate
            } else {
                RequestMode::Cors
            }
        }
    }
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}

fn into_http(response: FetchResponse, source: &'static str) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut http_response = (status, response.body).into_response();
    let headers = http_response.headers_mut();
    for (name, value) in strip_hop_by_hop(response.headers).iter() {
        headers.append(name.clone(), value.clone());
    }
    headers.insert(SOURCE_HEADER, HeaderValue::from_static(source));

    http_response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_url_keeps_origin_host() {
        let origin = Url::parse("http://localhost:3000").unwrap();

        let url = origin_url(&origin, "/chat/42", Some("ref=push"));
        assert_eq!(url.as_str(), "http://localhost:3000/chat/42?ref=push");

        let url = origin_url(&origin, "//evil.example/steal", Some("x=1"));
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(3000));
        assert_eq!(url.path(), "//evil.example/steal");
    }

    #[test]
    fn test_request_mode() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_mode(&Method::GET, &headers), RequestMode::Cors);

        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html,*/*"));
        assert_eq!(request_mode(&Method::GET, &headers), RequestMode::Navigate);
        assert_eq!(request_mode(&Method::POST, &headers), RequestMode::Cors);

        headers.insert("sec-fetch-mode", HeaderValue::from_static("no-cors"));
        assert_eq!(request_mode(&Method::GET, &headers), RequestMode::NoCors);

        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        assert_eq!(request_mode(&Method::GET, &headers), RequestMode::Navigate);
    }
}
