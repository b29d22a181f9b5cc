//! Request and response model

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the page issued the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Loading a full HTML document
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// Response tainting, as the browser reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response
    #[default]
    Basic,
    /// Cross-origin response received with CORS
    Cors,
    /// Cross-origin response whose contents are hidden
    Opaque,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
        }
    }
}

/// An intercepted outgoing request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub mode: RequestMode,
    pub body: Bytes,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            mode: RequestMode::default(),
            body: Bytes::new(),
        }
    }

    /// A plain subresource GET
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A top-level document load
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_header(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether the `Accept` header asks for an HTML document
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("text/html"))
    }
}

/// A response received from the network or rebuilt from the cache
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub response_type: ResponseType,
}

impl FetchResponse {
    /// Status in the 200-299 range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }

    /// Headers as owned pairs, dropping values that are not valid UTF-8
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }

    /// Rebuild a header map from stored pairs, skipping invalid ones
    pub fn headers_from_pairs(pairs: &[(String, String)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_accepts_html() {
        let url = Url::parse("http://localhost:3000/chat").unwrap();
        let request = FetchRequest::navigate(url.clone());
        assert!(request.is_navigation());
        assert!(request.accepts_html());

        let request = FetchRequest::get(url)
            .with_header(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!request.is_navigation());
        assert!(!request.accepts_html());
    }

    #[test]
    fn test_header_pairs_round_trip() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/css"));
        headers.append("x-cache", HeaderValue::from_static("miss"));

        let response = FetchResponse {
            url: Url::parse("http://localhost:3000/style.css").unwrap(),
            status: 200,
            headers,
            body: Bytes::new(),
            response_type: ResponseType::Basic,
        };

        let pairs = response.header_pairs();
        let rebuilt = FetchResponse::headers_from_pairs(&pairs);
        assert_eq!(rebuilt.get(CONTENT_TYPE).unwrap(), "text/css");
        assert_eq!(rebuilt.get("x-cache").unwrap(), "miss");
        assert_eq!(response.content_type().as_deref(), Some("text/css"));
        assert!(response.ok());
    }
}
