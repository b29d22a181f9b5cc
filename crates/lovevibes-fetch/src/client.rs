//! Network client

use async_trait::async_trait;
use http::header::{CONNECTION, HOST};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::FetchError;
use crate::types::{FetchRequest, FetchResponse, ResponseType};

/// Something that can take a request to the network
///
/// The worker only ever talks to the network through this trait so that the
/// interception policy can be driven by a fake network in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// HTTP fetcher configuration
#[derive(Clone, Debug)]
pub struct HttpFetcherConfig {
    /// Origin of the application; same-origin responses are `basic`
    pub origin: Url,
    /// User agent sent with every request
    pub user_agent: String,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    config: HttpFetcherConfig,
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!("Created HTTP fetcher for origin {}", config.origin);

        Ok(Self { config, client })
    }

    fn response_type(&self, url: &Url) -> ResponseType {
        if url.origin() == self.config.origin.origin() {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(request.url.to_string()));
        }

        debug!("Fetching {} {}", request.method, request.url);

        let mut headers = request.headers.clone();
        headers.remove(HOST);
        headers.remove(CONNECTION);

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers);

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;

        let url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!("Fetched {} -> {} ({} bytes)", request.url, status, body.len());

        Ok(FetchResponse {
            response_type: self.response_type(&url),
            url,
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(HttpFetcherConfig {
            origin: Url::parse("http://localhost:3000").unwrap(),
            user_agent: "lovevibes-test".to_string(),
            skip_tls_verify: false,
        })
        .unwrap()
    }

    #[test]
    fn test_response_type_by_origin() {
        let fetcher = fetcher();
        let same = Url::parse("http://localhost:3000/index.html").unwrap();
        let cdn =
            Url::parse("https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css")
                .unwrap();

        assert_eq!(fetcher.response_type(&same), ResponseType::Basic);
        assert_eq!(fetcher.response_type(&cdn), ResponseType::Cors);
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let fetcher = fetcher();
        let request = FetchRequest::get(Url::parse("file:///etc/hosts").unwrap());
        assert!(matches!(
            fetcher.fetch(&request).await,
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
