//! HTTP Fetcher (spec.md §4.1): issues GET requests over TLS with an
//! optional verification toggle and returns raw text bodies. Carries no
//! process-wide state — the TLS-verification flag lives on this struct
//! rather than as a global, per spec.md §9's design note.

use std::time::Duration;

use crate::error::{OidfError, Result};

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub verify_tls: bool,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            user_agent: concat!("oidf-trust-explorer/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A single HTTP client shared for the lifetime of one invocation
/// (spec.md §5). Cheap to clone: `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| OidfError::Malformed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::warn!(url, error = %e, "request failed");
            OidfError::NetworkFailure { url: url.to_string(), source: e }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url, %status, "non-2xx response");
            return Err(OidfError::HttpFailure { url: url.to_string(), status: status.as_u16() });
        }

        response
            .text()
            .await
            .map_err(|e| OidfError::NetworkFailure { url: url.to_string(), source: e })
    }

    /// Tries each URL in order, returning the first successful response
    /// (spec.md §4.4's "prefer a 200 on the first" wire variant rule).
    pub async fn fetch_first_ok(&self, urls: &[String]) -> Result<String> {
        let mut last_err = None;
        for url in urls {
            match self.fetch_text(url).await {
                Ok(body) => return Ok(body),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| OidfError::Malformed("no URLs to fetch".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_text_returns_body_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let body = fetcher.fetch_text(&format!("{}/ok", server.uri())).await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn fetch_text_surfaces_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let err = fetcher.fetch_text(&format!("{}/missing", server.uri())).await.unwrap_err();
        assert!(matches!(err, OidfError::HttpFailure { status: 404, .. }));
    }

    #[tokio::test]
    async fn fetch_first_ok_tries_second_url_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("found"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let urls = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
        assert_eq!(fetcher.fetch_first_ok(&urls).await.unwrap(), "found");
    }
}
