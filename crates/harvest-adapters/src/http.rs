//! JSON-over-HTTP client with retry.

use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoffBuilder};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::AdapterConfig;
use crate::error::AdapterError;

/// Shared HTTP client for adapters.
///
/// Retries transient failures with exponential backoff up to
/// `max_retries` attempts in total.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &AdapterConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AdapterError::config(e.to_string()))?;

        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
            initial_backoff: config.initial_backoff,
        })
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<T, AdapterError> {
        self.with_retry(url, || {
            let mut request = self
                .client
                .get(url)
                .query(query)
                .header(reqwest::header::ACCEPT, "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
        })
        .await
    }

    /// POST a JSON body and decode a JSON response.
    ///
    /// `label` replaces the URL in log lines, for endpoints that embed a
    /// credential in the path.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        label: &str,
        body: &B,
    ) -> Result<T, AdapterError> {
        self.with_retry(label, || self.client.post(url).json(body)).await
    }

    async fn with_retry<T, F>(&self, url: &str, build: F) -> Result<T, AdapterError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_elapsed_time(Some(Duration::from_secs(120)))
            .build();

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, url = %url, "Sending request");

            match Self::send(build()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempts >= self.max_retries {
                        error!(error = %e, url = %url, attempts, "Request failed");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Request failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AdapterError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::http(
                Some(status.as_u16()),
                format!("{}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| AdapterError::parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Pong {
        ok: bool,
    }

    fn fetcher(max_retries: u32) -> HttpFetcher {
        let mut config = AdapterConfig::default().without_delays();
        config.max_retries = max_retries;
        HttpFetcher::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_json_sends_query_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(query_param("q", "rust"))
            .and(header("X-API-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let pong: Pong = fetcher(1)
            .get_json(
                &format!("{}/ping", server.uri()),
                &[("q", "rust".to_string())],
                &[("X-API-Key", "secret")],
            )
            .await
            .unwrap();
        assert!(pong.ok);
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let pong: Pong = fetcher(3).get_json(&server.uri(), &[], &[]).await.unwrap();
        assert!(pong.ok);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result: Result<Pong, _> = fetcher(3).get_json(&server.uri(), &[], &[]).await;
        assert!(matches!(
            result,
            Err(AdapterError::Http {
                status: Some(404),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_bad_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result: Result<Pong, _> = fetcher(2)
            .post_json(&server.uri(), "test", &serde_json::json!({"keywords": "x"}))
            .await;
        assert!(matches!(result, Err(AdapterError::Parse(_))));
    }
}
