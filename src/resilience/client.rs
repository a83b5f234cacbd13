use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::error::ServiceError;
use super::retry::{RetryConfig, RetryPolicy};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Successful (2xx) upstream reply.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client for one named backend.
///
/// Every call goes through the breaker first; inside it the retry policy
/// re-issues timeouts and connection failures, each attempt with a fresh
/// timeout.
pub struct ServiceClient {
    name: String,
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
    breaker: Arc<CircuitBreaker>,
    retry: Arc<RetryPolicy>,
}

impl ServiceClient {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let name = name.into();
        let breaker = Arc::new(CircuitBreaker::new(
            name.clone(),
            CircuitBreakerConfig::default(),
        ));
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            http: reqwest::Client::new(),
            breaker,
            retry: Arc::new(RetryPolicy::new(RetryConfig::default())),
            name,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = Arc::new(CircuitBreaker::new(self.name.clone(), config));
        self
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = Arc::new(RetryPolicy::new(config));
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn url_for(&self, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    pub async fn get(&self, path: &str) -> Result<UpstreamResponse, ServiceError> {
        self.request(Method::GET, path, None, None).await
    }

    pub async fn post(&self, path: &str, body: Bytes) -> Result<UpstreamResponse, ServiceError> {
        self.request(Method::POST, path, None, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Bytes) -> Result<UpstreamResponse, ServiceError> {
        self.request(Method::PUT, path, None, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<UpstreamResponse, ServiceError> {
        self.request(Method::DELETE, path, None, None).await
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, ServiceError> {
        let url = self.url_for(path, query);
        let url = url.as_str();
        let method = &method;
        let body = &body;

        self.breaker
            .call(|| {
                self.retry.run_if(
                    &self.name,
                    || self.send_once(method.clone(), url, body.clone()),
                    ServiceError::is_retryable,
                )
            })
            .await
            .map_err(ServiceError::from)
    }

    /// POSTs `body` as JSON and decodes the JSON reply.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| self.other(e))?;
        let response = self.post(path, Bytes::from(payload)).await?;
        response.json().map_err(|e| self.other(e))
    }

    /// One GET of `/health` outside the breaker and retry policy; any failure
    /// counts as unhealthy.
    pub async fn health_check(&self) -> bool {
        let url = self.url_for("/health", None);
        self.send_once(Method::GET, &url, None).await.is_ok()
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, ServiceError> {
        debug!(service = %self.name, %method, url, "calling service");
        let mut request = self.http.request(method, url).timeout(self.timeout);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(ServiceError::Rejected {
                base_url: self.base_url.clone(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(UpstreamResponse {
            status: status.as_u16(),
            body,
        })
    }

    fn classify(&self, err: reqwest::Error) -> ServiceError {
        let base_url = self.base_url.clone();
        if err.is_timeout() {
            ServiceError::Timeout { base_url }
        } else if err.is_connect() {
            ServiceError::Unavailable {
                base_url,
                reason: err.to_string(),
            }
        } else {
            ServiceError::Other {
                base_url,
                reason: err.to_string(),
            }
        }
    }

    fn other(&self, err: impl std::fmt::Display) -> ServiceError {
        ServiceError::Other {
            base_url: self.base_url.clone(),
            reason: err.to_string(),
        }
    }
}
