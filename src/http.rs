//! HTTP transport used by every provider client

use crate::error::DispatchResult;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// Status and decoded body of a provider response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON body, `Value::Null` when the provider sent none
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP capability the dispatchers depend on
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body with bearer authentication
    async fn post_json(&self, url: &str, bearer_token: &str, body: &Value) -> DispatchResult<HttpResponse>;

    /// POST a form-encoded body without authentication
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> DispatchResult<HttpResponse>;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: HttpClient,
}

impl ReqwestTransport {
    /// Create a transport with the given request timeout
    pub fn new(request_timeout: Duration) -> DispatchResult<Self> {
        let http_client = HttpClient::builder().timeout(request_timeout).build()?;

        Ok(Self { http_client })
    }

    async fn read_response(response: reqwest::Response) -> DispatchResult<HttpResponse> {
        let status = response.status().as_u16();
        let text = response.text().await?;

        // Graph answers sendMail with 202 and an empty body
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, bearer_token: &str, body: &Value) -> DispatchResult<HttpResponse> {
        tracing::debug!("POST {}", url);

        let response = self
            .http_client
            .post(url)
            .bearer_auth(bearer_token)
            .json(body)
            .send()
            .await?;

        Self::read_response(response).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> DispatchResult<HttpResponse> {
        tracing::debug!("POST {} (form)", url);

        let response = self.http_client.post(url).form(form).send().await?;

        Self::read_response(response).await
    }
}
