//! Recording transport for exercising dispatch paths without a network

use crate::error::{DispatchError, DispatchResult};
use crate::http::{HttpResponse, HttpTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Body of a recorded request
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedBody {
    Json { bearer_token: String, body: Value },
    Form(Vec<(String, String)>),
}

/// Record of a request made through the mock transport
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub body: RecordedBody,
}

impl RecordedRequest {
    /// Look up a form field by name
    pub fn form_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            RecordedBody::Form(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            RecordedBody::Json { .. } => None,
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            RecordedBody::Json { body, .. } => Some(body),
            RecordedBody::Form(_) => None,
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        match &self.body {
            RecordedBody::Json { bearer_token, .. } => Some(bearer_token),
            RecordedBody::Form(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Respond(HttpResponse),
    Fail(String),
}

/// Transport that answers from canned responses keyed by URL and records every request
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<RwLock<HashMap<String, MockReply>>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `url` with the given status and body
    pub async fn respond(&self, url: &str, status: u16, body: Value) {
        self.replies
            .write()
            .await
            .insert(url.to_string(), MockReply::Respond(HttpResponse::new(status, body)));
    }

    /// Make requests to `url` fail as if the connection dropped
    pub async fn fail(&self, url: &str, message: &str) {
        self.replies
            .write()
            .await
            .insert(url.to_string(), MockReply::Fail(message.to_string()));
    }

    /// All requests made so far, in order
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Requests made to a specific URL
    pub async fn requests_to(&self, url: &str) -> Vec<RecordedRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|request| request.url == url)
            .cloned()
            .collect()
    }

    async fn reply(&self, request: RecordedRequest) -> DispatchResult<HttpResponse> {
        let url = request.url.clone();
        self.requests.write().await.push(request);

        match self.replies.read().await.get(&url) {
            Some(MockReply::Respond(response)) => Ok(response.clone()),
            Some(MockReply::Fail(message)) => Err(DispatchError::Transport(format!(
                "mock transport failure for {}: {}",
                url, message
            ))),
            None => Ok(HttpResponse::new(404, Value::Null)),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_json(&self, url: &str, bearer_token: &str, body: &Value) -> DispatchResult<HttpResponse> {
        self.reply(RecordedRequest {
            url: url.to_string(),
            body: RecordedBody::Json {
                bearer_token: bearer_token.to_string(),
                body: body.clone(),
            },
        })
        .await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> DispatchResult<HttpResponse> {
        self.reply(RecordedRequest {
            url: url.to_string(),
            body: RecordedBody::Form(
                form.iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
            ),
        })
        .await
    }
}
