//! SMS delivery through the messaging provider

use crate::config::{
    endpoint, DispatchConfig, SMS_MESSAGES_PATH, SMS_MESSAGING_PROFILE_ID, SMS_SENDER_NUMBER,
    SMS_SUBJECT,
};
use crate::error::{DispatchError, DispatchResult};
use crate::http::HttpTransport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Body of `POST /v2/messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsPayload {
    pub from: String,
    pub messaging_profile_id: String,
    pub to: String,
    pub text: String,
    pub subject: String,
    pub use_profile_webhooks: bool,
    #[serde(rename = "type")]
    pub message_type: String,
}

impl SmsPayload {
    /// Every message goes out from the shared sender number and profile
    pub fn new(to: &str, text: &str) -> Self {
        Self {
            from: SMS_SENDER_NUMBER.to_string(),
            messaging_profile_id: SMS_MESSAGING_PROFILE_ID.to_string(),
            to: to.to_string(),
            text: text.to_string(),
            subject: SMS_SUBJECT.to_string(),
            use_profile_webhooks: true,
            message_type: "SMS".to_string(),
        }
    }
}

/// Stateless SMS sender
#[derive(Clone)]
pub struct SmsClient {
    transport: Arc<dyn HttpTransport>,
    messages_url: String,
    api_key: String,
}

impl SmsClient {
    pub fn new(transport: Arc<dyn HttpTransport>, api_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            messages_url: endpoint(api_url, SMS_MESSAGES_PATH),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &DispatchConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(transport, &config.sms.api_url, config.sms.api_key.clone())
    }

    /// Send one SMS, returning the provider response or the failure
    pub async fn try_send(&self, to: &str, text: &str) -> DispatchResult<Value> {
        let payload = serde_json::to_value(SmsPayload::new(to, text))?;
        let response = self
            .transport
            .post_json(&self.messages_url, &self.api_key, &payload)
            .await?;

        if !response.is_success() {
            return Err(DispatchError::rejected("SMS provider", response.status, &response.body));
        }

        Ok(response.body)
    }

    /// Send one SMS; failures are logged and reported as `None`
    pub async fn send(&self, to: &str, text: &str) -> Option<Value> {
        match self.try_send(to, text).await {
            Ok(response) => {
                tracing::info!("SMS sent to {}", to);
                Some(response)
            }
            Err(e) => {
                tracing::error!("Failed to send SMS to {}: {}", to, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SMS_API_URL;
    use crate::testing::MockTransport;
    use serde_json::json;

    const MESSAGES_URL: &str = "https://api.telnyx.com/v2/messages";

    #[test]
    fn test_payload_uses_fixed_sender() {
        let payload = serde_json::to_value(SmsPayload::new("+15550100", "Hi there")).unwrap();
        assert_eq!(
            payload,
            json!({
                "from": "+61489900690",
                "messaging_profile_id": "400197bf-b007-4314-9f9f-c5cd0b7b67ae",
                "to": "+15550100",
                "text": "Hi there",
                "subject": "From LeadAI!",
                "use_profile_webhooks": true,
                "type": "SMS"
            })
        );
    }

    #[tokio::test]
    async fn test_send_returns_provider_response() {
        let transport = MockTransport::new();
        transport
            .respond(MESSAGES_URL, 200, json!({"data": {"id": "sms-1"}}))
            .await;
        let client = SmsClient::new(Arc::new(transport.clone()), SMS_API_URL, "KEY");

        let response = client.send("+15550100", "Hi").await.unwrap();
        assert_eq!(response["data"]["id"], "sms-1");

        let requests = transport.requests_to(MESSAGES_URL).await;
        assert_eq!(requests[0].bearer_token(), Some("KEY"));
        assert_eq!(requests[0].json().unwrap()["to"], "+15550100");
    }

    #[tokio::test]
    async fn test_failures_become_none() {
        let transport = MockTransport::new();
        transport.respond(MESSAGES_URL, 422, json!({"errors": []})).await;
        let client = SmsClient::new(Arc::new(transport.clone()), SMS_API_URL, "KEY");
        assert!(client.send("+15550100", "Hi").await.is_none());

        transport.fail(MESSAGES_URL, "timeout").await;
        assert!(client.send("+15550100", "Hi").await.is_none());
    }
}
