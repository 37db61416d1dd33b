use crate::config::{endpoint, GRAPH_SEND_MAIL_PATH};
use crate::error::{DispatchError, DispatchResult};
use crate::http::HttpTransport;
use crate::mail::{DeliveryReceipt, EmailProvider, OutgoingEmail};
use crate::oauth2::EmailProviderKind;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Sends through Microsoft Graph `sendMail` as the signed-in mailbox
pub struct OutlookMailer {
    transport: Arc<dyn HttpTransport>,
    send_url: String,
}

impl OutlookMailer {
    pub fn new(transport: Arc<dyn HttpTransport>, graph_api_url: &str) -> Self {
        Self {
            transport,
            send_url: endpoint(graph_api_url, GRAPH_SEND_MAIL_PATH),
        }
    }

    /// Graph `sendMail` payload: one recipient, plain text
    pub fn send_mail_body(email: &OutgoingEmail) -> Value {
        json!({
            "message": {
                "subject": email.subject_or_default(),
                "body": {
                    "contentType": "Text",
                    "content": email.body,
                },
                "toRecipients": [
                    { "emailAddress": { "address": email.to } }
                ],
            }
        })
    }
}

#[async_trait]
impl EmailProvider for OutlookMailer {
    fn kind(&self) -> EmailProviderKind {
        EmailProviderKind::Microsoft
    }

    async fn send(&self, access_token: &str, email: &OutgoingEmail) -> DispatchResult<DeliveryReceipt> {
        let response = self
            .transport
            .post_json(&self.send_url, access_token, &Self::send_mail_body(email))
            .await?;

        if !response.is_success() {
            return Err(DispatchError::rejected("Microsoft Graph", response.status, &response.body));
        }

        Ok(DeliveryReceipt {
            provider: EmailProviderKind::Microsoft,
            message_id: None,
            summary: "Email from outlook sent successfully".to_string(),
            response: response.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GRAPH_API_URL;
    use crate::testing::MockTransport;

    const SEND_URL: &str = "https://graph.microsoft.com/v1.0/me/sendMail";

    #[test]
    fn test_send_mail_body() {
        let email = OutgoingEmail::new("sales@example.com", "lead@example.com", "Hello there");
        let body = OutlookMailer::send_mail_body(&email);

        assert_eq!(body["message"]["subject"], "From LeadAI!");
        assert_eq!(body["message"]["body"], json!({"contentType": "Text", "content": "Hello there"}));
        assert_eq!(
            body["message"]["toRecipients"],
            json!([{"emailAddress": {"address": "lead@example.com"}}])
        );
    }

    #[tokio::test]
    async fn test_send_uses_bearer_token() {
        let transport = MockTransport::new();
        transport.respond(SEND_URL, 202, Value::Null).await;
        let mailer = OutlookMailer::new(Arc::new(transport.clone()), GRAPH_API_URL);

        let email = OutgoingEmail::new("sales@example.com", "lead@example.com", "Hi").with_subject("Demo");
        let receipt = mailer.send("graph-token", &email).await.unwrap();

        assert_eq!(receipt.provider, EmailProviderKind::Microsoft);
        assert_eq!(receipt.summary, "Email from outlook sent successfully");

        let requests = transport.requests_to(SEND_URL).await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].bearer_token(), Some("graph-token"));
        assert_eq!(requests[0].json().unwrap()["message"]["subject"], "Demo");
    }

    #[tokio::test]
    async fn test_rejection_is_surfaced() {
        let transport = MockTransport::new();
        transport
            .respond(SEND_URL, 401, json!({"error": {"code": "InvalidAuthenticationToken"}}))
            .await;
        let mailer = OutlookMailer::new(Arc::new(transport.clone()), GRAPH_API_URL);

        let err = mailer
            .send("expired", &OutgoingEmail::new("a@example.com", "b@example.com", "Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ProviderRejected { status: 401, .. }));
        assert_eq!(transport.requests().await.len(), 1);
    }
}
