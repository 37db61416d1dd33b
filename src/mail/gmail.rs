use crate::config::{endpoint, GMAIL_SEND_PATH};
use crate::error::{DispatchError, DispatchResult};
use crate::http::HttpTransport;
use crate::mail::{DeliveryReceipt, EmailProvider, OutgoingEmail};
use crate::oauth2::EmailProviderKind;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

/// Header values must stay on one line or they could add headers of their own
fn header_value<'a>(name: &str, value: &'a str) -> DispatchResult<&'a str> {
    if value.contains(&['\r', '\n'][..]) {
        return Err(DispatchError::InvalidMessage(format!(
            "{} header contains a line break",
            name
        )));
    }
    Ok(value)
}

/// Format a minimal RFC 2822 message: To, From, Subject, blank line, body
pub fn rfc2822_message(to: &str, from: &str, subject: &str, body: &str) -> DispatchResult<String> {
    Ok(format!(
        "To: {}\r\nFrom: {}\r\nSubject: {}\r\n\r\n{}",
        header_value("To", to)?,
        header_value("From", from)?,
        header_value("Subject", subject)?,
        body
    ))
}

/// Base64url-encode (no padding) a message for the Gmail `raw` field
pub fn create_raw_message(to: &str, from: &str, subject: &str, body: &str) -> DispatchResult<String> {
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(rfc2822_message(to, from, subject, body)?))
}

/// Reverse [`create_raw_message`]
pub fn decode_raw_message(raw: &str) -> DispatchResult<String> {
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(|e| DispatchError::InvalidMessage(format!("Invalid base64url message: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| DispatchError::InvalidMessage(format!("Message is not UTF-8: {}", e)))
}

/// Sends through the Gmail API as a raw message
pub struct GmailMailer {
    transport: Arc<dyn HttpTransport>,
    send_url: String,
}

impl GmailMailer {
    pub fn new(transport: Arc<dyn HttpTransport>, gmail_api_url: &str) -> Self {
        Self {
            transport,
            send_url: endpoint(gmail_api_url, GMAIL_SEND_PATH),
        }
    }
}

#[async_trait]
impl EmailProvider for GmailMailer {
    fn kind(&self) -> EmailProviderKind {
        EmailProviderKind::Google
    }

    async fn send(&self, access_token: &str, email: &OutgoingEmail) -> DispatchResult<DeliveryReceipt> {
        let raw = create_raw_message(&email.to, &email.from, email.subject_or_default(), &email.body)?;

        let response = self
            .transport
            .post_json(&self.send_url, access_token, &json!({ "raw": raw }))
            .await?;

        if !response.is_success() {
            return Err(DispatchError::rejected("Gmail", response.status, &response.body));
        }

        let message_id = response.body["id"].as_str().map(|id| id.to_string());

        Ok(DeliveryReceipt {
            provider: EmailProviderKind::Google,
            summary: format!(
                "Email from gmail sent successfully{}",
                message_id.as_deref().map(|id| format!(" ({})", id)).unwrap_or_default()
            ),
            message_id,
            response: response.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GMAIL_API_URL;
    use crate::testing::MockTransport;

    const SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

    #[test]
    fn test_message_layout() {
        assert_eq!(
            rfc2822_message("lead@example.com", "sales@example.com", "Hi", "Body text").unwrap(),
            "To: lead@example.com\r\nFrom: sales@example.com\r\nSubject: Hi\r\n\r\nBody text"
        );
    }

    #[test]
    fn test_raw_message_is_url_safe_without_padding() {
        let raw = create_raw_message("a@b.c", "d@e.f", "??>", "ÿÿ??>>").unwrap();
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        assert!(!raw.ends_with('='));
    }

    #[test]
    fn test_raw_message_reverses_through_standard_base64() {
        let original = rfc2822_message("lead@example.com", "sales@example.com", "Subject?>", "Body ÿ with ~~~").unwrap();
        let raw = create_raw_message("lead@example.com", "sales@example.com", "Subject?>", "Body ÿ with ~~~").unwrap();

        let mut standard = raw.replace('-', "+").replace('_', "/");
        while standard.len() % 4 != 0 {
            standard.push('=');
        }
        let decoded = general_purpose::STANDARD.decode(standard).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), original);

        assert_eq!(decode_raw_message(&raw).unwrap(), original);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_raw_message("***").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidMessage(_)));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_line_breaks_in_headers_are_rejected() {
        let err = create_raw_message("lead@example.com", "sales@example.com", "Hi\r\nBcc: victim@evil.com", "body")
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidMessage(_)));

        assert!(rfc2822_message("lead@example.com\nBcc: x@evil.com", "sales@example.com", "Hi", "body").is_err());
        assert!(rfc2822_message("lead@example.com", "sales@example.com\r", "Hi", "body").is_err());

        // Line breaks in the body are fine
        let text = rfc2822_message("lead@example.com", "sales@example.com", "Hi", "line one\r\nline two").unwrap();
        assert!(text.ends_with("\r\n\r\nline one\r\nline two"));
    }

    #[tokio::test]
    async fn test_send_posts_raw_message() {
        let transport = MockTransport::new();
        transport
            .respond(SEND_URL, 200, json!({"id": "msg-1", "threadId": "t-1"}))
            .await;
        let mailer = GmailMailer::new(Arc::new(transport.clone()), GMAIL_API_URL);

        let email = OutgoingEmail::new("sales@example.com", "lead@example.com", "Hello");
        let receipt = mailer.send("google-token", &email).await.unwrap();

        assert_eq!(receipt.provider, EmailProviderKind::Google);
        assert_eq!(receipt.message_id.as_deref(), Some("msg-1"));

        let requests = transport.requests_to(SEND_URL).await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].bearer_token(), Some("google-token"));
        let raw = requests[0].json().unwrap()["raw"].as_str().unwrap().to_string();
        assert_eq!(
            decode_raw_message(&raw).unwrap(),
            "To: lead@example.com\r\nFrom: sales@example.com\r\nSubject: From LeadAI!\r\n\r\nHello"
        );
    }

    #[tokio::test]
    async fn test_injected_subject_is_never_sent() {
        let transport = MockTransport::new();
        transport.respond(SEND_URL, 200, json!({"id": "msg-1"})).await;
        let mailer = GmailMailer::new(Arc::new(transport.clone()), GMAIL_API_URL);

        let email = OutgoingEmail::new("sales@example.com", "lead@example.com", "Hello")
            .with_subject("Hi\r\nBcc: victim@evil.com");
        let err = mailer.send("token", &email).await.unwrap_err();

        assert!(matches!(err, DispatchError::InvalidMessage(_)));
        assert!(transport.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_surfaced() {
        let transport = MockTransport::new();
        transport.respond(SEND_URL, 403, json!({"error": {"code": 403}})).await;
        let mailer = GmailMailer::new(Arc::new(transport.clone()), GMAIL_API_URL);

        let err = mailer
            .send("token", &OutgoingEmail::new("a@example.com", "b@example.com", "Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ProviderRejected { status: 403, .. }));
    }
}
