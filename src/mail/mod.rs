pub mod gmail;
pub mod outlook;

pub use gmail::{create_raw_message, decode_raw_message, GmailMailer};
pub use outlook::OutlookMailer;

use crate::config::{DispatchConfig, DEFAULT_EMAIL_SUBJECT};
use crate::error::DispatchResult;
use crate::http::HttpTransport;
use crate::oauth2::EmailProviderKind;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Plain-text message addressed to a single recipient
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

impl OutgoingEmail {
    pub fn new(from: impl Into<String>, to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: None,
            body: body.into(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Subject line, falling back to the product signature
    pub fn subject_or_default(&self) -> &str {
        self.subject
            .as_deref()
            .filter(|subject| !subject.is_empty())
            .unwrap_or(DEFAULT_EMAIL_SUBJECT)
    }
}

/// Proof that a provider accepted a message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReceipt {
    pub provider: EmailProviderKind,
    /// Provider-assigned id, when the provider returns one
    pub message_id: Option<String>,
    pub summary: String,
    /// Raw provider response
    pub response: Value,
}

/// A mail API able to send on behalf of a connected mailbox
#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn kind(&self) -> EmailProviderKind;

    /// Send one message; failures are returned as-is, never retried
    async fn send(&self, access_token: &str, email: &OutgoingEmail) -> DispatchResult<DeliveryReceipt>;
}

/// Routes a message to the provider a mailbox is connected through
#[derive(Clone)]
pub struct EmailDispatcher {
    outlook: Arc<dyn EmailProvider>,
    gmail: Arc<dyn EmailProvider>,
}

impl EmailDispatcher {
    pub fn new(outlook: Arc<dyn EmailProvider>, gmail: Arc<dyn EmailProvider>) -> Self {
        Self { outlook, gmail }
    }

    pub fn from_config(config: &DispatchConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(
            Arc::new(OutlookMailer::new(transport.clone(), &config.mail.graph_api_url)),
            Arc::new(GmailMailer::new(transport, &config.mail.gmail_api_url)),
        )
    }

    /// Provider implementation for a stored provider tag
    pub fn provider(&self, kind: EmailProviderKind) -> &dyn EmailProvider {
        match kind {
            EmailProviderKind::Microsoft => self.outlook.as_ref(),
            EmailProviderKind::Google => self.gmail.as_ref(),
        }
    }

    pub async fn send_email(
        &self,
        kind: EmailProviderKind,
        access_token: &str,
        email: &OutgoingEmail,
    ) -> DispatchResult<DeliveryReceipt> {
        tracing::info!("Sending email to {} via {}", email.to, kind);
        self.provider(kind).send(access_token, email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_defaults_to_signature() {
        let email = OutgoingEmail::new("from@example.com", "to@example.com", "Hi");
        assert_eq!(email.subject_or_default(), "From LeadAI!");

        let blank = email.clone().with_subject("");
        assert_eq!(blank.subject_or_default(), "From LeadAI!");

        let custom = email.with_subject("Follow-up");
        assert_eq!(custom.subject_or_default(), "Follow-up");
    }

    #[test]
    fn test_dispatcher_selects_by_tag() {
        let transport: Arc<dyn HttpTransport> = Arc::new(crate::testing::MockTransport::new());
        let dispatcher = EmailDispatcher::from_config(&DispatchConfig::default(), transport);

        assert_eq!(
            dispatcher.provider(EmailProviderKind::Microsoft).kind(),
            EmailProviderKind::Microsoft
        );
        assert_eq!(
            dispatcher.provider(EmailProviderKind::Google).kind(),
            EmailProviderKind::Google
        );
    }
}
