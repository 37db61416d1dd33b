//! Top-level entry points composing call, SMS and email dispatch

use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::mail::{DeliveryReceipt, EmailDispatcher, OutgoingEmail};
use crate::oauth2::TokenLifecycleManager;
use crate::sms::SmsClient;
use crate::store::{AgentDirectory, CredentialStore};
use crate::voice::CallDispatcher;
use serde_json::Value;
use std::sync::Arc;

/// Outbound contact service used by the CLI and embedding services
#[derive(Clone)]
pub struct NotificationService {
    calls: CallDispatcher,
    sms: SmsClient,
    tokens: TokenLifecycleManager,
    email: EmailDispatcher,
    credentials: Arc<dyn CredentialStore>,
}

impl NotificationService {
    pub fn new(
        calls: CallDispatcher,
        sms: SmsClient,
        tokens: TokenLifecycleManager,
        email: EmailDispatcher,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            calls,
            sms,
            tokens,
            email,
            credentials,
        }
    }

    /// Wire every component from config over a shared transport and store
    pub fn from_config<S>(config: &DispatchConfig, transport: Arc<dyn HttpTransport>, store: Arc<S>) -> Self
    where
        S: AgentDirectory + CredentialStore + 'static,
    {
        Self::new(
            CallDispatcher::from_config(config, store.clone(), transport.clone()),
            SmsClient::from_config(config, transport.clone()),
            TokenLifecycleManager::from_config(config, transport.clone()),
            EmailDispatcher::from_config(config, transport),
            store,
        )
    }

    /// Same as [`from_config`](Self::from_config) over a real HTTP transport
    pub fn connect<S>(config: &DispatchConfig, store: Arc<S>) -> DispatchResult<Self>
    where
        S: AgentDirectory + CredentialStore + 'static,
    {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
        Ok(Self::from_config(config, transport, store))
    }

    /// Call `phone_number` with the account's newest active outbound agent.
    ///
    /// Misconfigured accounts surface as errors; the provider response is
    /// returned as-is.
    pub async fn initiate_call_using_recent_active_agent(
        &self,
        account_id: &str,
        phone_number: &str,
        script: &str,
    ) -> DispatchResult<Value> {
        self.calls
            .place_call_for_account(account_id, phone_number, script)
            .await
    }

    /// Send an SMS from the shared sender; `None` if it was not sent
    pub async fn send_sms(&self, phone_number: &str, body: &str) -> Option<Value> {
        self.sms.send(phone_number, body).await
    }

    /// Send an email from a connected mailbox; never fails past this point.
    ///
    /// Any failure (unknown mailbox, refresh, persistence, provider) is
    /// logged and reported as `None`.
    pub async fn send_email_from_stage_task(
        &self,
        account_id: &str,
        mailbox: &str,
        body: &str,
        recipient: &str,
        subject: Option<&str>,
    ) -> Option<DeliveryReceipt> {
        match self
            .try_send_email(account_id, mailbox, body, recipient, subject)
            .await
        {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                tracing::error!("Failed to send email from {} to {}: {}", mailbox, recipient, e);
                None
            }
        }
    }

    /// Fallible core of [`send_email_from_stage_task`](Self::send_email_from_stage_task)
    pub async fn try_send_email(
        &self,
        account_id: &str,
        mailbox: &str,
        body: &str,
        recipient: &str,
        subject: Option<&str>,
    ) -> DispatchResult<DeliveryReceipt> {
        let credential = self
            .credentials
            .load_credential(account_id, mailbox)
            .await?
            .ok_or_else(|| DispatchError::CredentialNotFound {
                account_id: account_id.to_string(),
                mailbox: mailbox.to_string(),
            })?;

        let status = self.tokens.ensure_fresh_token(credential).await?;
        if status.was_refreshed() {
            self.credentials.update_tokens(status.credential()).await?;
            tracing::debug!("Persisted refreshed token for {}", mailbox);
        }
        let credential = status.into_credential();

        let mut email = OutgoingEmail::new(credential.mailbox.as_str(), recipient, body);
        if let Some(subject) = subject {
            email = email.with_subject(subject);
        }

        self.email
            .send_email(credential.provider, &credential.access_token, &email)
            .await
    }
}
