//! Access-token expiry checks and provider refresh grants

use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::http::HttpTransport;
use crate::oauth2::{ClientRegistration, EmailCredential, EmailProviderKind, TokenResponse};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome of [`TokenLifecycleManager::ensure_fresh_token`]
#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    /// Token was still valid; credential returned untouched
    Valid(EmailCredential),
    /// Token was refreshed; the caller must persist the new state
    Refreshed(EmailCredential),
}

impl TokenStatus {
    pub fn credential(&self) -> &EmailCredential {
        match self {
            TokenStatus::Valid(credential) | TokenStatus::Refreshed(credential) => credential,
        }
    }

    pub fn into_credential(self) -> EmailCredential {
        match self {
            TokenStatus::Valid(credential) | TokenStatus::Refreshed(credential) => credential,
        }
    }

    pub fn was_refreshed(&self) -> bool {
        matches!(self, TokenStatus::Refreshed(_))
    }
}

/// Decides when a mailbox token has expired and runs the matching refresh grant.
///
/// Computes the new credential state only; persisting it is the caller's job.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    transport: Arc<dyn HttpTransport>,
    microsoft: ClientRegistration,
    google: ClientRegistration,
}

impl TokenLifecycleManager {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        microsoft: ClientRegistration,
        google: ClientRegistration,
    ) -> Self {
        Self {
            transport,
            microsoft,
            google,
        }
    }

    pub fn from_config(config: &DispatchConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(
            transport,
            ClientRegistration::for_provider(config, EmailProviderKind::Microsoft),
            ClientRegistration::for_provider(config, EmailProviderKind::Google),
        )
    }

    fn registration(&self, provider: EmailProviderKind) -> &ClientRegistration {
        match provider {
            EmailProviderKind::Microsoft => &self.microsoft,
            EmailProviderKind::Google => &self.google,
        }
    }

    /// Return the credential unchanged if still valid, otherwise refresh it
    pub async fn ensure_fresh_token(&self, credential: EmailCredential) -> DispatchResult<TokenStatus> {
        self.ensure_fresh_token_at(credential, Utc::now()).await
    }

    /// [`ensure_fresh_token`](Self::ensure_fresh_token) against an explicit clock
    pub async fn ensure_fresh_token_at(
        &self,
        credential: EmailCredential,
        now: DateTime<Utc>,
    ) -> DispatchResult<TokenStatus> {
        if !credential.is_expired_at(now) {
            return Ok(TokenStatus::Valid(credential));
        }

        tracing::warn!(
            "Access token for {} expired, refreshing via {}",
            credential.mailbox,
            credential.provider
        );

        let refreshed = self.refresh(&credential, now).await?;
        tracing::info!(
            "Refreshed {} token for {}, valid until {}",
            refreshed.provider,
            refreshed.mailbox,
            refreshed.expires_at
        );

        Ok(TokenStatus::Refreshed(refreshed))
    }

    /// Run the provider's refresh grant and compute the new credential state
    pub async fn refresh(&self, credential: &EmailCredential, now: DateTime<Utc>) -> DispatchResult<EmailCredential> {
        if credential.refresh_token.is_empty() {
            return Err(DispatchError::RefreshFailed(format!(
                "No refresh token stored for {}",
                credential.mailbox
            )));
        }

        let registration = self.registration(credential.provider);
        registration.validate(credential.provider)?;

        let mut params = vec![
            ("refresh_token", credential.refresh_token.as_str()),
            ("client_id", registration.client_id.as_str()),
            ("client_secret", registration.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];
        if let Some(scope) = credential.provider.refresh_scope() {
            params.push(("scope", scope));
        }

        let response = self
            .transport
            .post_form(&registration.token_url, &params)
            .await
            .map_err(|e| DispatchError::RefreshFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(DispatchError::RefreshFailed(format!(
                "{} token endpoint returned {}: {}",
                credential.provider, response.status, response.body
            )));
        }

        let tokens = TokenResponse::from_json(&response.body)?;
        let expires_in = tokens
            .expires_in
            .filter(|seconds| *seconds > 0)
            .ok_or_else(|| DispatchError::RefreshFailed("Missing expires_in".to_string()))?;

        let expires_in = i64::try_from(expires_in)
            .map_err(|_| DispatchError::RefreshFailed(format!("expires_in out of range: {}", expires_in)))?;

        Ok(EmailCredential {
            access_token: tokens.access_token,
            // Google keeps the existing refresh token unless it rotates it
            refresh_token: tokens
                .refresh_token
                .unwrap_or_else(|| credential.refresh_token.clone()),
            expires_at: now.timestamp().saturating_add(expires_in),
            ..credential.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GOOGLE_TOKEN_URL, MICROSOFT_REFRESH_SCOPE, MICROSOFT_TOKEN_URL};
    use crate::testing::MockTransport;
    use serde_json::json;

    fn registration(token_url: &str) -> ClientRegistration {
        ClientRegistration {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            token_url: token_url.to_string(),
        }
    }

    fn manager(transport: &MockTransport) -> TokenLifecycleManager {
        TokenLifecycleManager::new(
            Arc::new(transport.clone()),
            registration(MICROSOFT_TOKEN_URL),
            registration(GOOGLE_TOKEN_URL),
        )
    }

    fn credential(provider: EmailProviderKind, expires_at: i64) -> EmailCredential {
        EmailCredential::new(provider, "acct", "sales@example.com", "old-access", "old-refresh", expires_at)
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_network() {
        let transport = MockTransport::new();
        let now = Utc::now();
        let original = credential(EmailProviderKind::Microsoft, now.timestamp() + 600);

        let status = manager(&transport)
            .ensure_fresh_token_at(original.clone(), now)
            .await
            .unwrap();

        assert_eq!(status, TokenStatus::Valid(original));
        assert!(transport.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_unrepresentable_future_expiry_is_still_valid() {
        let transport = MockTransport::new();
        let original = credential(EmailProviderKind::Google, i64::MAX);

        let status = manager(&transport)
            .ensure_fresh_token_at(original.clone(), Utc::now())
            .await
            .unwrap();

        assert_eq!(status, TokenStatus::Valid(original));
        assert!(transport.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_google_refresh_sends_no_scope() {
        let transport = MockTransport::new();
        transport
            .respond(
                GOOGLE_TOKEN_URL,
                200,
                json!({"access_token": "new-access", "expires_in": 3599, "token_type": "Bearer"}),
            )
            .await;
        let now = Utc::now();

        let status = manager(&transport)
            .ensure_fresh_token_at(credential(EmailProviderKind::Google, now.timestamp() - 10), now)
            .await
            .unwrap();

        assert!(status.was_refreshed());
        let refreshed = status.into_credential();
        assert_eq!(refreshed.access_token, "new-access");
        assert_eq!(refreshed.refresh_token, "old-refresh");
        assert_eq!(refreshed.expires_at, now.timestamp() + 3599);

        let requests = transport.requests_to(GOOGLE_TOKEN_URL).await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].form_field("grant_type"), Some("refresh_token"));
        assert_eq!(requests[0].form_field("refresh_token"), Some("old-refresh"));
        assert_eq!(requests[0].form_field("client_id"), Some("client-id"));
        assert_eq!(requests[0].form_field("client_secret"), Some("client-secret"));
        assert_eq!(requests[0].form_field("scope"), None);
    }

    #[tokio::test]
    async fn test_microsoft_refresh_sends_mail_scope() {
        let transport = MockTransport::new();
        transport
            .respond(
                MICROSOFT_TOKEN_URL,
                200,
                json!({"access_token": "ms-access", "refresh_token": "ms-refresh", "expires_in": 4000}),
            )
            .await;
        let now = Utc::now();
        let stale = credential(EmailProviderKind::Microsoft, now.timestamp());

        let refreshed = manager(&transport)
            .ensure_fresh_token_at(stale.clone(), now)
            .await
            .unwrap()
            .into_credential();

        assert_eq!(refreshed.access_token, "ms-access");
        assert_eq!(refreshed.refresh_token, "ms-refresh");
        assert!(refreshed.expires_at > stale.expires_at);
        assert_eq!(refreshed.mailbox, stale.mailbox);

        let requests = transport.requests_to(MICROSOFT_TOKEN_URL).await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].form_field("scope"), Some(MICROSOFT_REFRESH_SCOPE));
        assert!(transport.requests_to(GOOGLE_TOKEN_URL).await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_refresh_failure() {
        let transport = MockTransport::new();
        transport
            .respond(GOOGLE_TOKEN_URL, 400, json!({"error": "invalid_grant"}))
            .await;
        let now = Utc::now();

        let err = manager(&transport)
            .ensure_fresh_token_at(credential(EmailProviderKind::Google, 0), now)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_response_without_usable_token_is_refresh_failure() {
        let transport = MockTransport::new();
        transport
            .respond(MICROSOFT_TOKEN_URL, 200, json!({"access_token": "x"}))
            .await;
        let now = Utc::now();

        let err = manager(&transport)
            .ensure_fresh_token_at(credential(EmailProviderKind::Microsoft, 0), now)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_refresh_failure() {
        let transport = MockTransport::new();
        transport.fail(GOOGLE_TOKEN_URL, "connection reset").await;

        let err = manager(&transport)
            .ensure_fresh_token(credential(EmailProviderKind::Google, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_refresh_token() {
        let transport = MockTransport::new();
        let mut stale = credential(EmailProviderKind::Google, 0);
        stale.refresh_token.clear();

        let err = manager(&transport).ensure_fresh_token(stale).await.unwrap_err();
        assert!(matches!(err, DispatchError::RefreshFailed(_)));
        assert!(transport.requests().await.is_empty());
    }
}
