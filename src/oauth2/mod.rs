pub mod lifecycle;
pub mod providers;

pub use lifecycle::{TokenLifecycleManager, TokenStatus};
pub use providers::{ClientRegistration, EmailProviderKind};

use crate::error::{DispatchError, DispatchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OAuth2 token response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Parse a token endpoint response from either provider
    pub fn from_json(data: &Value) -> DispatchResult<Self> {
        let access_token = data["access_token"]
            .as_str()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| DispatchError::RefreshFailed("Missing access_token".to_string()))?
            .to_string();

        let refresh_token = data["refresh_token"]
            .as_str()
            .filter(|token| !token.is_empty())
            .map(|s| s.to_string());

        let token_type = data["token_type"]
            .as_str()
            .unwrap_or("Bearer")
            .to_string();

        // Some endpoints send expires_in as a string
        let expires_in = data["expires_in"]
            .as_u64()
            .or_else(|| data["expires_in"].as_str().and_then(|s| s.parse().ok()));

        let scope = data["scope"]
            .as_str()
            .map(|s| s.to_string());

        Ok(Self {
            access_token,
            refresh_token,
            token_type,
            expires_in,
            scope,
        })
    }
}

/// OAuth credential bound to one connected mailbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailCredential {
    pub provider: EmailProviderKind,
    pub account_id: String,
    pub mailbox: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch seconds
    pub expires_at: i64,
}

impl EmailCredential {
    pub fn new(
        provider: EmailProviderKind,
        account_id: impl Into<String>,
        mailbox: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            provider,
            account_id: account_id.into(),
            mailbox: mailbox.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Expiry as a timestamp, `None` if the stored seconds are out of range
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }

    /// Whether the access token is unusable at `now`, compared in whole seconds
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credential(expires_at: i64) -> EmailCredential {
        EmailCredential::new(
            EmailProviderKind::Google,
            "acct",
            "sales@example.com",
            "access",
            "refresh",
            expires_at,
        )
    }

    #[test]
    fn test_expiry_compares_in_seconds() {
        let now = Utc::now();
        let seconds = now.timestamp();

        assert!(credential(seconds - 10).is_expired_at(now));
        assert!(!credential(seconds + 3600).is_expired_at(now));
        // Expiry is inclusive
        let on_the_second = DateTime::from_timestamp(seconds, 0).unwrap();
        assert!(credential(seconds).is_expired_at(on_the_second));
    }

    #[test]
    fn test_far_future_expiry_is_valid() {
        let far_future = credential(i64::MAX);
        assert_eq!(far_future.expires_at_utc(), None);
        assert!(!far_future.is_expired());

        assert!(credential(i64::MIN).is_expired());
    }

    #[test]
    fn test_parse_token_response() {
        let response = TokenResponse::from_json(&json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 3599,
            "scope": "Mail.Send"
        }))
        .unwrap();

        assert_eq!(response.access_token, "new-access");
        assert_eq!(response.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, Some(3599));

        let stringly = TokenResponse::from_json(&json!({
            "access_token": "a",
            "expires_in": "3600"
        }))
        .unwrap();
        assert_eq!(stringly.expires_in, Some(3600));
        assert_eq!(stringly.refresh_token, None);
    }

    #[test]
    fn test_missing_access_token_is_refresh_failure() {
        let err = TokenResponse::from_json(&json!({"error": "invalid_grant"})).unwrap_err();
        assert!(matches!(err, DispatchError::RefreshFailed(_)));

        let err = TokenResponse::from_json(&json!({"access_token": ""})).unwrap_err();
        assert!(matches!(err, DispatchError::RefreshFailed(_)));
    }
}
