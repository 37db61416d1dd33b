//! Error types shared by every dispatch path

use thiserror::Error;

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised while placing calls or delivering messages
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No active outbound agent found for account {account_id}")]
    AgentNotFound { account_id: String },

    #[error("No voice integration found for account {account_id}, agent {agent_id}")]
    IntegrationNotFound { account_id: String, agent_id: String },

    #[error("No mailbox credential found for {mailbox} (account {account_id})")]
    CredentialNotFound { account_id: String, mailbox: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("{provider} rejected the request with status {status}: {body}")]
    ProviderRejected {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DispatchError {
    /// Build a provider rejection from a status code and response body
    pub fn rejected(provider: impl Into<String>, status: u16, body: impl ToString) -> Self {
        DispatchError::ProviderRejected {
            provider: provider.into(),
            status,
            body: body.to_string(),
        }
    }

    /// Whether the error points at a misconfigured account rather than a transient failure
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DispatchError::AgentNotFound { .. }
                | DispatchError::IntegrationNotFound { .. }
                | DispatchError::CredentialNotFound { .. }
                | DispatchError::InvalidProvider(_)
                | DispatchError::InvalidConfig(_)
        )
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        DispatchError::Store(err.to_string())
    }
}
