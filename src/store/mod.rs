//! Narrow interfaces to the account database
//!
//! The dispatch core only ever reads agents and integrations, and reads or
//! updates mailbox credentials. Both implementations here honour the same
//! selection and update rules.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::DispatchResult;
use crate::oauth2::EmailCredential;
use crate::voice::{Agent, AgentType, IntegrationConfig};
use async_trait::async_trait;

/// Read access to voice agents and their integration settings
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Newest active agent of `agent_type` for the account, if any
    async fn most_recent_active_agent(
        &self,
        account_id: &str,
        agent_type: AgentType,
    ) -> DispatchResult<Option<Agent>>;

    /// Integration settings bound to (account, agent)
    async fn integration_for(
        &self,
        account_id: &str,
        agent_id: &str,
    ) -> DispatchResult<Option<IntegrationConfig>>;
}

/// Per-mailbox OAuth credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_credential(
        &self,
        account_id: &str,
        mailbox: &str,
    ) -> DispatchResult<Option<EmailCredential>>;

    /// Persist access token, refresh token and expiry together.
    ///
    /// Read-refresh-persist is not atomic across concurrent dispatches for
    /// the same mailbox; the last writer wins.
    async fn update_tokens(&self, credential: &EmailCredential) -> DispatchResult<()>;
}
