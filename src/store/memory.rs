use crate::error::{DispatchError, DispatchResult};
use crate::oauth2::EmailCredential;
use crate::store::{AgentDirectory, CredentialStore};
use crate::voice::{select_recent_active, Agent, AgentType, IntegrationConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local store, used by tests and dry runs
#[derive(Clone, Default)]
pub struct InMemoryStore {
    agents: Arc<RwLock<Vec<Agent>>>,
    integrations: Arc<RwLock<HashMap<(String, String), IntegrationConfig>>>,
    credentials: Arc<RwLock<HashMap<(String, String), EmailCredential>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_agent(&self, agent: Agent) {
        self.agents.write().await.push(agent);
    }

    pub async fn insert_integration(&self, account_id: &str, agent_id: &str, config: IntegrationConfig) {
        self.integrations
            .write()
            .await
            .insert((account_id.to_string(), agent_id.to_string()), config);
    }

    pub async fn insert_credential(&self, credential: EmailCredential) {
        let key = (credential.account_id.clone(), credential.mailbox.clone());
        self.credentials.write().await.insert(key, credential);
    }
}

#[async_trait]
impl AgentDirectory for InMemoryStore {
    async fn most_recent_active_agent(
        &self,
        account_id: &str,
        agent_type: AgentType,
    ) -> DispatchResult<Option<Agent>> {
        let agents = self.agents.read().await;
        Ok(select_recent_active(agents.iter(), account_id, agent_type).cloned())
    }

    async fn integration_for(
        &self,
        account_id: &str,
        agent_id: &str,
    ) -> DispatchResult<Option<IntegrationConfig>> {
        let integrations = self.integrations.read().await;
        Ok(integrations
            .get(&(account_id.to_string(), agent_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn load_credential(
        &self,
        account_id: &str,
        mailbox: &str,
    ) -> DispatchResult<Option<EmailCredential>> {
        let credentials = self.credentials.read().await;
        Ok(credentials
            .get(&(account_id.to_string(), mailbox.to_string()))
            .cloned())
    }

    async fn update_tokens(&self, credential: &EmailCredential) -> DispatchResult<()> {
        let mut credentials = self.credentials.write().await;
        let stored = credentials
            .get_mut(&(credential.account_id.clone(), credential.mailbox.clone()))
            .ok_or_else(|| DispatchError::CredentialNotFound {
                account_id: credential.account_id.clone(),
                mailbox: credential.mailbox.clone(),
            })?;

        stored.access_token = credential.access_token.clone();
        stored.refresh_token = credential.refresh_token.clone();
        stored.expires_at = credential.expires_at;
        Ok(())
    }
}
