use crate::config::{endpoint, DispatchConfig, VOICE_CALL_PATH};
use crate::error::{DispatchError, DispatchResult};
use crate::http::HttpTransport;
use crate::store::AgentDirectory;
use crate::voice::{build_call_request, AgentType};
use serde_json::Value;
use std::sync::Arc;

/// Places outbound calls through the account's newest active outbound agent
#[derive(Clone)]
pub struct CallDispatcher {
    directory: Arc<dyn AgentDirectory>,
    transport: Arc<dyn HttpTransport>,
    call_url: String,
}

impl CallDispatcher {
    pub fn new(directory: Arc<dyn AgentDirectory>, transport: Arc<dyn HttpTransport>, voice_api_url: &str) -> Self {
        Self {
            directory,
            transport,
            call_url: endpoint(voice_api_url, VOICE_CALL_PATH),
        }
    }

    pub fn from_config(
        config: &DispatchConfig,
        directory: Arc<dyn AgentDirectory>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self::new(directory, transport, &config.voice.api_url)
    }

    /// Place a call and return the provider's JSON response untouched.
    ///
    /// Missing agents or integrations are hard errors; provider-level
    /// failures are not interpreted.
    pub async fn place_call_for_account(
        &self,
        account_id: &str,
        destination_number: &str,
        script: &str,
    ) -> DispatchResult<Value> {
        let agent = self
            .directory
            .most_recent_active_agent(account_id, AgentType::Outbound)
            .await?
            .ok_or_else(|| DispatchError::AgentNotFound {
                account_id: account_id.to_string(),
            })?;

        let integration = self
            .directory
            .integration_for(account_id, &agent.id)
            .await?
            .ok_or_else(|| DispatchError::IntegrationNotFound {
                account_id: account_id.to_string(),
                agent_id: agent.id.clone(),
            })?;

        let request = build_call_request(destination_number, script, &agent.name, &integration);
        tracing::info!(
            "Placing outbound call for account {} with agent {} ({})",
            account_id,
            agent.name,
            agent.id
        );

        let auth_token = integration.auth_token.as_deref().unwrap_or_default();
        if auth_token.is_empty() {
            tracing::warn!("Voice integration for agent {} has no auth token", agent.id);
        }

        let response = self
            .transport
            .post_json(&self.call_url, auth_token, &request.to_value()?)
            .await?;

        if !response.is_success() {
            tracing::warn!("Voice provider answered {} for account {}", response.status, account_id);
        }

        Ok(response.body)
    }
}
