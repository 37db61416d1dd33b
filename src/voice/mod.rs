pub mod dispatcher;
pub mod merge;

pub use dispatcher::CallDispatcher;
pub use merge::{build_call_request, CallRequest};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of voice agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Outbound,
    Inbound,
}

impl AgentType {
    pub fn as_str(&self) -> &str {
        match self {
            AgentType::Outbound => "outbound",
            AgentType::Inbound => "inbound",
        }
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "outbound" => Ok(AgentType::Outbound),
            "inbound" => Ok(AgentType::Inbound),
            other => Err(format!("Unknown agent type: {}", other)),
        }
    }
}

/// A voice agent configured for an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub account_id: String,
    pub agent_type: AgentType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        account_id: impl Into<String>,
        agent_type: AgentType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            account_id: account_id.into(),
            agent_type,
            is_active: true,
            created_at,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    fn matches(&self, account_id: &str, agent_type: AgentType) -> bool {
        self.is_active && self.agent_type == agent_type && self.account_id == account_id
    }
}

/// Pick the newest active agent of the given type for an account.
///
/// Agents created at the same instant are ordered by id so the choice never
/// depends on iteration order.
pub fn select_recent_active<'a, I>(agents: I, account_id: &str, agent_type: AgentType) -> Option<&'a Agent>
where
    I: IntoIterator<Item = &'a Agent>,
{
    agents
        .into_iter()
        .filter(|agent| agent.matches(account_id, agent_type))
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Speech-to-text settings, passed through as stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transcriber {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Voice selection. Every field is lifted onto the assistant when merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Provider-specific extras carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Timing parameters shared by the start-speaking, chunk and message plans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeakingPlan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_endpointing_enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopSpeakingPlan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_words: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Message the assistant sends to the client or server after a delay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimedMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tool exposed to the language model. Built-in tools such as `endCall`
/// carry only a type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProviderRef {
    pub name: String,
}

/// Reference to the language model an integration selected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfiguration {
    #[serde(default)]
    pub providers: Option<ModelProviderRef>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Sparse voice-assistant settings stored per (account, agent).
///
/// Every field may be missing; [`build_call_request`] fills the gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntegrationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_sound: Option<String>,
    /// Ignored when building a call; events always return to the platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcriber: Option<Transcriber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_plan: Option<SpeakingPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_speaking_plan: Option<SpeakingPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_speaking_plan: Option<StopSpeakingPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_plan: Option<SpeakingPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_messages: Option<Vec<TimedMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_messages: Option<Vec<TimedMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(rename = "client_id", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(rename = "model_configurations", skip_serializing_if = "Option::is_none")]
    pub model_configuration: Option<ModelConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_call_phrases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(rename = "maxToken", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "auth_token", skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}
