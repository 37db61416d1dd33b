//! Builds voice-provider call requests from sparse integration settings
//!
//! Assistant fields are merged through a rule table so each field's policy
//! (config-or-default, pass-through, forced) can be read and tested on its own.

use crate::config::{
    DEFAULT_BACKGROUND_SOUND, DEFAULT_FIRST_MESSAGE_MODE, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_MODEL_PROVIDER, DEFAULT_TEMPERATURE, DEFAULT_TRANSCRIBER_LANGUAGE,
    DEFAULT_TRANSCRIBER_MODEL, DEFAULT_TRANSCRIBER_PROVIDER, OUTBOUND_CALL_TYPE,
    PLATFORM_SERVER_URL,
};
use crate::voice::IntegrationConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// How an assistant field is derived from the integration settings
#[derive(Clone, Copy)]
pub enum FieldRule {
    /// Config value when present, else the default
    OrDefault(fn() -> Value),
    /// Emitted only when the config carries the field
    IfPresent,
    /// Always this value, whatever the config says
    Fixed(fn() -> Value),
}

/// One row of the assistant merge table
pub struct AssistantField {
    pub key: &'static str,
    pub read: fn(&IntegrationConfig) -> Option<Value>,
    pub rule: FieldRule,
}

fn present<T: Serialize>(value: &Option<T>) -> Option<Value> {
    value.as_ref().map(|v| json!(v))
}

fn default_first_message_mode() -> Value {
    json!(DEFAULT_FIRST_MESSAGE_MODE)
}

fn default_background_sound() -> Value {
    json!(DEFAULT_BACKGROUND_SOUND)
}

fn default_transcriber() -> Value {
    json!({
        "provider": DEFAULT_TRANSCRIBER_PROVIDER,
        "model": DEFAULT_TRANSCRIBER_MODEL,
        "language": DEFAULT_TRANSCRIBER_LANGUAGE,
    })
}

fn empty_list() -> Value {
    json!([])
}

fn platform_server_url() -> Value {
    json!(PLATFORM_SERVER_URL)
}

/// Merge policy for every assistant-level field other than name, greeting and model
pub const ASSISTANT_FIELDS: &[AssistantField] = &[
    AssistantField {
        key: "firstMessageMode",
        read: |c| present(&c.first_message_mode),
        rule: FieldRule::OrDefault(default_first_message_mode),
    },
    AssistantField {
        key: "backgroundSound",
        read: |c| present(&c.background_sound),
        rule: FieldRule::OrDefault(default_background_sound),
    },
    AssistantField {
        key: "transcriber",
        read: |c| present(&c.transcriber),
        rule: FieldRule::OrDefault(default_transcriber),
    },
    AssistantField {
        key: "endCallPhrases",
        read: |c| present(&c.end_call_phrases),
        rule: FieldRule::OrDefault(empty_list),
    },
    AssistantField {
        key: "startSpeakingPlan",
        read: |c| present(&c.start_speaking_plan),
        rule: FieldRule::IfPresent,
    },
    AssistantField {
        key: "stopSpeakingPlan",
        read: |c| present(&c.stop_speaking_plan),
        rule: FieldRule::IfPresent,
    },
    AssistantField {
        key: "chunkPlan",
        read: |c| present(&c.chunk_plan),
        rule: FieldRule::IfPresent,
    },
    AssistantField {
        key: "messagePlan",
        read: |c| present(&c.message_plan),
        rule: FieldRule::IfPresent,
    },
    AssistantField {
        key: "clientMessages",
        read: |c| present(&c.client_messages),
        rule: FieldRule::IfPresent,
    },
    AssistantField {
        key: "serverMessages",
        read: |c| present(&c.server_messages),
        rule: FieldRule::IfPresent,
    },
    AssistantField {
        key: "serverUrl",
        read: |c| present(&c.server_url),
        rule: FieldRule::Fixed(platform_server_url),
    },
];

impl AssistantField {
    /// Resolve this field against a config; `None` means the key is left out
    pub fn resolve(&self, config: &IntegrationConfig) -> Option<Value> {
        match self.rule {
            FieldRule::OrDefault(default) => Some((self.read)(config).unwrap_or_else(default)),
            FieldRule::IfPresent => (self.read)(config),
            FieldRule::Fixed(value) => Some(value()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    /// Owning account, null when the integration does not record one
    pub client_id: Option<String>,
}

/// Fully-populated request body for `POST /call/phone`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub assistant: Map<String, Value>,
    #[serde(rename = "type")]
    pub call_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub customer: Customer,
    pub metadata: CallMetadata,
}

impl CallRequest {
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Greeting spoken when the assistant opens the call
pub fn first_message(agent_name: &str) -> String {
    format!("Hi this is {} do you have a moment?", agent_name)
}

fn model_block(script: &str, config: &IntegrationConfig) -> Value {
    let reference = config.model_configuration.as_ref();
    let provider = reference
        .and_then(|r| r.providers.as_ref())
        .map(|p| p.name.as_str())
        .unwrap_or(DEFAULT_MODEL_PROVIDER);
    let model = reference
        .and_then(|r| r.model.as_deref())
        .unwrap_or(DEFAULT_MODEL);

    let mut block = Map::new();
    block.insert("provider".to_string(), json!(provider));
    block.insert("model".to_string(), json!(model));
    block.insert(
        "temperature".to_string(),
        json!(config.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
    );
    block.insert(
        "maxTokens".to_string(),
        json!(config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
    );
    // The script is the only instruction the model receives
    block.insert(
        "messages".to_string(),
        json!([{ "role": "system", "content": script }]),
    );
    if let Some(tools) = present(&config.tools) {
        block.insert("tools".to_string(), tools);
    }
    if let Some(tool_ids) = present(&config.tool_ids) {
        block.insert("toolIds".to_string(), tool_ids);
    }

    Value::Object(block)
}

/// Build the call request for one outbound call.
///
/// Pure: identical inputs always yield identical output. The destination
/// number is passed through unvalidated.
pub fn build_call_request(
    destination_number: &str,
    script: &str,
    agent_name: &str,
    config: &IntegrationConfig,
) -> CallRequest {
    let mut assistant = Map::new();

    // Voice parameters are first-class assistant attributes, not a nested object.
    // Keys the assistant owns (name, model, ...) are written afterwards and win.
    if let Some(Value::Object(voice)) = present(&config.voice) {
        assistant.extend(voice);
    }

    for owned in ["name", "firstMessage", "model"] {
        if assistant.remove(owned).is_some() {
            tracing::debug!("Voice setting '{}' shadowed by assistant field", owned);
        }
    }

    assistant.insert("name".to_string(), json!(agent_name));
    assistant.insert("firstMessage".to_string(), json!(first_message(agent_name)));

    for field in ASSISTANT_FIELDS {
        if let Some(value) = field.resolve(config) {
            assistant.insert(field.key.to_string(), value);
        }
    }

    assistant.insert("model".to_string(), model_block(script, config));

    CallRequest {
        assistant,
        call_type: OUTBOUND_CALL_TYPE.to_string(),
        phone_number_id: config.phone_number_id.clone(),
        phone_number: config.phone_number.clone(),
        customer: Customer {
            number: destination_number.to_string(),
        },
        metadata: CallMetadata {
            client_id: config.account_id.clone(),
        },
    }
}
