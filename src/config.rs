//! Dispatch configuration and platform-wide defaults

use crate::error::{DispatchError, DispatchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Voice-call provider base URL
pub const VOICE_API_URL: &str = "https://api.vapi.ai";
/// Path for placing an outbound phone call
pub const VOICE_CALL_PATH: &str = "/call/phone";
/// Call events always come back to the platform's own receiver
pub const PLATFORM_SERVER_URL: &str =
    "https://weiqhneguxfutfdaxsil.supabase.co/functions/v1/outbound-agent-webhook-receiver";
/// Call type for every request this crate builds
pub const OUTBOUND_CALL_TYPE: &str = "outboundPhoneCall";

pub const DEFAULT_FIRST_MESSAGE_MODE: &str = "assistant-speaks-first";
pub const DEFAULT_BACKGROUND_SOUND: &str = "office";
pub const DEFAULT_TRANSCRIBER_PROVIDER: &str = "deepgram";
pub const DEFAULT_TRANSCRIBER_MODEL: &str = "nova-2";
pub const DEFAULT_TRANSCRIBER_LANGUAGE: &str = "en";
pub const DEFAULT_MODEL_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 250;

/// Subject used when a caller does not supply one
pub const DEFAULT_EMAIL_SUBJECT: &str = "From LeadAI!";

pub const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const MICROSOFT_REFRESH_SCOPE: &str =
    "https://graph.microsoft.com/Mail.Read https://graph.microsoft.com/Mail.Send offline_access";

pub const GRAPH_API_URL: &str = "https://graph.microsoft.com/v1.0";
pub const GRAPH_SEND_MAIL_PATH: &str = "/me/sendMail";
pub const GMAIL_API_URL: &str = "https://gmail.googleapis.com";
pub const GMAIL_SEND_PATH: &str = "/gmail/v1/users/me/messages/send";

pub const SMS_API_URL: &str = "https://api.telnyx.com";
pub const SMS_MESSAGES_PATH: &str = "/v2/messages";
/// Shared sending number; not configurable per account
pub const SMS_SENDER_NUMBER: &str = "+61489900690";
pub const SMS_MESSAGING_PROFILE_ID: &str = "400197bf-b007-4314-9f9f-c5cd0b7b67ae";
pub const SMS_SUBJECT: &str = "From LeadAI!";

/// Voice provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub api_url: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_url: VOICE_API_URL.to_string(),
        }
    }
}

/// SMS provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_key: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_url: SMS_API_URL.to_string(),
            api_key: String::new(),
        }
    }
}

/// OAuth2 client registrations used for refresh grants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthClientConfig {
    pub microsoft_client_id: String,
    pub microsoft_client_secret: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    /// Token endpoint overrides, mostly useful against a local stub
    pub microsoft_token_url: Option<String>,
    pub google_token_url: Option<String>,
}

/// Mail API endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub graph_api_url: String,
    pub gmail_api_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            graph_api_url: GRAPH_API_URL.to_string(),
            gmail_api_url: GMAIL_API_URL.to_string(),
        }
    }
}

/// Top-level configuration for the dispatch core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// SQLite connection string for the agent/integration/mailbox store
    pub database_url: String,
    /// Per-request timeout applied by the HTTP transport
    pub request_timeout_secs: u64,
    pub voice: VoiceConfig,
    pub sms: SmsConfig,
    pub oauth: OAuthClientConfig,
    pub mail: MailConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://outreach.db".to_string(),
            request_timeout_secs: 30,
            voice: VoiceConfig::default(),
            sms: SmsConfig::default(),
            oauth: OAuthClientConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("outreach").join("config.toml")
        } else {
            PathBuf::from(".").join("outreach.toml")
        }
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub async fn load_from_file(path: &Path) -> DispatchResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DispatchError::InvalidConfig(format!("Failed to read config: {}", e)))?;

        let config: DispatchConfig = toml::from_str(&content)
            .map_err(|e| DispatchError::InvalidConfig(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> DispatchResult<()> {
        self.validate()?;

        let content = toml::to_string_pretty(self).map_err(|e| {
            DispatchError::InvalidConfig(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DispatchError::InvalidConfig(format!("Failed to create config directory: {}", e))
            })?;
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|e| DispatchError::InvalidConfig(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Override secrets from the environment
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 5] = [
            ("OUTREACH_SMS_API_KEY", &mut self.sms.api_key),
            ("OUTREACH_MICROSOFT_CLIENT_ID", &mut self.oauth.microsoft_client_id),
            ("OUTREACH_MICROSOFT_CLIENT_SECRET", &mut self.oauth.microsoft_client_secret),
            ("OUTREACH_GOOGLE_CLIENT_ID", &mut self.oauth.google_client_id),
            ("OUTREACH_GOOGLE_CLIENT_SECRET", &mut self.oauth.google_client_secret),
        ];

        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *slot = value;
                }
            }
        }
    }

    /// Validate configuration settings
    pub fn validate(&self) -> DispatchResult<()> {
        for (name, url) in [
            ("voice.api_url", &self.voice.api_url),
            ("sms.api_url", &self.sms.api_url),
            ("mail.graph_api_url", &self.mail.graph_api_url),
            ("mail.gmail_api_url", &self.mail.gmail_api_url),
        ] {
            url::Url::parse(url)
                .map_err(|e| DispatchError::InvalidConfig(format!("{} is not a valid URL: {}", name, e)))?;
        }

        if self.request_timeout_secs == 0 {
            return Err(DispatchError::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.database_url.is_empty() {
            return Err(DispatchError::InvalidConfig(
                "Database URL cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn microsoft_token_url(&self) -> &str {
        self.oauth
            .microsoft_token_url
            .as_deref()
            .unwrap_or(MICROSOFT_TOKEN_URL)
    }

    pub fn google_token_url(&self) -> &str {
        self.oauth.google_token_url.as_deref().unwrap_or(GOOGLE_TOKEN_URL)
    }
}

/// Join a base URL and a path without doubling or dropping the slash
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
