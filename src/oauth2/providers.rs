use crate::config::{DispatchConfig, MICROSOFT_REFRESH_SCOPE};
use crate::error::{DispatchError, DispatchResult};
use serde::{Deserialize, Serialize};

/// Mail providers a mailbox can be connected through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailProviderKind {
    #[serde(rename = "azure-ad", alias = "microsoft", alias = "outlook")]
    Microsoft,
    #[serde(rename = "google", alias = "gmail")]
    Google,
}

impl EmailProviderKind {
    /// Tag stored alongside the mailbox
    pub fn as_str(&self) -> &str {
        match self {
            EmailProviderKind::Microsoft => "azure-ad",
            EmailProviderKind::Google => "google",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            EmailProviderKind::Microsoft => "Microsoft",
            EmailProviderKind::Google => "Google",
        }
    }

    /// Scope sent with a refresh grant; Google does not take one
    pub fn refresh_scope(&self) -> Option<&'static str> {
        match self {
            EmailProviderKind::Microsoft => Some(MICROSOFT_REFRESH_SCOPE),
            EmailProviderKind::Google => None,
        }
    }

    pub fn supported_providers() -> Vec<EmailProviderKind> {
        vec![EmailProviderKind::Microsoft, EmailProviderKind::Google]
    }
}

impl std::str::FromStr for EmailProviderKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> DispatchResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "azure-ad" | "microsoft" | "outlook" => Ok(EmailProviderKind::Microsoft),
            "google" | "gmail" => Ok(EmailProviderKind::Google),
            _ => Err(DispatchError::InvalidProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for EmailProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// App registration used to refresh tokens with one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

impl ClientRegistration {
    /// Registration for `provider` from the dispatch config
    pub fn for_provider(config: &DispatchConfig, provider: EmailProviderKind) -> Self {
        match provider {
            EmailProviderKind::Microsoft => Self {
                client_id: config.oauth.microsoft_client_id.clone(),
                client_secret: config.oauth.microsoft_client_secret.clone(),
                token_url: config.microsoft_token_url().to_string(),
            },
            EmailProviderKind::Google => Self {
                client_id: config.oauth.google_client_id.clone(),
                client_secret: config.oauth.google_client_secret.clone(),
                token_url: config.google_token_url().to_string(),
            },
        }
    }

    pub fn validate(&self, provider: EmailProviderKind) -> DispatchResult<()> {
        if self.client_id.is_empty() {
            return Err(DispatchError::InvalidConfig(format!(
                "{} client ID is required",
                provider.display_name()
            )));
        }

        if self.client_secret.is_empty() {
            return Err(DispatchError::InvalidConfig(format!(
                "{} client secret is required",
                provider.display_name()
            )));
        }

        url::Url::parse(&self.token_url).map_err(|e| {
            DispatchError::InvalidConfig(format!("Invalid token URL {}: {}", self.token_url, e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GOOGLE_TOKEN_URL, MICROSOFT_TOKEN_URL};

    #[test]
    fn test_provider_tags() {
        assert_eq!("azure-ad".parse::<EmailProviderKind>().unwrap(), EmailProviderKind::Microsoft);
        assert_eq!("Outlook".parse::<EmailProviderKind>().unwrap(), EmailProviderKind::Microsoft);
        assert_eq!("google".parse::<EmailProviderKind>().unwrap(), EmailProviderKind::Google);
        assert_eq!("gmail".parse::<EmailProviderKind>().unwrap(), EmailProviderKind::Google);
        assert!(matches!(
            "yahoo".parse::<EmailProviderKind>(),
            Err(DispatchError::InvalidProvider(_))
        ));

        for provider in EmailProviderKind::supported_providers() {
            assert_eq!(provider.as_str().parse::<EmailProviderKind>().unwrap(), provider);
        }
    }

    #[test]
    fn test_serde_tags() {
        let kind: EmailProviderKind = serde_json::from_str("\"azure-ad\"").unwrap();
        assert_eq!(kind, EmailProviderKind::Microsoft);
        assert_eq!(serde_json::to_string(&EmailProviderKind::Google).unwrap(), "\"google\"");
    }

    #[test]
    fn test_refresh_scope_only_for_microsoft() {
        assert_eq!(EmailProviderKind::Microsoft.refresh_scope(), Some(MICROSOFT_REFRESH_SCOPE));
        assert_eq!(EmailProviderKind::Google.refresh_scope(), None);
    }

    #[test]
    fn test_registration_from_config() {
        let mut config = DispatchConfig::default();
        config.oauth.microsoft_client_id = "ms-id".to_string();
        config.oauth.microsoft_client_secret = "ms-secret".to_string();

        let microsoft = ClientRegistration::for_provider(&config, EmailProviderKind::Microsoft);
        assert_eq!(microsoft.token_url, MICROSOFT_TOKEN_URL);
        assert!(microsoft.validate(EmailProviderKind::Microsoft).is_ok());

        let google = ClientRegistration::for_provider(&config, EmailProviderKind::Google);
        assert_eq!(google.token_url, GOOGLE_TOKEN_URL);
        assert!(google.validate(EmailProviderKind::Google).is_err());
    }
}
