pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod mail;
pub mod oauth2;
pub mod service;
pub mod sms;
pub mod store;
pub mod testing;
pub mod voice;

pub use config::DispatchConfig;
pub use error::{DispatchError, DispatchResult};
pub use mail::{DeliveryReceipt, EmailDispatcher, OutgoingEmail};
pub use oauth2::{EmailCredential, EmailProviderKind, TokenLifecycleManager, TokenStatus};
pub use service::NotificationService;
pub use sms::SmsClient;
pub use store::{AgentDirectory, CredentialStore, InMemoryStore, SqliteStore};
pub use voice::{Agent, AgentType, CallDispatcher, IntegrationConfig};
