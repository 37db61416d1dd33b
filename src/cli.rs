use crate::config::DispatchConfig;
use crate::oauth2::EmailProviderKind;
use crate::service::NotificationService;
use crate::sms::SmsPayload;
use crate::store::{AgentDirectory, CredentialStore, SqliteStore};
use crate::voice::{build_call_request, AgentType};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "outreach")]
#[command(about = "Outbound calls, SMS and email on behalf of client accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show what would be sent without contacting any provider
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Call a number with the account's newest active outbound agent
    Call {
        /// Client account id
        #[arg(long)]
        account: String,

        /// Destination phone number (E.164)
        #[arg(long)]
        to: String,

        /// System prompt for the call
        #[arg(long)]
        script: String,
    },

    /// Send an SMS from the shared sender number
    Sms {
        /// Destination phone number (E.164)
        #[arg(long)]
        to: String,

        #[arg(long)]
        body: String,
    },

    /// Send an email from a connected mailbox
    Email {
        /// Client account id owning the mailbox
        #[arg(long)]
        account: String,

        /// Connected mailbox address to send from
        #[arg(long)]
        mailbox: String,

        /// Recipient address
        #[arg(long)]
        to: String,

        #[arg(long)]
        body: String,

        #[arg(long)]
        subject: Option<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration with secrets masked
    Show,
}

/// Command-line interface handler
pub struct CliHandler {
    config: DispatchConfig,
    config_path: PathBuf,
}

impl CliHandler {
    /// Create a new CLI handler
    pub async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(DispatchConfig::default_path);

        let mut config = DispatchConfig::load_from_file(&config_path)
            .await
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        config.apply_env_overrides();

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands, dry_run: bool) -> Result<()> {
        match command {
            Commands::Call {
                account,
                to,
                script,
            } => self.handle_call(&account, &to, &script, dry_run).await,
            Commands::Sms { to, body } => self.handle_sms(&to, &body, dry_run).await,
            Commands::Email {
                account,
                mailbox,
                to,
                body,
                subject,
            } => {
                self.handle_email(&account, &mailbox, &to, &body, subject.as_deref(), dry_run)
                    .await
            }
            Commands::Config { command } => self.handle_config(command, dry_run).await,
        }
    }

    async fn open_store(&self) -> Result<Arc<SqliteStore>> {
        let store = SqliteStore::new(&self.config.database_url)
            .await
            .with_context(|| format!("Failed to open {}", self.config.database_url))?;
        Ok(Arc::new(store))
    }

    async fn service(&self) -> Result<NotificationService> {
        let store = self.open_store().await?;
        Ok(NotificationService::connect(&self.config, store)?)
    }

    async fn handle_call(&self, account: &str, to: &str, script: &str, dry_run: bool) -> Result<()> {
        if dry_run {
            let store = self.open_store().await?;
            let agent = store
                .most_recent_active_agent(account, AgentType::Outbound)
                .await?
                .ok_or_else(|| anyhow!("No active outbound agent for account {}", account))?;
            let integration = store
                .integration_for(account, &agent.id)
                .await?
                .ok_or_else(|| anyhow!("Agent {} has no voice integration", agent.id))?;

            println!("Would call {} as {} ({})", to, agent.name, agent.id);
            return print_json(&build_call_request(to, script, &agent.name, &integration));
        }

        let response = self
            .service()
            .await?
            .initiate_call_using_recent_active_agent(account, to, script)
            .await?;
        print_json(&response)
    }

    async fn handle_sms(&self, to: &str, body: &str, dry_run: bool) -> Result<()> {
        if dry_run {
            println!("Would send SMS to {}", to);
            return print_json(&SmsPayload::new(to, body));
        }

        match self.service().await?.send_sms(to, body).await {
            Some(response) => print_json(&response),
            None => Err(anyhow!("SMS to {} was not sent", to)),
        }
    }

    async fn handle_email(
        &self,
        account: &str,
        mailbox: &str,
        to: &str,
        body: &str,
        subject: Option<&str>,
        dry_run: bool,
    ) -> Result<()> {
        if dry_run {
            let store = self.open_store().await?;
            let credential = store
                .load_credential(account, mailbox)
                .await?
                .ok_or_else(|| anyhow!("Mailbox {} is not connected for account {}", mailbox, account))?;

            println!(
                "Would send email from {} to {} via {}{}",
                credential.mailbox,
                to,
                credential.provider.display_name(),
                if credential.is_expired() {
                    " after refreshing the access token"
                } else {
                    ""
                }
            );
            return Ok(());
        }

        match self
            .service()
            .await?
            .send_email_from_stage_task(account, mailbox, body, to, subject)
            .await
        {
            Some(receipt) => {
                println!("{}", receipt.summary);
                print_json(&receipt.response)
            }
            None => Err(anyhow!("Email from {} to {} was not sent", mailbox, to)),
        }
    }

    async fn handle_config(&self, command: ConfigCommands, dry_run: bool) -> Result<()> {
        match command {
            ConfigCommands::Init { force } => {
                if self.config_path.exists() && !force {
                    return Err(anyhow!(
                        "{} already exists, use --force to overwrite",
                        self.config_path.display()
                    ));
                }

                if dry_run {
                    println!("Would write default configuration to {}", self.config_path.display());
                    return Ok(());
                }

                DispatchConfig::default().save_to_file(&self.config_path).await?;
                println!("Wrote default configuration to {}", self.config_path.display());
                Ok(())
            }
            ConfigCommands::Show => {
                let mut shown = self.config.clone();
                for secret in [
                    &mut shown.sms.api_key,
                    &mut shown.oauth.microsoft_client_secret,
                    &mut shown.oauth.google_client_secret,
                ] {
                    *secret = mask(secret);
                }

                println!("# {}", self.config_path.display());
                println!("{}", toml::to_string_pretty(&shown)?);
                for provider in EmailProviderKind::supported_providers() {
                    let configured = match provider {
                        EmailProviderKind::Microsoft => !self.config.oauth.microsoft_client_id.is_empty(),
                        EmailProviderKind::Google => !self.config.oauth.google_client_id.is_empty(),
                    };
                    println!(
                        "# {} refresh client: {}",
                        provider.display_name(),
                        if configured { "configured" } else { "missing" }
                    );
                }
                Ok(())
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}
