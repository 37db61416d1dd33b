use crate::error::{DispatchError, DispatchResult};
use crate::oauth2::EmailCredential;
use crate::store::{AgentDirectory, CredentialStore};
use crate::voice::{Agent, AgentType, IntegrationConfig};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

/// Account database backed by SQLite
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url`
    pub async fn new(database_url: &str) -> DispatchResult<Self> {
        if !sqlx::Sqlite::database_exists(database_url).await.unwrap_or(false) {
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create a new in-memory store for testing
    pub async fn new_in_memory() -> DispatchResult<Self> {
        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> DispatchResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                client_id TEXT NOT NULL,
                agent_type TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TEXT NOT NULL -- RFC 3339, UTC, fixed width
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_agents_selection
            ON agents (client_id, agent_type, is_active, created_at)
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voice_integrations (
                client_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                settings TEXT NOT NULL, -- JSON IntegrationConfig
                auth_token TEXT,
                PRIMARY KEY (client_id, agent_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mailboxes (
                client_id TEXT NOT NULL,
                email TEXT NOT NULL,
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at INTEGER NOT NULL, -- epoch seconds
                PRIMARY KEY (client_id, email)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn timestamp(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub async fn insert_agent(&self, agent: &Agent) -> DispatchResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO agents (id, name, client_id, agent_type, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.account_id)
        .bind(agent.agent_type.as_str())
        .bind(agent.is_active)
        .bind(Self::timestamp(&agent.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_integration(
        &self,
        account_id: &str,
        agent_id: &str,
        config: &IntegrationConfig,
    ) -> DispatchResult<()> {
        // The token lives in its own column only
        let settings = serde_json::to_string(&IntegrationConfig {
            auth_token: None,
            ..config.clone()
        })?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO voice_integrations (client_id, agent_id, settings, auth_token)
            VALUES (?, ?, ?, ?)
        "#,
        )
        .bind(account_id)
        .bind(agent_id)
        .bind(settings)
        .bind(config.auth_token.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_credential(&self, credential: &EmailCredential) -> DispatchResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO mailboxes
                (client_id, email, provider, access_token, refresh_token, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&credential.account_id)
        .bind(&credential.mailbox)
        .bind(credential.provider.as_str())
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_agent(row: &SqliteRow) -> DispatchResult<Agent> {
        let agent_type: String = row.get("agent_type");
        let created_at: String = row.get("created_at");

        Ok(Agent {
            id: row.get("id"),
            name: row.get("name"),
            account_id: row.get("client_id"),
            agent_type: agent_type.parse().map_err(DispatchError::Store)?,
            is_active: row.get("is_active"),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| DispatchError::Store(format!("Invalid created_at {}: {}", created_at, e)))?
                .with_timezone(&Utc),
        })
    }

    fn row_to_credential(row: &SqliteRow) -> DispatchResult<EmailCredential> {
        let provider: String = row.get("provider");

        Ok(EmailCredential {
            provider: provider.parse()?,
            account_id: row.get("client_id"),
            mailbox: row.get("email"),
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            expires_at: row.get("expires_at"),
        })
    }
}

#[async_trait]
impl AgentDirectory for SqliteStore {
    async fn most_recent_active_agent(
        &self,
        account_id: &str,
        agent_type: AgentType,
    ) -> DispatchResult<Option<Agent>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, client_id, agent_type, is_active, created_at
            FROM agents
            WHERE client_id = ? AND agent_type = ? AND is_active = TRUE
            ORDER BY created_at DESC, id DESC
            LIMIT 1
        "#,
        )
        .bind(account_id)
        .bind(agent_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_agent).transpose()
    }

    async fn integration_for(
        &self,
        account_id: &str,
        agent_id: &str,
    ) -> DispatchResult<Option<IntegrationConfig>> {
        let row = sqlx::query(
            "SELECT settings, auth_token FROM voice_integrations WHERE client_id = ? AND agent_id = ?",
        )
        .bind(account_id)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let settings: String = row.get("settings");
        let mut config: IntegrationConfig = serde_json::from_str(&settings)?;
        let auth_token: Option<String> = row.get("auth_token");
        if auth_token.is_some() {
            config.auth_token = auth_token;
        }

        Ok(Some(config))
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn load_credential(
        &self,
        account_id: &str,
        mailbox: &str,
    ) -> DispatchResult<Option<EmailCredential>> {
        let row = sqlx::query(
            r#"
            SELECT client_id, email, provider, access_token, refresh_token, expires_at
            FROM mailboxes
            WHERE client_id = ? AND email = ?
        "#,
        )
        .bind(account_id)
        .bind(mailbox)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_credential).transpose()
    }

    async fn update_tokens(&self, credential: &EmailCredential) -> DispatchResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE mailboxes
            SET access_token = ?, refresh_token = ?, expires_at = ?
            WHERE client_id = ? AND email = ?
        "#,
        )
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .bind(&credential.account_id)
        .bind(&credential.mailbox)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DispatchError::CredentialNotFound {
                account_id: credential.account_id.clone(),
                mailbox: credential.mailbox.clone(),
            });
        }

        Ok(())
    }
}
