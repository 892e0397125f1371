pub mod models;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::engine::profile::Profile;
use crate::error::StoreError;
use models::{DialogueState, DialogueStateRow, Message, ProfileRow, Role};

/// Persistence used by the request handlers.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), StoreError>;

    /// The newest `limit` messages of a session, oldest first.
    async fn recent_messages(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError>;

    async fn last_bot_message(&self, session_id: &str) -> Result<Option<String>, StoreError>;

    async fn get_profile(&self, session_id: &str) -> Result<Option<Profile>, StoreError>;

    /// Replace the stored profile of a session, creating it if needed.
    async fn upsert_profile(
        &self,
        session_id: &str,
        profile: &Profile,
    ) -> Result<Profile, StoreError>;

    async fn get_dialogue_state(
        &self,
        session_id: &str,
    ) -> Result<Option<DialogueState>, StoreError>;

    async fn set_dialogue_state(
        &self,
        session_id: &str,
        state: DialogueState,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: PgPool,
    timeout: Duration,
}

impl Database {
    pub async fn connect(database_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;
        Ok(Self { pool, timeout })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        // Each CREATE TABLE must be a separate query (Postgres doesn't allow
        // multiple commands in a single prepared statement).

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS user_profiles (
                session_id TEXT PRIMARY KEY,
                birthdate TEXT,
                birthtime TEXT,
                city TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS dialogue_state (
                session_id TEXT PRIMARY KEY,
                phase TEXT NOT NULL,
                topic TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl Store for Database {
    // ── Message Operations ─────────────────────────────────────────

    async fn insert_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query("INSERT INTO messages (session_id, role, content) VALUES ($1, $2, $3)")
                .bind(session_id)
                .bind(role.as_str())
                .bind(content)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Message>(
                r#"
                SELECT * FROM (
                    SELECT * FROM messages
                    WHERE session_id = $1
                    ORDER BY timestamp DESC
                    LIMIT $2
                ) recent
                ORDER BY timestamp ASC
                "#,
            )
            .bind(session_id)
            .bind(limit)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn last_bot_message(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = self
            .bounded(
                sqlx::query_as(
                    r#"
                    SELECT content FROM messages
                    WHERE session_id = $1 AND role IN ('assistant', 'bot')
                    ORDER BY timestamp DESC
                    LIMIT 1
                    "#,
                )
                .bind(session_id)
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(|r| r.0))
    }

    // ── Profile Operations ─────────────────────────────────────────

    async fn get_profile(&self, session_id: &str) -> Result<Option<Profile>, StoreError> {
        let row = self
            .bounded(
                sqlx::query_as::<_, ProfileRow>("SELECT * FROM user_profiles WHERE session_id = $1")
                    .bind(session_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(Profile::from))
    }

    async fn upsert_profile(
        &self,
        session_id: &str,
        profile: &Profile,
    ) -> Result<Profile, StoreError> {
        let row = self
            .bounded(
                sqlx::query_as::<_, ProfileRow>(
                    r#"
                    INSERT INTO user_profiles (session_id, birthdate, birthtime, city)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (session_id) DO UPDATE SET
                        birthdate = EXCLUDED.birthdate,
                        birthtime = EXCLUDED.birthtime,
                        city = EXCLUDED.city,
                        updated_at = NOW()
                    RETURNING *
                    "#,
                )
                .bind(session_id)
                .bind(profile.birthdate.as_deref())
                .bind(profile.birthtime.as_deref())
                .bind(profile.city.as_deref())
                .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    // ── Dialogue State Operations ──────────────────────────────────

    async fn get_dialogue_state(
        &self,
        session_id: &str,
    ) -> Result<Option<DialogueState>, StoreError> {
        let row = self
            .bounded(
                sqlx::query_as::<_, DialogueStateRow>(
                    "SELECT * FROM dialogue_state WHERE session_id = $1",
                )
                .bind(session_id)
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.and_then(DialogueStateRow::into_state))
    }

    async fn set_dialogue_state(
        &self,
        session_id: &str,
        state: DialogueState,
    ) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query(
                r#"
                INSERT INTO dialogue_state (session_id, phase, topic)
                VALUES ($1, $2, $3)
                ON CONFLICT (session_id) DO UPDATE SET
                    phase = EXCLUDED.phase,
                    topic = COALESCE(EXCLUDED.topic, dialogue_state.topic),
                    updated_at = NOW()
                "#,
            )
            .bind(session_id)
            .bind(state.phase.as_str())
            .bind(state.topic.map(|t| t.key()))
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
