//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lumen_core::domain::{
    ChatMessage, ChatSession, SessionBundle, SessionMetrics, SessionSummary, SummaryContent, User,
    UserCredentials,
};
use lumen_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    name: String,
    is_active: bool,
    available_sessions: i32,
    used_sessions: i32,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            is_active: self.is_active,
            available_sessions: self.available_sessions,
            used_sessions: self.used_sessions,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    name: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            id: self.id,
            email: self.email,
            name: self.name,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    started_at: String,
    ended_at: Option<String>,
    is_active: bool,
    risk_level: Option<String>,
    sentiment_score: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> ChatSession {
        ChatSession {
            id: self.id,
            user_id: self.user_id,
            started_at: self.started_at,
            ended_at: self.ended_at,
            is_active: self.is_active,
            risk_level: self.risk_level,
            sentiment_score: self.sentiment_score,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, started_at, ended_at, is_active, risk_level, sentiment_score, created_at, updated_at";

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    session_id: Uuid,
    content: String,
    is_user: bool,
    sentiment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            session_id: self.session_id,
            content: self.content,
            is_user: self.is_user,
            sentiment: self.sentiment,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    id: Uuid,
    session_id: Uuid,
    overall_sentiment: String,
    risk_level: String,
    key_topics: Vec<String>,
    suggestions: Vec<String>,
    progress_observations: Vec<String>,
    message_count: i32,
    duration_minutes: f64,
    summary_text: String,
    created_at: DateTime<Utc>,
}
impl SummaryRecord {
    fn to_domain(self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            session_id: self.session_id,
            overall_sentiment: self.overall_sentiment,
            risk_level: self.risk_level,
            key_topics: self.key_topics,
            suggestions: self.suggestions,
            progress_observations: self.progress_observations,
            message_count: self.message_count,
            duration_minutes: self.duration_minutes,
            summary_text: self.summary_text,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct BundleRecord {
    id: Uuid,
    quantity: i32,
    price: f64,
    description: Option<String>,
    is_active: bool,
}
impl BundleRecord {
    fn to_domain(self) -> SessionBundle {
        SessionBundle {
            id: self.id,
            quantity: self.quantity,
            price: self.price,
            description: self.description,
            is_active: self.is_active,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, name, hashed_password) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, email, name, is_active, available_sessions, used_sessions, created_at, last_login",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("Email already registered".to_string())
            } else {
                unexpected(e)
            }
        })?;

        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, name, is_active, available_sessions, used_sessions, created_at, last_login \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, name, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, name, is_active, available_sessions, used_sessions, created_at, last_login \
             FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn record_login(&self, user_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn credit_sessions(&self, user_id: Uuid, quantity: i32) -> PortResult<()> {
        let result =
            sqlx::query("UPDATE users SET available_sessions = available_sessions + $1 WHERE id = $2")
                .bind(quantity)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn start_session(&self, user_id: Uuid, started_at: &str) -> PortResult<ChatSession> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Atomic credit consumption; zero rows means no credits (or no user).
        let consumed = sqlx::query(
            "UPDATE users SET used_sessions = used_sessions + 1 \
             WHERE id = $1 AND used_sessions < available_sessions",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        if consumed.rows_affected() == 0 {
            let exists =
                sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                    .bind(user_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(unexpected)?;
            return Err(if exists {
                PortError::PermissionDenied(
                    "No session credits left. Purchase a bundle to continue.".to_string(),
                )
            } else {
                PortError::NotFound(format!("User {} not found", user_id))
            });
        }

        // The partial unique index on (user_id) WHERE is_active rejects a
        // second active session here, rolling back the credit above.
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO chat_sessions (id, user_id, started_at) VALUES ($1, $2, $3) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(started_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(
                    "You already have an active session. End it before starting a new one."
                        .to_string(),
                )
            } else {
                unexpected(e)
            }
        })?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn end_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        ended_at: &str,
    ) -> PortResult<ChatSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE chat_sessions SET is_active = FALSE, ended_at = $1, updated_at = NOW() \
             WHERE id = $2 AND user_id = $3 AND is_active \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(ended_at)
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => Ok(record.to_domain()),
            None => {
                // Distinguish "already ended" from "not yours / missing".
                let owned = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM chat_sessions WHERE id = $1 AND user_id = $2)",
                )
                .bind(session_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;

                Err(if owned {
                    PortError::Conflict("This session has already ended".to_string())
                } else {
                    PortError::NotFound(format!("Session {} not found", session_id))
                })
            }
        }
    }

    async fn get_active_session(&self, user_id: Uuid) -> PortResult<ChatSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE user_id = $1 AND is_active"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("No active session found".to_string()),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn get_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<ChatSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 AND user_id = $2"
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Session {} not found", session_id))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        newest_first: bool,
    ) -> PortResult<Vec<ChatSession>> {
        let order = if newest_first { "DESC" } else { "ASC" };
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE user_id = $1 ORDER BY created_at {order}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn escalate_risk_level(&self, session_id: Uuid, risk_level: &str) -> PortResult<()> {
        sqlx::query("UPDATE chat_sessions SET risk_level = $1, updated_at = NOW() WHERE id = $2")
            .bind(risk_level)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn save_message(
        &self,
        session_id: Uuid,
        content: &str,
        is_user: bool,
        sentiment: Option<&str>,
    ) -> PortResult<ChatMessage> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO chat_messages (id, session_id, content, is_user, sentiment) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, session_id, content, is_user, sentiment, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(content)
        .bind(is_user)
        .bind(sentiment)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        // The session was touched by this turn.
        sqlx::query("UPDATE chat_sessions SET updated_at = NOW() WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn get_messages(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, session_id, content, is_user, sentiment, created_at, updated_at \
             FROM chat_messages WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, session_id, content, is_user, sentiment, created_at, updated_at \
             FROM chat_messages WHERE session_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_summary(
        &self,
        session_id: Uuid,
        metrics: &SessionMetrics,
        content: &SummaryContent,
    ) -> PortResult<SessionSummary> {
        let record = sqlx::query_as::<_, SummaryRecord>(
            "INSERT INTO session_summaries \
             (id, session_id, overall_sentiment, risk_level, key_topics, suggestions, \
              progress_observations, message_count, duration_minutes, summary_text) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id, session_id, overall_sentiment, risk_level, key_topics, suggestions, \
                       progress_observations, message_count, duration_minutes, summary_text, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(&metrics.overall_sentiment)
        .bind(&metrics.risk_level)
        .bind(&content.key_topics)
        .bind(&content.suggestions)
        .bind(&content.progress_observations)
        .bind(metrics.message_count as i32)
        .bind(metrics.duration_minutes)
        .bind(&content.summary_text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("Summary already exists for this session".to_string())
            } else {
                unexpected(e)
            }
        })?;

        Ok(record.to_domain())
    }

    async fn get_summary(&self, session_id: Uuid) -> PortResult<Option<SessionSummary>> {
        let record = sqlx::query_as::<_, SummaryRecord>(
            "SELECT id, session_id, overall_sentiment, risk_level, key_topics, suggestions, \
                    progress_observations, message_count, duration_minutes, summary_text, created_at \
             FROM session_summaries WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn list_active_bundles(&self) -> PortResult<Vec<SessionBundle>> {
        let records = sqlx::query_as::<_, BundleRecord>(
            "SELECT id, quantity, price, description, is_active \
             FROM session_bundles WHERE is_active ORDER BY quantity",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_bundle(
        &self,
        quantity: i32,
        price: f64,
        description: Option<&str>,
        is_active: bool,
    ) -> PortResult<SessionBundle> {
        let record = sqlx::query_as::<_, BundleRecord>(
            "INSERT INTO session_bundles (id, quantity, price, description, is_active) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, quantity, price, description, is_active",
        )
        .bind(Uuid::new_v4())
        .bind(quantity)
        .bind(price)
        .bind(description)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn get_active_bundle(&self, bundle_id: Uuid) -> PortResult<SessionBundle> {
        let record = sqlx::query_as::<_, BundleRecord>(
            "SELECT id, quantity, price, description, is_active \
             FROM session_bundles WHERE id = $1 AND is_active",
        )
        .bind(bundle_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::InvalidInput("Invalid bundle ID or bundle not active".to_string())
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }
}
