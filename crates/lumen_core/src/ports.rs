//! crates/lumen_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatSession, CheckoutPreference, CheckoutRequest, PaymentInfo, SentimentAnalysis,
    SessionBundle, SessionMetrics, SessionSummary, SummaryContent, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not allowed: {0}")]
    PermissionDenied(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn list_users(&self) -> PortResult<Vec<User>>;

    async fn record_login(&self, user_id: Uuid) -> PortResult<()>;

    /// Adds purchased session credits to `available_sessions`.
    async fn credit_sessions(&self, user_id: Uuid, quantity: i32) -> PortResult<()>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Chat Sessions ---

    /// Starts a new chat session for `user_id`.
    ///
    /// Consumes one session credit and inserts the session row in a single
    /// transaction. Fails with `PermissionDenied` when the user has no
    /// remaining credits and with `Conflict` when an active session exists.
    async fn start_session(&self, user_id: Uuid, started_at: &str) -> PortResult<ChatSession>;

    /// Ends the caller's active session. `Conflict` if it already ended.
    async fn end_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        ended_at: &str,
    ) -> PortResult<ChatSession>;

    async fn get_active_session(&self, user_id: Uuid) -> PortResult<ChatSession>;

    /// Fetches a session, enforcing that it belongs to `user_id`.
    async fn get_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<ChatSession>;

    async fn list_sessions(&self, user_id: Uuid, newest_first: bool)
        -> PortResult<Vec<ChatSession>>;

    async fn escalate_risk_level(&self, session_id: Uuid, risk_level: &str) -> PortResult<()>;

    // --- Chat Messages ---
    async fn save_message(
        &self,
        session_id: Uuid,
        content: &str,
        is_user: bool,
        sentiment: Option<&str>,
    ) -> PortResult<ChatMessage>;

    /// All messages of a session, oldest first.
    async fn get_messages(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>>;

    /// The most recent `limit` messages, newest first.
    async fn recent_messages(&self, session_id: Uuid, limit: i64) -> PortResult<Vec<ChatMessage>>;

    // --- Summaries ---

    /// Inserts the one-and-only summary row for a session.
    /// `Conflict` if one already exists.
    async fn create_summary(
        &self,
        session_id: Uuid,
        metrics: &SessionMetrics,
        content: &SummaryContent,
    ) -> PortResult<SessionSummary>;

    async fn get_summary(&self, session_id: Uuid) -> PortResult<Option<SessionSummary>>;

    // --- Bundles ---
    async fn list_active_bundles(&self) -> PortResult<Vec<SessionBundle>>;

    async fn create_bundle(
        &self,
        quantity: i32,
        price: f64,
        description: Option<&str>,
        is_active: bool,
    ) -> PortResult<SessionBundle>;

    /// Looks up a bundle that is still purchasable (`is_active = true`).
    async fn get_active_bundle(&self, bundle_id: Uuid) -> PortResult<SessionBundle>;
}

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Generates the assistant's reply to a user message, given the most
    /// recent messages of the session as context (newest first).
    async fn generate_reply(&self, message: &str, context: &[ChatMessage]) -> PortResult<String>;

    /// Tags a piece of text with a sentiment label and risk level.
    async fn analyze_sentiment(&self, text: &str) -> PortResult<SentimentAnalysis>;
}

#[async_trait]
pub trait SummaryGenerationService: Send + Sync {
    /// Produces the structured recap of a session from its full transcript
    /// and pre-computed metrics. Called at most once per session.
    async fn generate_summary(
        &self,
        messages: &[ChatMessage],
        metrics: &SessionMetrics,
    ) -> PortResult<SummaryContent>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a checkout preference for a bundle purchase.
    async fn create_preference(&self, request: &CheckoutRequest)
        -> PortResult<CheckoutPreference>;

    /// Re-fetches a payment by id. Webhook handling never trusts the status
    /// embedded in the notification body; it goes through this call instead.
    async fn get_payment(&self, payment_id: &str) -> PortResult<PaymentInfo>;
}
