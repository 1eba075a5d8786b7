//! crates/lumen_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

// Represents a registered user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    /// Session credits purchased through bundles.
    pub available_sessions: i32,
    /// Session credits consumed by starting sessions.
    pub used_sessions: i32,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A bounded conversation between one user and the assistant.
///
/// `started_at` and `ended_at` are RFC 3339 strings pinned to the fixed
/// UTC-3 offset; `ended_at` is unset while the session is active. At most
/// one active session may exist per user.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub is_active: bool,
    /// "low", "medium" or "high"; absent until something escalates it.
    pub risk_level: Option<String>,
    pub sentiment_score: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single turn within a session, ordered by `created_at`.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    /// True for user turns, false for assistant turns.
    pub is_user: bool,
    /// "positive", "negative" or "neutral" once tagged.
    pub sentiment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One-time structured recap of a session. One-to-one with `ChatSession`.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: Uuid,
    pub session_id: Uuid,
    pub overall_sentiment: String,
    pub risk_level: String,
    pub key_topics: Vec<String>,
    pub suggestions: Vec<String>,
    pub progress_observations: Vec<String>,
    pub message_count: i32,
    pub duration_minutes: f64,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
}

/// A purchasable pack granting `quantity` session credits.
#[derive(Debug, Clone)]
pub struct SessionBundle {
    pub id: Uuid,
    pub quantity: i32,
    pub price: f64,
    pub description: Option<String>,
    pub is_active: bool,
}

//=========================================================================================
// Derived / in-flight values (never persisted as-is)
//=========================================================================================

/// Per-label message counts for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Metrics derived from a session and its stored messages.
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub message_count: usize,
    pub duration_minutes: f64,
    pub overall_sentiment: String,
    pub risk_level: String,
    pub sentiment_distribution: SentimentDistribution,
}

/// The structured result of a summary generation call.
#[derive(Debug, Clone, Default)]
pub struct SummaryContent {
    pub summary_text: String,
    pub key_topics: Vec<String>,
    pub suggestions: Vec<String>,
    pub progress_observations: Vec<String>,
}

/// Result of analyzing the sentiment of a single message.
#[derive(Debug, Clone)]
pub struct SentimentAnalysis {
    pub sentiment: String,
    pub confidence: f64,
    pub keywords: Vec<String>,
    pub risk_level: String,
}

/// Everything the gateway needs to build a checkout preference.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub bundle: SessionBundle,
    pub payer_name: String,
    pub payer_email: String,
    pub user_id: Uuid,
}

/// The gateway's answer to a preference creation call.
#[derive(Debug, Clone)]
pub struct CheckoutPreference {
    pub id: String,
    pub init_point: String,
}

/// A payment re-fetched from the gateway by id.
#[derive(Debug, Clone)]
pub struct PaymentInfo {
    pub status: String,
    pub metadata: PaymentMetadata,
}

/// The metadata payload we attach at checkout and read back on webhook.
#[derive(Debug, Clone)]
pub struct PaymentMetadata {
    pub user_id: Uuid,
    pub session_quantity: i32,
}
