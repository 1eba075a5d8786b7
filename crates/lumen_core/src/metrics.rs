//! crates/lumen_core/src/metrics.rs
//!
//! Pure derivation of session metrics from a session and its stored messages.
//! Kept free of database access so it can be unit tested with plain structs.

use chrono::{DateTime, FixedOffset, Utc};

use crate::domain::{ChatMessage, ChatSession, SentimentDistribution, SessionMetrics};
use crate::ports::{PortError, PortResult};

/// Wall-clock timestamps are pinned to UTC-3 (America/Sao_Paulo, no DST).
pub const UTC_OFFSET_SECS: i32 = -3 * 3600;

/// The fixed UTC-3 offset used for all user-facing timestamps.
pub fn local_offset() -> FixedOffset {
    // -10800 seconds is always in range.
    FixedOffset::east_opt(UTC_OFFSET_SECS).unwrap()
}

/// The current instant in the fixed local offset.
pub fn local_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&local_offset())
}

/// Derives duration, message count and sentiment distribution for a session.
///
/// `now` stands in for `ended_at` on a still-active session. The duration is
/// fractional minutes and may come out negative when the stored timestamps
/// are inconsistent; that is passed through, not guarded.
pub fn calculate_session_metrics(
    session: &ChatSession,
    messages: &[ChatMessage],
    now: DateTime<FixedOffset>,
) -> PortResult<SessionMetrics> {
    let start_time = parse_local(&session.started_at)?;
    let end_time = match &session.ended_at {
        Some(ended_at) => parse_local(ended_at)?,
        None => now,
    };
    let duration_minutes = (end_time - start_time).num_milliseconds() as f64 / 60_000.0;

    let mut distribution = SentimentDistribution::default();
    for message in messages {
        match message.sentiment.as_deref() {
            Some("positive") => distribution.positive += 1,
            Some("negative") => distribution.negative += 1,
            Some("neutral") => distribution.neutral += 1,
            _ => {}
        }
    }

    Ok(SessionMetrics {
        message_count: messages.len(),
        duration_minutes,
        overall_sentiment: overall_sentiment(&distribution).to_string(),
        risk_level: session
            .risk_level
            .clone()
            .unwrap_or_else(|| "low".to_string()),
        sentiment_distribution: distribution,
    })
}

/// The label with the strictly greater count; ties resolve to "neutral".
pub fn overall_sentiment(distribution: &SentimentDistribution) -> &'static str {
    if distribution.positive > distribution.negative {
        "positive"
    } else if distribution.negative > distribution.positive {
        "negative"
    } else {
        "neutral"
    }
}

fn parse_local(value: &str) -> PortResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&local_offset()))
        .map_err(|e| PortError::Unexpected(format!("Malformed session timestamp '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session(started_at: &str, ended_at: Option<&str>) -> ChatSession {
        ChatSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            started_at: started_at.to_string(),
            ended_at: ended_at.map(str::to_string),
            is_active: ended_at.is_none(),
            risk_level: None,
            sentiment_score: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn message(sentiment: Option<&str>) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            content: "hello".to_string(),
            is_user: true,
            sentiment: sentiment.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn thirty_minute_session_with_positive_majority() {
        let session = session(
            "2024-01-01T10:00:00-03:00",
            Some("2024-01-01T10:30:00-03:00"),
        );
        let messages = vec![
            message(Some("positive")),
            message(Some("positive")),
            message(Some("negative")),
            message(Some("neutral")),
        ];

        let metrics = calculate_session_metrics(&session, &messages, local_now()).unwrap();
        assert_eq!(metrics.duration_minutes, 30.0);
        assert_eq!(metrics.message_count, 4);
        assert_eq!(metrics.overall_sentiment, "positive");
        assert_eq!(metrics.risk_level, "low");
        assert_eq!(
            metrics.sentiment_distribution,
            SentimentDistribution {
                positive: 2,
                negative: 1,
                neutral: 1,
            }
        );
    }

    #[test]
    fn tie_between_positive_and_negative_is_neutral() {
        let session = session(
            "2024-01-01T10:00:00-03:00",
            Some("2024-01-01T10:10:00-03:00"),
        );
        let messages = vec![message(Some("positive")), message(Some("negative"))];

        let metrics = calculate_session_metrics(&session, &messages, local_now()).unwrap();
        assert_eq!(metrics.overall_sentiment, "neutral");
    }

    #[test]
    fn negative_majority_wins_regardless_of_neutral_count() {
        let session = session(
            "2024-01-01T10:00:00-03:00",
            Some("2024-01-01T10:10:00-03:00"),
        );
        let messages = vec![
            message(Some("negative")),
            message(Some("neutral")),
            message(Some("neutral")),
            message(Some("neutral")),
        ];

        let metrics = calculate_session_metrics(&session, &messages, local_now()).unwrap();
        assert_eq!(metrics.overall_sentiment, "negative");
    }

    #[test]
    fn untagged_messages_count_toward_total_but_not_distribution() {
        let session = session(
            "2024-01-01T10:00:00-03:00",
            Some("2024-01-01T10:10:00-03:00"),
        );
        let messages = vec![message(None), message(None), message(Some("positive"))];

        let metrics = calculate_session_metrics(&session, &messages, local_now()).unwrap();
        assert_eq!(metrics.message_count, 3);
        assert_eq!(metrics.sentiment_distribution.positive, 1);
        assert_eq!(metrics.sentiment_distribution.neutral, 0);
        assert_eq!(metrics.overall_sentiment, "positive");
    }

    #[test]
    fn active_session_duration_uses_the_provided_now() {
        let session = session("2024-01-01T10:00:00-03:00", None);
        let now = DateTime::parse_from_rfc3339("2024-01-01T10:45:30-03:00").unwrap();

        let metrics = calculate_session_metrics(&session, &[], now).unwrap();
        assert_eq!(metrics.duration_minutes, 45.5);
        assert_eq!(metrics.message_count, 0);
        assert_eq!(metrics.overall_sentiment, "neutral");
    }

    #[test]
    fn inconsistent_clocks_produce_a_negative_duration() {
        let session = session(
            "2024-01-01T11:00:00-03:00",
            Some("2024-01-01T10:00:00-03:00"),
        );

        let metrics = calculate_session_metrics(&session, &[], local_now()).unwrap();
        assert_eq!(metrics.duration_minutes, -60.0);
    }

    #[test]
    fn session_risk_level_is_copied_into_the_metrics() {
        let mut session = session(
            "2024-01-01T10:00:00-03:00",
            Some("2024-01-01T10:30:00-03:00"),
        );
        session.risk_level = Some("high".to_string());

        let metrics = calculate_session_metrics(&session, &[], local_now()).unwrap();
        assert_eq!(metrics.risk_level, "high");
    }

    #[test]
    fn malformed_started_at_is_an_error() {
        let session = session("not a timestamp", None);
        assert!(calculate_session_metrics(&session, &[], local_now()).is_err());
    }

    #[test]
    fn mixed_offsets_normalize_to_the_same_instant() {
        // Same 30 minutes expressed in UTC on one side and UTC-3 on the other.
        let session = session(
            "2024-01-01T13:00:00+00:00",
            Some("2024-01-01T10:30:00-03:00"),
        );

        let metrics = calculate_session_metrics(&session, &[], local_now()).unwrap();
        assert_eq!(metrics.duration_minutes, 30.0);
    }
}
