//! services/api/src/adapters/summary_llm.rs
//!
//! This module contains the adapter for the session-summary LLM.
//! It implements the `SummaryGenerationService` port from the `core` crate.
//! The model is asked for a strict JSON object; everything it actually sends
//! back is funneled through the lenient parsing below.

const SUMMARY_SYSTEM_PROMPT: &str = "You are a therapeutic assistant specialized in writing \
session recaps. Respond with a single JSON object and nothing else.";

const SUMMARY_PROMPT_TEMPLATE: &str = r#"Analyze the following conversation and produce a detailed session recap.

Conversation:
{transcript}

Session metrics:
- Duration: {duration} minutes
- Total messages: {message_count}
- Overall sentiment: {overall_sentiment}
- Risk level: {risk_level}

Return a JSON object with exactly these keys:
- "summary_text": a string summarizing the session
- "key_topics": a list of the main topics discussed
- "suggestions": a list of suggestions for the next sessions
- "progress_observations": a list of relevant observations about the user's progress"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use lumen_core::{
    domain::{ChatMessage, SessionMetrics, SummaryContent},
    ports::{PortError, PortResult, SummaryGenerationService},
};
use serde_json::Value;
use tracing::error;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `SummaryGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiSummaryAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSummaryAdapter {
    /// Creates a new `OpenAiSummaryAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// Pure prompt/response helpers
//=========================================================================================

/// Renders the session transcript as role-prefixed lines.
fn build_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|msg| {
            let role = if msg.is_user { "User" } else { "Assistant" };
            format!("{}: {}", role, msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(messages: &[ChatMessage], metrics: &SessionMetrics) -> String {
    SUMMARY_PROMPT_TEMPLATE
        .replace("{transcript}", &build_transcript(messages))
        .replace("{duration}", &format!("{:.1}", metrics.duration_minutes))
        .replace("{message_count}", &metrics.message_count.to_string())
        .replace("{overall_sentiment}", &metrics.overall_sentiment)
        .replace("{risk_level}", &metrics.risk_level)
}

/// Strips a surrounding markdown code fence (with an optional language tag)
/// from a model response, returning the inner text.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // The opening fence may carry a language tag on its own line.
    let rest = match rest.split_once('\n') {
        Some((first_line, body)) if !first_line.trim_start().starts_with(['{', '[']) => body,
        _ => rest,
    };
    rest.trim()
}

/// Turns whatever the model produced into a `SummaryContent`.
///
/// A response that is not JSON at all becomes a fallback summary carrying the
/// raw text; within parsed JSON, missing fields coerce to empty lists and
/// scalar values are wrapped into single-element lists.
fn parse_summary_payload(raw: &str) -> SummaryContent {
    let value: Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(value) => value,
        Err(e) => {
            error!("Summary response was not valid JSON, falling back to raw text: {e}");
            return SummaryContent {
                summary_text: raw.trim().to_string(),
                ..SummaryContent::default()
            };
        }
    };

    SummaryContent {
        summary_text: match value.get("summary_text") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
        key_topics: coerce_string_list(value.get("key_topics")),
        suggestions: coerce_string_list(value.get("suggestions")),
        progress_observations: coerce_string_list(value.get("progress_observations")),
    }
}

fn coerce_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(value_as_string).collect(),
        Some(scalar) => vec![value_as_string(scalar)],
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//=========================================================================================
// `SummaryGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SummaryGenerationService for OpenAiSummaryAdapter {
    /// Generates the structured recap for a session transcript. Unlike the
    /// chat reply path, upstream failures here propagate to the caller.
    async fn generate_summary(
        &self,
        messages: &[ChatMessage],
        metrics: &SessionMetrics,
    ) -> PortResult<SummaryContent> {
        let prompt = build_prompt(messages, metrics);

        let request_messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SUMMARY_SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(request_messages)
            .temperature(0.7)
            .max_tokens(500u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        let content = if let Some(choice) = response.choices.into_iter().next() {
            choice.message.content.ok_or_else(|| {
                PortError::Upstream("Summary LLM response contained no text content.".to_string())
            })?
        } else {
            return Err(PortError::Upstream(
                "Summary LLM returned no choices in its response.".to_string(),
            ));
        };

        Ok(parse_summary_payload(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lumen_core::domain::SentimentDistribution;
    use uuid::Uuid;

    fn message(is_user: bool, content: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            content: content.to_string(),
            is_user,
            sentiment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn metrics() -> SessionMetrics {
        SessionMetrics {
            message_count: 4,
            duration_minutes: 30.0,
            overall_sentiment: "positive".to_string(),
            risk_level: "low".to_string(),
            sentiment_distribution: SentimentDistribution::default(),
        }
    }

    #[test]
    fn transcript_uses_role_prefixed_lines() {
        let messages = vec![
            message(true, "I had a rough week"),
            message(false, "Tell me more about it"),
        ];
        assert_eq!(
            build_transcript(&messages),
            "User: I had a rough week\nAssistant: Tell me more about it"
        );
    }

    #[test]
    fn prompt_embeds_metrics_and_required_keys() {
        let prompt = build_prompt(&[message(true, "hi")], &metrics());
        assert!(prompt.contains("User: hi"));
        assert!(prompt.contains("Duration: 30.0 minutes"));
        assert!(prompt.contains("Total messages: 4"));
        assert!(prompt.contains("\"summary_text\""));
        assert!(prompt.contains("\"key_topics\""));
        assert!(prompt.contains("\"suggestions\""));
        assert!(prompt.contains("\"progress_observations\""));
    }

    #[test]
    fn strips_fence_with_language_tag() {
        let raw = "```json\n{\"summary_text\": \"ok\"}\n```";
        assert_eq!(strip_code_fence(raw), "{\"summary_text\": \"ok\"}");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(raw), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fence("  plain text  "), "plain text");
    }

    #[test]
    fn parses_a_complete_payload() {
        let raw = r#"{
            "summary_text": "A productive session.",
            "key_topics": ["work stress", "sleep"],
            "suggestions": ["breathing exercises"],
            "progress_observations": ["more open than last time"]
        }"#;
        let content = parse_summary_payload(raw);
        assert_eq!(content.summary_text, "A productive session.");
        assert_eq!(content.key_topics, vec!["work stress", "sleep"]);
        assert_eq!(content.suggestions, vec!["breathing exercises"]);
        assert_eq!(
            content.progress_observations,
            vec!["more open than last time"]
        );
    }

    #[test]
    fn fenced_payload_still_parses() {
        let raw = "```json\n{\"summary_text\": \"ok\", \"key_topics\": [\"t\"]}\n```";
        let content = parse_summary_payload(raw);
        assert_eq!(content.summary_text, "ok");
        assert_eq!(content.key_topics, vec!["t"]);
    }

    #[test]
    fn missing_fields_coerce_to_empty_lists() {
        let content = parse_summary_payload(r#"{"summary_text": "just a summary"}"#);
        assert_eq!(content.summary_text, "just a summary");
        assert!(content.key_topics.is_empty());
        assert!(content.suggestions.is_empty());
        assert!(content.progress_observations.is_empty());
    }

    #[test]
    fn scalar_list_fields_are_wrapped() {
        let raw = r#"{"summary_text": "s", "key_topics": "anxiety", "suggestions": 3}"#;
        let content = parse_summary_payload(raw);
        assert_eq!(content.key_topics, vec!["anxiety"]);
        assert_eq!(content.suggestions, vec!["3"]);
    }

    #[test]
    fn non_json_response_falls_back_to_raw_text() {
        let content = parse_summary_payload("The session went well overall.");
        assert_eq!(content.summary_text, "The session went well overall.");
        assert!(!content.summary_text.is_empty());
        assert!(content.key_topics.is_empty());
        assert!(content.suggestions.is_empty());
        assert!(content.progress_observations.is_empty());
    }

    #[test]
    fn null_list_fields_coerce_to_empty_lists() {
        let raw = r#"{"summary_text": "s", "key_topics": null, "suggestions": null}"#;
        let content = parse_summary_payload(raw);
        assert!(content.key_topics.is_empty());
        assert!(content.suggestions.is_empty());
    }
}
