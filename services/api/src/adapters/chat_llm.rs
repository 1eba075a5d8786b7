//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the conversational LLM.
//! It implements the `ChatCompletionService` port from the `core` crate.

const SYSTEM_PROMPT: &str = r#"You are a supportive and empathetic AI assistant focused on mental health and emotional well-being.
Your role is to:
1. Listen actively and show understanding
2. Help users explore their thoughts and feelings
3. Provide gentle guidance without giving direct advice
4. Maintain a professional and caring tone
5. Encourage self-reflection and personal growth

Remember to:
- Be patient and non-judgmental
- Validate the user's feelings
- Ask open-ended questions to encourage deeper exploration
- Avoid making diagnoses or giving medical advice
- Suggest seeking professional help when appropriate
- Always make clear you are an AI and not a substitute for a mental health professional"#;

const SENTIMENT_SYSTEM_PROMPT: &str =
    "You are a sentiment analyzer. Respond with JSON only, no prose and no markdown.";

const SENTIMENT_PROMPT_TEMPLATE: &str = r#"Analyze the sentiment of the following text and return a JSON object with:
- sentiment: "positive", "negative" or "neutral"
- confidence: a number between 0 and 1
- keywords: a list of relevant keywords
- risk_level: "low", "medium" or "high"

Text: {text}"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use lumen_core::{
    domain::{ChatMessage, SentimentAnalysis},
    ports::{ChatCompletionService, PortError, PortResult},
};
use serde::Deserialize;

use crate::adapters::summary_llm::strip_code_fence;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    chat_model: String,
    sentiment_model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, chat_model: String, sentiment_model: String) -> Self {
        Self {
            client,
            chat_model,
            sentiment_model,
        }
    }

    fn first_choice_content(response: CreateChatCompletionResponse) -> PortResult<String> {
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Upstream(
                    "Chat LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Upstream(
                "Chat LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}

/// The JSON shape the sentiment prompt asks the model for.
#[derive(Deserialize)]
struct RawSentiment {
    sentiment: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_risk_level")]
    risk_level: String,
}

fn default_risk_level() -> String {
    "low".to_string()
}

//=========================================================================================
// `ChatCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatCompletionService for OpenAiChatAdapter {
    /// Generates the assistant's reply given the most recent session messages.
    async fn generate_reply(&self, message: &str, context: &[ChatMessage]) -> PortResult<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()];

        // Context arrives newest-first; replay it in chronological order.
        for msg in context.iter().rev() {
            let request_message: ChatCompletionRequestMessage = if msg.is_user {
                ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into()
            } else {
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into()
            };
            messages.push(request_message);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages(messages)
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

        Self::first_choice_content(response)
    }

    /// Tags a message with a sentiment label by asking the model for JSON.
    async fn analyze_sentiment(&self, text: &str) -> PortResult<SentimentAnalysis> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SENTIMENT_SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(SENTIMENT_PROMPT_TEMPLATE.replace("{text}", text))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.sentiment_model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        let content = Self::first_choice_content(response)?;
        let raw: RawSentiment = serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| PortError::Upstream(format!("Malformed sentiment payload: {e}")))?;

        Ok(SentimentAnalysis {
            sentiment: raw.sentiment,
            confidence: raw.confidence,
            keywords: raw.keywords,
            risk_level: raw.risk_level,
        })
    }
}
