//! OpenAI chat client for query rewriting, grounded answers and
//! summary classification.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MlError, MlResult};

const REFINE_MODEL: &str = "gpt-3.5-turbo";
const CLASSIFY_MODEL: &str = "gpt-4o-mini";

const REFINE_SYSTEM_PROMPT: &str = "\
You are a query refinement assistant for a video memory system. \
Your job is to take a user's question or input and convert it into \
a clear, searchable query that would help find relevant video content.

Rules:
1. Keep the refined query concise but descriptive
2. Focus on key concepts, actions, or objects mentioned
3. Use natural language that would match video content descriptions
4. If the input is already a good search query, return it as-is
5. Remove unnecessary words but keep the core meaning";

const ANSWER_SYSTEM_PROMPT: &str = "\
You are an AI assistant helping a user understand their video memories. You will be given:
1. A user's question about their activities or memories
2. Context from relevant video summaries that were found based on the question

Your job is to:
- Answer the user's question using the provided video context
- Be conversational and helpful
- Reference specific details from the videos when relevant
- If the context doesn't fully answer the question, acknowledge what you can and cannot determine
- Keep responses concise but informative
- Use a natural, friendly tone as if you're helping them remember their own activities

Always base your response on the provided video context rather than making assumptions.";

/// One chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Context record fed to the grounded-answer prompt.
#[derive(Debug, Clone)]
pub struct VideoContext {
    pub timestamp: String,
    pub summary: String,
    pub confidence_score: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl OpenAiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Ok(Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .map_err(|_| MlError::config_error("OPENAI_API_KEY not set"))?,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        })
    }
}

/// OpenAI chat client.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Create a new client.
    pub fn new(config: OpenAiConfig) -> MlResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config.base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    /// One chat completion round-trip.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> MlResult<String> {
        let request = ChatRequest {
            model,
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MlError::missing_data("chat completion had no content"))
    }

    /// Rewrite a chatbot input into a concise search query. Failure falls
    /// back to the raw input at the call site, so this returns `None`
    /// instead of an error.
    pub async fn refine_query(&self, user_input: &str) -> Option<String> {
        let messages = [
            ChatMessage::system(REFINE_SYSTEM_PROMPT),
            ChatMessage::user(format!("Refine this input into a search query: {}", user_input)),
        ];

        match self.chat(REFINE_MODEL, &messages, 100, 0.3).await {
            Ok(refined) => {
                info!("Refined query: '{}' -> '{}'", user_input, refined);
                Some(refined)
            }
            Err(e) => {
                warn!("Query refinement failed: {}", e);
                None
            }
        }
    }

    /// Answer the original question from the assembled video contexts only.
    pub async fn contextual_answer(
        &self,
        user_question: &str,
        contexts: &[VideoContext],
    ) -> MlResult<String> {
        let mut context_text = String::new();
        for (i, context) in contexts.iter().enumerate() {
            context_text.push_str(&format!(
                "\nVideo {} ({}, confidence: {:.2}):\n{}\n",
                i + 1,
                context.timestamp,
                context.confidence_score,
                context.summary
            ));
        }

        let user_prompt = format!(
            "Question: {}\n\nVideo Context:\n{}\n\nPlease provide a helpful response based on this video context.",
            user_question, context_text
        );

        let messages = [
            ChatMessage::system(ANSWER_SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
        ];

        self.chat(REFINE_MODEL, &messages, 300, 0.7).await
    }

    /// Classifier call used by the automation controller. JSON-only output
    /// is requested by the prompt; parsing and fallback live with the
    /// caller.
    pub async fn classify(&self, system_prompt: &str, user_prompt: &str) -> MlResult<String> {
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt.to_string()),
        ];
        self.chat(CLASSIFY_MODEL, &messages, 500, 0.3).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig {
            api_key: "test-key".to_string(),
            base_url: base.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn chat_extracts_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  cooking dinner  "}}],
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let answer = client
            .chat("gpt-3.5-turbo", &[ChatMessage::user("hi")], 100, 0.3)
            .await
            .unwrap();
        assert_eq!(answer, "cooking dinner");
    }

    #[tokio::test]
    async fn refine_query_returns_none_on_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.refine_query("what did I do?").await.is_none());
    }

    #[tokio::test]
    async fn contextual_answer_numbers_contexts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "You were cooking."}}],
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let contexts = vec![VideoContext {
            timestamp: "2024-01-10T12:00:00Z".to_string(),
            summary: "Person stirring a pot.".to_string(),
            confidence_score: 0.87,
        }];
        let answer = client
            .contextual_answer("what was I doing?", &contexts)
            .await
            .unwrap();
        assert_eq!(answer, "You were cooking.");
    }
}
