//! LLM collaborator contract and its chat-completions implementation.

use async_trait::async_trait;
use maple_core::Credential;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// The three LLM operations the broker schedules.
///
/// Every call runs under the caller's credential. Implementations may
/// fail for any reason; the broker treats all failures alike.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn summarize(&self, text: &str, credential: &Credential) -> Result<String, BackendError>;

    async fn name_topic(
        &self,
        keywords: &[String],
        credential: &Credential,
    ) -> Result<String, BackendError>;

    async fn bullet_summarize(
        &self,
        documents: &[String],
        credential: &Credential,
    ) -> Result<Vec<String>, BackendError>;
}

const SUMMARY_PROMPT: &str =
    "Summarize the following news article in a single concise paragraph.";
const TOPIC_NAME_PROMPT: &str =
    "Give a short, human-readable name (at most five words) for a news topic described by these keywords.";
const BULLET_SUMMARY_PROMPT: &str =
    "Write three to five bullet points describing what the following news articles have in common. One bullet per line.";

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct HttpLlmBackend {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl HttpLlmBackend {
    /// * `api_url` - base URL, e.g. `https://api.openai.com/v1`.
    /// * `model`   - model name sent with every request.
    pub fn new(api_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            model,
        }
    }

    async fn complete(
        &self,
        instruction: &str,
        input: &str,
        credential: &Credential,
    ) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await?;

        let response = BackendError::ensure_success(response).await?;
        let parsed: ChatResponse = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| BackendError::EmptyResponse("completion has no content".to_string()))
    }
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn summarize(&self, text: &str, credential: &Credential) -> Result<String, BackendError> {
        self.complete(SUMMARY_PROMPT, text, credential).await
    }

    async fn name_topic(
        &self,
        keywords: &[String],
        credential: &Credential,
    ) -> Result<String, BackendError> {
        let name = self
            .complete(TOPIC_NAME_PROMPT, &keywords.join(", "), credential)
            .await?;
        Ok(name.trim_matches('"').to_string())
    }

    async fn bullet_summarize(
        &self,
        documents: &[String],
        credential: &Credential,
    ) -> Result<Vec<String>, BackendError> {
        let reply = self
            .complete(BULLET_SUMMARY_PROMPT, &documents.join("\n\n"), credential)
            .await?;
        let bullets = parse_bullets(&reply);
        if bullets.is_empty() {
            return Err(BackendError::EmptyResponse(
                "bullet summary has no bullets".to_string(),
            ));
        }
        Ok(bullets)
    }
}

/// Split a completion into bullet lines, dropping list markers and
/// blank lines.
pub fn parse_bullets(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}
