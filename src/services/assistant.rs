//! Equipment Q&A over an external chat-completion API.
//!
//! Failures become informational answers, never errors.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{config::AssistantConfig, services::manuals::ManualLibrary};

pub const MISSING_INPUT: &str = "Query or instrument missing.";
pub const NOT_CONFIGURED: &str = "The AI assistant is not configured.";
pub const UNAVAILABLE: &str = "The AI assistant is currently unavailable.";

/// Manuals are cut to this many characters before being sent.
const MAX_MANUAL_CHARS: usize = 24_000;

const SYSTEM_PROMPT: &str = "You are a support assistant for biomedical equipment service \
engineers. Answer the question using only the equipment manual provided. If the manual does \
not cover the question, say so.";

pub fn manual_not_found(instrument: &str) -> String {
    format!("Manual not found for {}.", instrument)
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Zeroizing<String>,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(api_url: String, api_key: Zeroizing<String>, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.as_str())
            .json(&request)
            .send()
            .await
            .context("Failed to reach chat-completion API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat-completion API error: {} - {}", status, body);
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat-completion response")?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .context("Chat-completion response had no content")
    }
}

/// Answers questions about an instrument from its manual.
#[derive(Clone)]
pub struct Assistant {
    chat: Option<Arc<dyn ChatClient>>,
}

impl Assistant {
    pub fn new(chat: Option<Arc<dyn ChatClient>>) -> Self {
        Self { chat }
    }

    /// Builds the HTTP client when an API key is configured.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let chat = match &config.api_key {
            Some(api_key) => {
                let client = OpenAiChatClient::new(
                    config.api_url.clone(),
                    api_key.clone(),
                    config.model.clone(),
                )?;
                Some(Arc::new(client) as Arc<dyn ChatClient>)
            }
            None => {
                tracing::warn!("⚠️ AI_API_KEY not set, assistant answers will be informational only");
                None
            }
        };
        Ok(Self { chat })
    }

    /// Always produces text for the caller.
    pub async fn ask(&self, manuals: &ManualLibrary, query: &str, instrument: &str) -> String {
        let query = query.trim();
        let instrument = instrument.trim();
        if query.is_empty() || instrument.is_empty() {
            return MISSING_INPUT.to_string();
        }

        let manual = match manuals.load(instrument).await {
            Ok(Some(manual)) => manual,
            Ok(None) | Err(crate::error::AppError::Validation(_)) => {
                return manual_not_found(instrument);
            }
            Err(e) => {
                tracing::error!("❌ Failed to read manual for {}: {}", instrument, e);
                return UNAVAILABLE.to_string();
            }
        };

        let Some(chat) = &self.chat else {
            return NOT_CONFIGURED.to_string();
        };

        let manual: String = manual.chars().take(MAX_MANUAL_CHARS).collect();
        let prompt = format!(
            "Instrument: {}\n\nManual:\n{}\n\nQuestion: {}",
            instrument, manual, query
        );

        match chat.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("⚠️ Assistant call failed for {}: {:#}", instrument, e);
                UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct Recording {
        prompts: Mutex<Vec<String>>,
        answer: Option<String>,
    }

    #[async_trait]
    impl ChatClient for Recording {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().context("backend down")
        }
    }

    async fn library_with_humacount() -> ManualLibrary {
        let manuals = ManualLibrary::new(
            std::env::temp_dir().join(format!("biomedlink-assistant-{}", Uuid::new_v4())),
        );
        manuals.store("HumaCount", b"Run the cleaning cycle daily.").await.unwrap();
        manuals
    }

    #[tokio::test]
    async fn forwards_query_with_manual_text() {
        let manuals = library_with_humacount().await;
        let chat = Arc::new(Recording {
            prompts: Mutex::new(Vec::new()),
            answer: Some("Daily.".to_string()),
        });
        let assistant = Assistant::new(Some(chat.clone()));

        let answer = assistant.ask(&manuals, "How often to clean?", "HumaCount").await;
        assert_eq!(answer, "Daily.");

        let prompts = chat.prompts.lock().unwrap();
        assert!(prompts[0].contains("Run the cleaning cycle daily."));
        assert!(prompts[0].contains("How often to clean?"));
    }

    #[tokio::test]
    async fn degrades_instead_of_failing() {
        let manuals = library_with_humacount().await;

        let unconfigured = Assistant::new(None);
        assert_eq!(unconfigured.ask(&manuals, "q", "HumaCount").await, NOT_CONFIGURED);
        assert_eq!(unconfigured.ask(&manuals, "", "HumaCount").await, MISSING_INPUT);
        assert_eq!(
            unconfigured.ask(&manuals, "q", "Centrifuge").await,
            "Manual not found for Centrifuge."
        );
        assert_eq!(
            unconfigured.ask(&manuals, "q", "../secrets").await,
            "Manual not found for ../secrets."
        );

        let failing = Assistant::new(Some(Arc::new(Recording {
            prompts: Mutex::new(Vec::new()),
            answer: None,
        })));
        assert_eq!(failing.ask(&manuals, "q", "HumaCount").await, UNAVAILABLE);
    }
}
