//! English to SQL through an OpenAI-compatible chat completion API.
//!
//! The completion text is returned as-is. Nothing checks that it is valid SQL, or that
//! it isn't destructive: the caller decides whether to run it.

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::schema::Completion;

pub const SYSTEM_PROMPT: &str = "You are a SQL expert. Convert natural language questions into PostgreSQL queries.
Only respond with the SQL query, no explanations.
Use proper SQL syntax and formatting.";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Language model API key is not configured")]
    MissingApiKey,

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Error calling the language model API: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to generate SQL query")]
    EmptyCompletion,
}

/// The instruction sent ahead of every question
pub fn system_prompt(tables: &[String]) -> String {
    if tables.is_empty() {
        SYSTEM_PROMPT.to_string()
    } else {
        format!("{SYSTEM_PROMPT}\nTables available: {}", tables.join(", "))
    }
}

#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Return the first completion for `question` under the `system` instruction
    async fn translate(&self, system: &str, question: &str) -> Result<String, Error>;
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
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug)]
pub struct OpenAiTranslator {
    client: Client,
    config: Completion,
}

impl OpenAiTranslator {
    pub fn new(config: Completion) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

// Pull `error.message` out of an OpenAI-style error body
fn upstream_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        })
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, system: &str, question: &str) -> Result<String, Error> {
        let api_key = self.config.api_key.as_ref().ok_or(Error::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status,
                message: upstream_message(status, &body),
            });
        }

        let completion: ChatResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|content| !content.is_empty())
            .ok_or(Error::EmptyCompletion)
    }
}
