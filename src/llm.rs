use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::LlmError;

const REFERER: &str = "https://hackernews-ai-analyzer.vercel.app";
const TITLE: &str = "HackerNews AI Analyzer";

/// Chat-completion backend used by the analysis service.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Text of the first completion choice for a system + user prompt pair.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &'static str;
}

/// OpenRouter's OpenAI-compatible chat completions endpoint.
pub struct OpenRouterClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterClient {
    pub fn new(http: Client, api_key: String, config: &LlmConfig) -> Self {
        Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting completion from {} ({})", url, self.model);

        let body: Resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}
