//! Step enhancement through an OpenAI-compatible `/v1/chat/completions` endpoint.
//!
//! The model is asked to answer with one step per line in the
//! `"{n}. {action}|{expected}"` format, which is parsed with the same codec
//! used for human input.

use super::traits::TextEnhancer;
use crate::steps::{encode_lines, to_lines, Step};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You improve manual test cases. Rewrite the given steps so each \
action is concrete and each expected result is verifiable against the requirements. \
Answer only with the steps, one per line, formatted as `N. action|expected result`.";

#[derive(Clone)]
pub struct ChatCompletionEnhancer {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatCompletionEnhancer {
    pub fn new(url: String, model: String, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create enhancer HTTP client")?;

        Ok(Self {
            client,
            url,
            model,
            api_key,
        })
    }

    /// Build from `ENHANCER_URL`, `ENHANCER_MODEL` (default `gpt-4o-mini`)
    /// and `ENHANCER_API_KEY`.
    ///
    /// Returns `None` when `ENHANCER_URL` is unset, empty or "disabled".
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("ENHANCER_URL").ok()?;
        if url.is_empty() || url.eq_ignore_ascii_case("disabled") {
            return None;
        }
        let model = std::env::var("ENHANCER_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let api_key = std::env::var("ENHANCER_API_KEY").ok().filter(|k| !k.is_empty());

        match Self::new(url, model, api_key) {
            Ok(enhancer) => Some(enhancer),
            Err(e) => {
                tracing::warn!("Text enhancer disabled: {:#}", e);
                None
            }
        }
    }

    fn user_prompt(requirements: &str, title: &str, steps: &[Step]) -> String {
        let requirements = if requirements.trim().is_empty() {
            "(none provided)"
        } else {
            requirements.trim()
        };
        format!(
            "Requirements:\n{}\n\nTest case: {}\n\nCurrent steps:\n{}",
            requirements,
            title,
            to_lines(steps).join("\n")
        )
    }
}

#[async_trait]
impl TextEnhancer for ChatCompletionEnhancer {
    async fn enhance_steps(&self, requirements: &str, title: &str, steps: &[Step]) -> Result<Vec<Step>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: Self::user_prompt(requirements, title, steps),
                },
            ],
            temperature: 0.2,
        };

        let mut req = self.client.post(&self.url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req
            .send()
            .await
            .with_context(|| format!("Failed to connect to enhancer at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Enhancer returned {}: {}", status.as_u16(), body);
        }

        let response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse enhancer response")?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("Enhancer returned no choices")?;

        let lines: Vec<&str> = content
            .lines()
            .map(|l| l.trim().trim_start_matches(&['-', '*'][..]).trim())
            .filter(|l| !l.starts_with("```"))
            .collect();
        let enhanced = encode_lines(&lines);
        if enhanced.is_empty() {
            bail!("Enhancer returned no steps");
        }
        Ok(enhanced)
    }
}
