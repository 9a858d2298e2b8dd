//! OpenAI-compatible HTTP client implementing the model-facing providers.
//!
//! One `reqwest` client with a request timeout serves chat completions
//! (vision and planning) and embeddings. Images travel inline as base64
//! data URLs at low detail; candidate crops are small, so payloads stay
//! well under request limits.

use crate::action::PlannedStep;
use crate::providers::{EmbeddingModel, ProviderError, StepPlanner, VisionLanguageModel};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub vision_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            vision_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("http client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn chat(&self, content: Vec<Value>) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.config.vision_model,
            "messages": [{ "role": "user", "content": content }],
        });
        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("chat request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!(
                "chat request returned {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("chat response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("chat response had no choices".into()))
    }
}

/// Inline an image file as a data-URL content part.
fn image_part(path: &Path) -> Result<Value, ProviderError> {
    let bytes = std::fs::read(path)?;
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    };
    Ok(json!({
        "type": "image_url",
        "image_url": {
            "url": format!("data:{mime};base64,{}", STANDARD.encode(bytes)),
            "detail": "low",
        },
    }))
}

#[async_trait]
impl VisionLanguageModel for OpenAiClient {
    #[instrument(skip(self, prompt))]
    async fn complete(&self, prompt: &str, images: &[PathBuf]) -> Result<String, ProviderError> {
        let mut content = vec![json!({ "type": "text", "text": prompt })];
        for image in images {
            content.push(image_part(image)?);
        }
        let text = self.chat(content).await?;
        debug!(images = images.len(), "vision completion received");
        Ok(text)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiClient {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = json!({
            "model": self.config.embedding_model,
            "input": text,
        });
        let response = self
            .http
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("embedding request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!(
                "embedding request returned {status}: {detail}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("embedding response: {e}")))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| ProviderError::MalformedResponse("embedding response was empty".into()))
    }
}

const PLANNER_PROMPT: &str = "\
Convert the user's instruction into a JSON array of UI automation steps. \
Each step is an object {\"step\": <number>, \"action\": <text>} where the action text \
uses ONLY these Spanish forms: \
\"busca el icono de '<nombre>'\" (also: el botón de / la pestaña de / el campo de), \
\"haz clic en el elemento\", \"haz doble clic en el elemento\", \
\"escribe '<texto>'\", \"presiona '<tecla>'\", \"espera <n> segundos\". \
Reply with the JSON array only, no commentary and no code fences.";

#[async_trait]
impl StepPlanner for OpenAiClient {
    #[instrument(skip(self))]
    async fn plan(&self, instruction: &str) -> Result<Vec<PlannedStep>, ProviderError> {
        let content = vec![json!({
            "type": "text",
            "text": format!("{PLANNER_PROMPT}\n\nInstruction: {instruction}"),
        })];
        let text = self.chat(content).await?;
        let json_text = strip_code_fences(&text);
        let steps: Vec<PlannedStep> = serde_json::from_str(json_text).map_err(|e| {
            warn!(response = %text, "planner returned non-JSON output");
            ProviderError::MalformedResponse(format!("planner output: {e}"))
        })?;
        debug!(steps = steps.len(), "plan received");
        Ok(steps)
    }
}

/// Models sometimes wrap JSON output in Markdown fences despite being told
/// not to.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::strip_code_fences;

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("[1]"), "[1]");
    }
}
