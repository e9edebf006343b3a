//! Language-model provider
//!
//! One trait, one real implementation: any OpenAI-compatible chat
//! completions endpoint (OpenAI, Groq, Ollama behind /v1, llama.cpp). The
//! provider returns raw text; parsing and validation happen in the caller.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{GenerationError, Result};

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one prompt, get the model's text reply.
    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

pub struct OpenAiCompatibleModel {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleModel {
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) if !key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", key))
            }
            _ => req,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": 0.7,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let url = format!("{}/chat/completions", self.endpoint);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        let resp = self
            .apply_auth(req)
            .send()
            .await
            .map_err(|e| GenerationError::Provider(format!("Connection failed ({}): {}", url, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(
                GenerationError::Provider(format!("API error {}: {}", status, text)).into(),
            );
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))?;

        let content = json["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .ok_or_else(|| GenerationError::Provider("No choices in response".to_string()))?;

        Ok(content.to_string())
    }
}

/// Scripted model for tests: returns queued responses in order, counting
/// calls. Exhausting the queue is a provider error.
pub struct CannedModel {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl CannedModel {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: std::sync::Mutex::new(
                responses.into_iter().map(String::from).collect(),
            ),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for CannedModel {
    async fn generate_text(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GenerationError::Provider("No canned response left".to_string()).into())
    }
}
