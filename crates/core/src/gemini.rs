//! Gemini REST client.
//!
//! Implements both [`GenerationBackend`] and [`CapabilitySource`] against the
//! Google Generative Language API, classifying HTTP failures into the
//! orchestrator's error taxonomy.

use crate::backend::{BackendError, GenerationBackend};
use crate::conversation::{Role, Turn};
use crate::roster::{CapabilitySource, ModelCapability};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// The key travels in this header, never in the URL, so it cannot leak into error text.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A client for the Gemini `models` and `generateContent` endpoints.
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GeminiClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL of the API, e.g. [`DEFAULT_API_BASE`].
    /// * `api_key` - The API key sent with every request.
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

// --- Wire types ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize, Debug)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

fn backend_role(role: Role) -> &'static str {
    match role {
        Role::Teacher => "user",
        Role::Pupil => "model",
    }
}

fn build_request<'a>(
    system_instruction: &'a str,
    history: &'a [Turn],
    prompt: &'a str,
) -> GenerateContentRequest<'a> {
    let mut contents: Vec<Content<'a>> = history
        .iter()
        .map(|turn| Content {
            role: Some(backend_role(turn.role())),
            parts: vec![Part {
                text: turn.content(),
            }],
        })
        .collect();
    contents.push(Content {
        role: Some("user"),
        parts: vec![Part { text: prompt }],
    });

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: system_instruction,
            }],
        },
        contents,
    }
}

/// Maps a failed HTTP response onto the backend error taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let detail = format!("{}: {}", status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        BackendError::QuotaExceeded(detail)
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
        BackendError::ModelUnavailable(detail)
    } else {
        BackendError::Transient(detail)
    }
}

fn to_capability(info: ModelInfo) -> ModelCapability {
    let supports_generation = info
        .supported_generation_methods
        .iter()
        .any(|method| method == "generateContent");
    let identifier = match info.name.strip_prefix("models/") {
        Some(id) => id.to_string(),
        None => info.name,
    };
    ModelCapability {
        identifier,
        supports_generation,
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    BackendError::Transient(e.without_url().to_string())
}

fn extract_text(response: GenerateContentResponse) -> Result<String, BackendError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(BackendError::Transient(
            "Response had no text content".to_string(),
        ))
    } else {
        Ok(text)
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn invoke(
        &self,
        model: &str,
        system_instruction: &str,
        history: &[Turn],
        prompt: &str,
    ) -> Result<String, BackendError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, model);
        let request = build_request(system_instruction, history, prompt);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("(response body unreadable: {})", e.without_url()),
            };
            return Err(classify_status(status, &body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            BackendError::Transient(format!("Invalid response body: {}", e.without_url()))
        })?;
        debug!(%model, "Generation response received");
        extract_text(parsed)
    }
}

#[async_trait]
impl CapabilitySource for GeminiClient {
    async fn list_models(&self) -> anyhow::Result<Vec<ModelCapability>> {
        let url = format!("{}/models", self.api_base);
        let response: ListModelsResponse = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("pageSize", "1000")])
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to reach model listing endpoint")?
            .error_for_status()
            .map_err(reqwest::Error::without_url)
            .context("Model listing was rejected")?
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to decode model listing")?;

        Ok(response.models.into_iter().map(to_capability).collect())
    }
}
