use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

use crate::backend::CompanionBackend;
use crate::error::BackendError;
use crate::logging;
use crate::models::{CreateResult, Message, Role};
use crate::persona;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT_SECS: u64 = 60; // 60 second timeout for API requests

#[derive(Debug, Serialize, Clone)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Clone)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part { text: text.to_string() }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    api_key: RwLock<Option<String>>,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: RwLock::new(api_key),
            model: model.into(),
        }
    }

    pub fn set_api_key(&self, api_key: Option<String>) {
        *self.api_key.write().unwrap_or_else(|p| p.into_inner()) = api_key;
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.read().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    fn key(&self) -> Result<String, BackendError> {
        self.api_key
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(BackendError::MissingApiKey)
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, BackendError> {
        let api_key = self.key()?;
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();

            // Try to parse structured error
            let message = match serde_json::from_str::<GeminiError>(&error_text) {
                Ok(parsed) => match parsed.error.status {
                    Some(kind) => format!("{}: {}", kind, parsed.error.message),
                    None => parsed.error.message,
                },
                Err(_) => error_text,
            };
            return Err(BackendError::Api { status, message });
        }

        let completion: GenerateContentResponse = response.json().await?;
        extract_text(completion)
    }
}

/// Map session history onto Gemini turns (assistant -> "model")
fn history_contents(history: &[Message], new_text: &str) -> Vec<Content> {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            Content::text(Some(role), &m.text)
        })
        .collect();
    contents.push(Content::text(Some("user"), new_text));
    contents
}

fn extract_text(response: GenerateContentResponse) -> Result<String, BackendError> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .filter(|text| !text.trim().is_empty())
        .ok_or(BackendError::EmptyResponse)
}

/// Parse an artifact, tolerating a ```json fenced block around the object
pub fn parse_artifact(raw: &str) -> Result<CreateResult, BackendError> {
    let trimmed = raw.trim();
    let body = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    };

    serde_json::from_str(body).map_err(|e| BackendError::InvalidArtifact(e.to_string()))
}

#[async_trait]
impl CompanionBackend for GeminiClient {
    async fn send_reply(&self, history: &[Message], new_text: &str) -> Result<String, BackendError> {
        let request = GenerateContentRequest {
            contents: history_contents(history, new_text),
            system_instruction: Some(Content::text(None, persona::COMPANION_INSTRUCTION)),
            generation_config: GenerationConfig {
                temperature: 0.9,
                response_mime_type: None,
            },
        };

        logging::log_backend(None, &format!(
            "Reply request: {} prior messages, model {}", history.len(), self.model
        ));
        self.generate(&request).await
    }

    async fn generate_artifact(&self, prompt: &str) -> Result<CreateResult, BackendError> {
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            system_instruction: Some(Content::text(None, persona::ARTIFACT_INSTRUCTION)),
            generation_config: GenerationConfig {
                temperature: 1.0,
                response_mime_type: Some("application/json".to_string()),
            },
        };

        logging::log_backend(None, &format!("Artifact request, model {}", self.model));
        let raw = self.generate(&request).await?;
        parse_artifact(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_maps_assistant_to_model() {
        let history = vec![Message::assistant("oi"), Message::user("tudo bem?")];
        let contents = history_contents(&history, "e voce?");

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role.as_deref(), Some("model"));
        assert_eq!(contents[1].role.as_deref(), Some("user"));
        assert_eq!(contents[2].parts[0].text, "e voce?");
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), "hi")],
            system_instruction: Some(Content::text(None, "sys")),
            generation_config: GenerationConfig {
                temperature: 1.0,
                response_mime_type: Some("application/json".to_string()),
            },
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Sinal "},{"text":"recebido."}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(response).unwrap(), "Sinal recebido.");
    }

    #[test]
    fn test_extract_text_rejects_empty_candidates() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(extract_text(response), Err(BackendError::EmptyResponse)));
    }

    #[test]
    fn test_parse_fenced_artifact() {
        let raw = "```json\n{\"lyrics\":\"l\",\"sunoPrompt\":\"p\",\"emotionalContext\":\"c\",\"metadata\":{\"signalStrength\":\"80%\",\"emotion\":\"calma\",\"energy\":\"low\"}}\n```";
        let result = parse_artifact(raw).unwrap();
        assert_eq!(result.metadata.emotion, "calma");
    }

    #[test]
    fn test_parse_artifact_rejects_prose() {
        assert!(matches!(parse_artifact("sem json aqui"), Err(BackendError::InvalidArtifact(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = GeminiClient::new(None, "gemini-2.5-flash");
        let result = client.send_reply(&[], "oi").await;
        assert!(matches!(result, Err(BackendError::MissingApiKey)));
    }
}
