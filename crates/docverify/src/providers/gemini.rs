//! Gemini client for document analysis via the Generative Language API
//!
//! Files go through the resumable Files API upload, are polled until
//! `ACTIVE`, and are referenced by URI in a single `generateContent` call.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::{LlmConfig, API_KEY_ENV};
use crate::error::{Error, Result};
use crate::providers::llm::{DocumentLlm, FileState, RemoteFile};

/// Gemini client authenticated with an API key
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    /// Create a client; fails with `ProviderUnavailable` when no API key is configured
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::ProviderUnavailable(format!("{} is not set", API_KEY_ENV)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn upload_endpoint(&self) -> String {
        format!("{}/upload/v1beta/files", self.base_url)
    }

    fn file_endpoint(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name)
    }

    fn generate_endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_request(&self, prompt: &str, files: &[RemoteFile]) -> GenerateRequest {
        let mut parts: Vec<Part> = files
            .iter()
            .map(|f| Part {
                text: None,
                file_data: Some(FileData {
                    mime_type: f.mime_type.clone(),
                    file_uri: f.uri.clone(),
                }),
            })
            .collect();

        parts.push(Part {
            text: Some(prompt.to_string()),
            file_data: None,
        });

        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: self.top_p,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[derive(Serialize)]
struct UploadStart<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: GeminiFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    state: Option<FileState>,
}

impl GeminiFile {
    fn into_remote(self, fallback_display_name: &str) -> RemoteFile {
        RemoteFile {
            name: self.name,
            uri: self.uri,
            mime_type: self.mime_type,
            display_name: self
                .display_name
                .unwrap_or_else(|| fallback_display_name.to_string()),
            state: self.state.unwrap_or(FileState::Unspecified),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "fileData", skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::provider(format!(
        "Gemini {} failed ({}): {}",
        action, status, body
    )))
}

#[async_trait]
impl DocumentLlm for GeminiClient {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile> {
        let data = tokio::fs::read(path).await?;

        let start = self
            .client
            .post(self.upload_endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStart {
                file: UploadMetadata { display_name },
            })
            .send()
            .await
            .map_err(|e| Error::provider(format!("Gemini upload request failed: {}", e)))?;
        let start = ensure_success(start, "upload start").await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::provider("Gemini upload start returned no upload URL"))?;

        let response = self
            .client
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(data)
            .send()
            .await
            .map_err(|e| Error::provider(format!("Gemini upload failed: {}", e)))?;
        let response = ensure_success(response, "upload").await?;

        let envelope: FileEnvelope = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("Failed to parse Gemini upload response: {}", e)))?;

        let file = envelope.file.into_remote(display_name);
        tracing::info!(file = %file.display_name, name = %file.name, state = ?file.state, "Uploaded file to Gemini");
        Ok(file)
    }

    async fn get_file(&self, file: &RemoteFile) -> Result<RemoteFile> {
        let response = self
            .client
            .get(self.file_endpoint(&file.name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::provider(format!("Gemini file lookup failed: {}", e)))?;
        let response = ensure_success(response, "file lookup").await?;

        let current: GeminiFile = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("Failed to parse Gemini file: {}", e)))?;

        Ok(current.into_remote(&file.display_name))
    }

    async fn delete_file(&self, file: &RemoteFile) -> Result<()> {
        let response = self
            .client
            .delete(self.file_endpoint(&file.name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::provider(format!("Gemini file delete failed: {}", e)))?;
        ensure_success(response, "file delete").await?;
        Ok(())
    }

    async fn generate(&self, prompt: &str, files: &[RemoteFile]) -> Result<String> {
        let request = self.build_request(prompt, files);

        let response = self
            .client
            .post(self.generate_endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::provider(format!("Gemini request failed: {}", e)))?;
        let response = ensure_success(response, "generation").await?;

        let gen_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("Failed to parse Gemini response: {}", e)))?;

        gen_response
            .into_text()
            .ok_or_else(|| Error::provider("No text in Gemini response"))
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> LlmConfig {
        LlmConfig {
            api_key: Some("test-key".to_string()),
            base_url: "https://gemini.example.test/".to_string(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let result = GeminiClient::new(&LlmConfig::default());
        assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
    }

    #[test]
    fn test_endpoints() {
        let client = GeminiClient::new(&configured()).unwrap();
        assert_eq!(
            client.upload_endpoint(),
            "https://gemini.example.test/upload/v1beta/files"
        );
        assert_eq!(
            client.file_endpoint("files/abc"),
            "https://gemini.example.test/v1beta/files/abc"
        );
        assert_eq!(
            client.generate_endpoint(),
            "https://gemini.example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let client = GeminiClient::new(&configured()).unwrap();
        let files = vec![RemoteFile {
            name: "files/abc".to_string(),
            uri: "https://gemini.example.test/v1beta/files/abc".to_string(),
            mime_type: "application/pdf".to_string(),
            display_name: "deed.pdf".to_string(),
            state: FileState::Active,
        }];

        let value = serde_json::to_value(client.build_request("analyze", &files)).unwrap();
        let parts = &value["contents"][0]["parts"];

        assert_eq!(parts[0]["fileData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["fileData"]["fileUri"], files[0].uri);
        assert!(parts[0].get("text").is_none());
        assert_eq!(parts[1]["text"], "analyze");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_file_state_parsing() {
        let file: GeminiFile = serde_json::from_str(
            r#"{"name": "files/x", "uri": "u", "mimeType": "image/png", "state": "PROCESSING"}"#,
        )
        .unwrap();
        let remote = file.into_remote("scan.png");
        assert_eq!(remote.state, FileState::Processing);
        assert_eq!(remote.display_name, "scan.png");

        let file: GeminiFile =
            serde_json::from_str(r#"{"name": "files/y", "state": "STATE_UNSPECIFIED"}"#).unwrap();
        assert_eq!(file.into_remote("y").state, FileState::Unspecified);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("{\"a\": 1}"));

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(blocked.into_text().is_none());
    }
}
