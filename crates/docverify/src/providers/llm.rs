//! Provider trait for document-aware LLMs and the readiness wait built on it

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Processing state of an uploaded file on the provider side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    #[serde(alias = "STATE_UNSPECIFIED")]
    Unspecified,
    Processing,
    Active,
    Failed,
}

/// Opaque handle to a file accepted by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Provider resource name (e.g. `files/abc123`)
    pub name: String,
    /// URI used to reference the file in a generation call
    pub uri: String,
    pub mime_type: String,
    pub display_name: String,
    pub state: FileState,
}

/// Trait for LLM providers that accept uploaded documents
///
/// Implementations:
/// - `GeminiClient`: Google Gemini Files API + generateContent
#[async_trait]
pub trait DocumentLlm: Send + Sync {
    /// Push a local file to the provider
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile>;

    /// Re-read the file's current state
    async fn get_file(&self, file: &RemoteFile) -> Result<RemoteFile>;

    /// Remove the file from provider storage
    async fn delete_file(&self, file: &RemoteFile) -> Result<()>;

    /// One generation call over the prompt and all files, returning the raw text
    async fn generate(&self, prompt: &str, files: &[RemoteFile]) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}

/// How long and how often to poll an uploaded file
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&LlmConfig> for PollPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            timeout: config.ready_timeout(),
        }
    }
}

/// Poll `file` until it leaves the processing state
///
/// Fails with `ProviderProcessingFailed` when the provider reports `FAILED`,
/// when `policy.timeout` elapses, or when `cancel` fires.
pub async fn await_ready(
    llm: &dyn DocumentLlm,
    file: RemoteFile,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<RemoteFile> {
    let display_name = file.display_name.clone();

    tokio::select! {
        _ = cancel.cancelled() => {
            Err(Error::processing_failed(display_name, "request cancelled while waiting for file"))
        }
        polled = tokio::time::timeout(policy.timeout, poll_until_ready(llm, file, policy.interval)) => {
            match polled {
                Ok(result) => result,
                Err(_) => Err(Error::processing_failed(
                    display_name,
                    format!("timed out after {}s waiting for file to become ready", policy.timeout.as_secs()),
                )),
            }
        }
    }
}

async fn poll_until_ready(
    llm: &dyn DocumentLlm,
    mut file: RemoteFile,
    interval: Duration,
) -> Result<RemoteFile> {
    loop {
        match file.state {
            FileState::Processing => {
                tracing::debug!(file = %file.display_name, "file still processing");
                tokio::time::sleep(interval).await;
                file = llm.get_file(&file).await?;
            }
            FileState::Failed => {
                return Err(Error::processing_failed(
                    &file.display_name,
                    "provider reported FAILED state",
                ));
            }
            FileState::Active | FileState::Unspecified => return Ok(file),
        }
    }
}
