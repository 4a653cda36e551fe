//! Application state for the verification server

use std::sync::Arc;

use crate::config::DocVerifyConfig;
use crate::error::{Error, Result};
use crate::processing::AnalysisPipeline;
use crate::providers::{DocumentLlm, GeminiClient};
use crate::storage::ValidationDb;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: DocVerifyConfig,
    /// Users, jobs, and API log
    db: Arc<ValidationDb>,
    /// Document LLM (None when no API key is configured)
    llm: Option<Arc<dyn DocumentLlm>>,
    /// Request orchestrator
    pipeline: AnalysisPipeline,
}

impl AppState {
    /// Open the database and build the Gemini client from `config`
    ///
    /// A missing API key is not fatal: the server starts and analysis
    /// requests fail with "not configured".
    pub fn new(config: DocVerifyConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let db = ValidationDb::new(&config.storage.database_path)?;

        let llm: Option<Arc<dyn DocumentLlm>> = match GeminiClient::new(&config.llm) {
            Ok(client) => {
                tracing::info!("Gemini client initialized (model: {})", config.llm.model);
                Some(Arc::new(client))
            }
            Err(Error::ProviderUnavailable(reason)) => {
                tracing::warn!("LLM provider not configured: {}", reason);
                tracing::warn!("Analysis requests will fail until the API key is set");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self::with_provider(config, db, llm))
    }

    /// Assemble state from already-built parts
    pub fn with_provider(
        config: DocVerifyConfig,
        db: ValidationDb,
        llm: Option<Arc<dyn DocumentLlm>>,
    ) -> Self {
        let db = Arc::new(db);
        let pipeline = AnalysisPipeline::new(&config, Arc::clone(&db), llm.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                llm,
                pipeline,
            }),
        }
    }

    pub fn config(&self) -> &DocVerifyConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &ValidationDb {
        &self.inner.db
    }

    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.inner.pipeline
    }

    /// Provider name and model, if configured
    pub fn provider(&self) -> Option<&Arc<dyn DocumentLlm>> {
        self.inner.llm.as_ref()
    }
}
