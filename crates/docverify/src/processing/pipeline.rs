//! Analysis pipeline
//!
//! One linear pass per request:
//! validate input, resolve the user, create the job, stage uploads, upload them
//! to the provider, wait until they are ready, generate, parse, persist.
//!
//! Bookkeeping writes (user, job creation, job transitions) are best effort:
//! their failures are logged and the analysis carries on. Staged files and
//! remote files are released on every exit path.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{AnalysisConfig, DocVerifyConfig, API_KEY_ENV};
use crate::error::{Error, Result};
use crate::processing::prompt::PromptBuilder;
use crate::processing::remote::RemoteFiles;
use crate::processing::staging::{DocumentUpload, StagingArea};
use crate::providers::{await_ready, DocumentLlm, PollPolicy, RemoteFile};
use crate::schema::parse_report;
use crate::storage::ValidationDb;
use crate::types::VerificationReport;

/// Input for one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub user_id: String,
    pub email: Option<String>,
    pub uploads: Vec<DocumentUpload>,
}

/// Drives one request from uploads to a persisted report
pub struct AnalysisPipeline {
    db: Arc<ValidationDb>,
    llm: Option<Arc<dyn DocumentLlm>>,
    limits: AnalysisConfig,
    poll: PollPolicy,
    staging_dir: PathBuf,
}

impl AnalysisPipeline {
    pub fn new(
        config: &DocVerifyConfig,
        db: Arc<ValidationDb>,
        llm: Option<Arc<dyn DocumentLlm>>,
    ) -> Self {
        Self {
            db,
            llm,
            limits: config.analysis.clone(),
            poll: PollPolicy::from(&config.llm),
            staging_dir: config.storage.staging_dir.clone(),
        }
    }

    /// Whether a provider is available
    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// Reject requests that must not create a job
    pub fn validate_uploads(&self, uploads: &[DocumentUpload]) -> Result<()> {
        if uploads.is_empty() {
            return Err(Error::validation_input("no files uploaded"));
        }
        if uploads.len() > self.limits.max_files {
            return Err(Error::validation_input(format!(
                "too many files: {} (maximum {})",
                uploads.len(),
                self.limits.max_files
            )));
        }

        for upload in uploads {
            if upload.data.is_empty() {
                return Err(Error::validation_input(format!(
                    "file '{}' is empty",
                    upload.file_name
                )));
            }
            if !self.limits.accepts(&upload.mime_type) {
                return Err(Error::validation_input(format!(
                    "unsupported file type '{}' for '{}'; accepted: {}",
                    upload.mime_type,
                    upload.file_name,
                    self.limits.allowed_mime_types.join(", ")
                )));
            }
        }

        Ok(())
    }

    /// Run the full pipeline
    pub async fn run(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<VerificationReport> {
        self.validate_uploads(&request.uploads)?;

        let llm = self
            .llm
            .clone()
            .ok_or_else(|| Error::ProviderUnavailable(format!("{} is not set", API_KEY_ENV)))?;

        self.resolve_user(&request);

        let validation_id = generate_validation_id();
        let file_count = request.uploads.len() as u32;
        let job_created = self.create_job(&validation_id, &request.user_id, file_count);

        tracing::info!(
            validation_id = %validation_id,
            user_id = %request.user_id,
            files = file_count,
            provider = llm.name(),
            model = llm.model(),
            "starting analysis"
        );

        let outcome = self
            .analyze(llm, &validation_id, &request.uploads, cancel)
            .await;

        if job_created {
            match &outcome {
                Ok(report) => self.record_completion(&validation_id, report),
                Err(e) => self.record_failure(&validation_id, e),
            }
        }

        match &outcome {
            Ok(report) => tracing::info!(
                validation_id = %validation_id,
                status = report.verification_status.as_str(),
                risk = report.risk_level.as_str(),
                confidence = report.overall_confidence,
                "analysis completed"
            ),
            Err(e) => tracing::error!(validation_id = %validation_id, error = %e, "analysis failed"),
        }

        outcome
    }

    async fn analyze(
        &self,
        llm: Arc<dyn DocumentLlm>,
        validation_id: &str,
        uploads: &[DocumentUpload],
        cancel: &CancellationToken,
    ) -> Result<VerificationReport> {
        let mut staging = StagingArea::new(&self.staging_dir)?;
        for upload in uploads {
            let staged = staging.stage(upload).await?;
            tracing::debug!(
                validation_id,
                file = %staged.display_name,
                size = staged.size,
                "staged upload"
            );
        }

        let mut remote = RemoteFiles::new(Arc::clone(&llm));
        let generated = tokio::select! {
            result = self.upload_and_generate(llm.as_ref(), &staging, &mut remote, cancel) => result,
            _ = cancel.cancelled() => Err(Error::processing_failed("request", "request cancelled")),
        };

        remote.release().await;
        drop(staging);

        parse_report(&generated?, validation_id)
    }

    async fn upload_and_generate(
        &self,
        llm: &dyn DocumentLlm,
        staging: &StagingArea,
        remote: &mut RemoteFiles,
        cancel: &CancellationToken,
    ) -> Result<String> {
        for file in staging.files() {
            let handle = llm
                .upload_file(&file.path, &file.mime_type, &file.display_name)
                .await?;
            tracing::debug!(file = %file.display_name, remote = %handle.name, "uploaded");
            remote.push(handle);
        }

        let mut ready: Vec<RemoteFile> = Vec::with_capacity(remote.len());
        for handle in remote.files() {
            ready.push(await_ready(llm, handle.clone(), self.poll, cancel).await?);
        }

        let prompt = PromptBuilder::build_analysis_prompt(&ready);
        llm.generate(&prompt, &ready).await
    }

    fn resolve_user(&self, request: &AnalysisRequest) {
        if let Err(e) = self
            .db
            .get_or_create_user(&request.user_id, request.email.as_deref())
        {
            tracing::warn!(
                operation = "get_or_create_user",
                user_id = %request.user_id,
                error = %e,
                "bookkeeping failed"
            );
        }
    }

    fn create_job(&self, validation_id: &str, user_id: &str, file_count: u32) -> bool {
        match self.db.create_validation(validation_id, user_id, file_count) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    operation = "create_validation",
                    validation_id,
                    error = %e,
                    "bookkeeping failed"
                );
                false
            }
        }
    }

    fn record_completion(&self, validation_id: &str, report: &VerificationReport) {
        match self.db.complete_validation(validation_id, report) {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(validation_id, "no processing job to complete"),
            Err(e) => tracing::warn!(
                operation = "complete_validation",
                validation_id,
                error = %e,
                "bookkeeping failed"
            ),
        }
    }

    fn record_failure(&self, validation_id: &str, error: &Error) {
        if let Err(e) = self.db.fail_validation(validation_id, &error.to_string()) {
            tracing::warn!(
                operation = "fail_validation",
                validation_id,
                error = %e,
                "bookkeeping failed"
            );
        }
    }
}

/// `val_<UTC timestamp>_<8 hex chars>`
pub fn generate_validation_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "val_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::tests::ScriptedLlm;
    use crate::providers::FileState;
    use crate::types::{RiskLevel, ValidationStatus};
    use std::time::Duration;
    use tempfile::TempDir;

    const REPORT: &str = r#"```json
{
  "is_completely_verified": true,
  "overall_confidence": 92.0,
  "verification_status": "VERIFIED",
  "risk_level": "LOW",
  "document_1_analysis": {
    "document_type": "invoice",
    "confidence": 95,
    "extracted_data": {"invoice_number": "42", "total": "$500"}
  },
  "cross_validations": [],
  "total_checks": 1,
  "passed_checks": 1,
  "failed_checks": 0,
  "warning_checks": 0,
  "critical_issues": [],
  "warnings": [],
  "verified_items": ["Invoice total matches line items"]
}
```"#;

    struct Fixture {
        db: Arc<ValidationDb>,
        config: DocVerifyConfig,
        _staging: TempDir,
    }

    fn fixture() -> Fixture {
        let staging = tempfile::tempdir().unwrap();
        let mut config = DocVerifyConfig::default();
        config.storage.staging_dir = staging.path().to_path_buf();
        config.llm.poll_interval_secs = 0;

        Fixture {
            db: Arc::new(ValidationDb::in_memory().unwrap()),
            config,
            _staging: staging,
        }
    }

    fn invoice_request() -> AnalysisRequest {
        AnalysisRequest {
            user_id: "u1".to_string(),
            email: Some("u1@example.com".to_string()),
            uploads: vec![DocumentUpload::new(
                "invoice.txt",
                "text/plain",
                "INVOICE #42\nAcme Corp\nTotal: $500",
            )],
        }
    }

    #[tokio::test]
    async fn test_successful_run_persists_report() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlm::new(&[FileState::Active]).with_response(REPORT));
        let pipeline = AnalysisPipeline::new(&fx.config, fx.db.clone(), Some(llm.clone()));

        let report = pipeline
            .run(invoice_request(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.validation_id.starts_with("val_"));
        assert_eq!(report.risk_level, RiskLevel::Low);

        let job = fx.db.get_validation(&report.validation_id).unwrap().unwrap();
        assert_eq!(job.status, ValidationStatus::Completed);
        assert_eq!(job.user_id, "u1");
        assert_eq!(job.file_count, 1);
        assert_eq!(job.overall_confidence, Some(92.0));
        assert_eq!(job.risk_level.as_deref(), Some("LOW"));

        let user = fx.db.get_user("u1").unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("u1@example.com"));

        assert_eq!(*llm.uploaded.lock(), vec!["invoice.txt"]);
        assert_eq!(*llm.deleted.lock(), vec!["files/invoice.txt"]);
        assert!(llm.prompts.lock()[0].contains("invoice.txt"));
    }

    #[tokio::test]
    async fn test_staging_directory_removed() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlm::new(&[FileState::Active]).with_response(REPORT));
        let pipeline = AnalysisPipeline::new(&fx.config, fx.db.clone(), Some(llm));

        pipeline
            .run(invoice_request(), &CancellationToken::new())
            .await
            .unwrap();

        let leftovers = std::fs::read_dir(&fx.config.storage.staging_dir).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_malformed_output_marks_job_failed() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlm::new(&[FileState::Active]).with_response("not json at all"));
        let pipeline = AnalysisPipeline::new(&fx.config, fx.db.clone(), Some(llm.clone()));

        let err = pipeline
            .run(invoice_request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));

        let jobs = fx.db.list_validations_for_user("u1", 50).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, ValidationStatus::Failed);
        assert!(jobs[0].result_json.is_none());
        assert!(jobs[0].error_message.as_deref().unwrap().contains("Malformed"));

        // Remote file still released
        assert_eq!(llm.deleted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_state_marks_job_failed() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlm::new(&[FileState::Failed]).with_response(REPORT));
        let pipeline = AnalysisPipeline::new(&fx.config, fx.db.clone(), Some(llm.clone()));

        let err = pipeline
            .run(invoice_request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderProcessingFailed { ref file, .. } if file == "invoice.txt"));

        let stats = fx.db.validation_stats().unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processing, 0);
        assert!(llm.prompts.lock().is_empty());
        assert_eq!(llm.deleted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_marks_job_failed() {
        let fx = fixture();
        // No scripted states: the file never leaves PROCESSING
        let llm = Arc::new(ScriptedLlm::new(&[]).with_response(REPORT));
        let pipeline = Arc::new(AnalysisPipeline::new(&fx.config, fx.db.clone(), Some(llm.clone())));

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            let cancel = cancel.clone();
            async move { pipeline.run(invoice_request(), &cancel).await }
        });

        for _ in 0..500 {
            if *llm.polls.lock() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(*llm.polls.lock() > 0, "run never reached the readiness wait");
        assert_eq!(fx.db.validation_stats().unwrap().processing, 1);

        // Same as the handler's drop guard firing on disconnect
        drop(cancel.drop_guard());

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ProviderProcessingFailed { ref reason, .. } if reason.contains("cancelled")));

        let stats = fx.db.validation_stats().unwrap();
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(*llm.deleted.lock(), vec!["files/invoice.txt"]);
        assert!(llm.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_provider_creates_no_job() {
        let fx = fixture();
        let pipeline = AnalysisPipeline::new(&fx.config, fx.db.clone(), None);
        assert!(!pipeline.is_configured());

        let err = pipeline
            .run(invoice_request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));
        assert_eq!(fx.db.validation_stats().unwrap(), Default::default());
    }

    #[tokio::test]
    async fn test_invalid_input_creates_no_job() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlm::new(&[]));
        let pipeline = AnalysisPipeline::new(&fx.config, fx.db.clone(), Some(llm));

        let mut request = invoice_request();
        request.uploads = vec![DocumentUpload::new("malware.exe", "application/x-msdownload", vec![0u8; 4])];
        let err = pipeline.run(request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::ValidationInput(_)));

        let mut request = invoice_request();
        request.uploads.clear();
        let err = pipeline.run(request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::ValidationInput(_)));

        assert_eq!(fx.db.validation_stats().unwrap(), Default::default());
        assert!(fx.db.get_user("u1").unwrap().is_none());
    }

    #[test]
    fn test_validate_uploads_limits() {
        let fx = fixture();
        let pipeline = AnalysisPipeline::new(&fx.config, fx.db.clone(), None);

        let many: Vec<_> = (0..11)
            .map(|i| DocumentUpload::new(format!("p{}.pdf", i), "application/pdf", vec![1u8]))
            .collect();
        assert!(pipeline.validate_uploads(&many).is_err());
        assert!(pipeline.validate_uploads(&many[..10]).is_ok());

        let empty = [DocumentUpload::new("blank.pdf", "application/pdf", Vec::<u8>::new())];
        assert!(pipeline.validate_uploads(&empty).is_err());
    }

    #[test]
    fn test_validation_id_format() {
        let id = generate_validation_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "val");
        assert_eq!(parts[1].len(), 14);
        assert_eq!(parts[2].len(), 8);
        assert_ne!(id, generate_validation_id());
    }
}
