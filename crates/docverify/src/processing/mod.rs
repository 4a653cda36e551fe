//! Request orchestration: staging, provider round-trip, and persistence

mod pipeline;
mod prompt;
mod remote;
mod staging;

pub use pipeline::{generate_validation_id, AnalysisPipeline, AnalysisRequest};
pub use prompt::PromptBuilder;
pub use remote::RemoteFiles;
pub use staging::{DocumentUpload, StagedFile, StagingArea};
