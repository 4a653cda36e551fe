//! docverify: cross-document verification backed by an LLM
//!
//! Uploaded documents are handed to a document-aware model, the model's JSON
//! answer is checked against a strict report schema, and each request is
//! tracked as a validation job in SQLite so callers can see their history.

pub mod config;
pub mod error;
pub mod processing;
pub mod providers;
pub mod schema;
pub mod server;
pub mod storage;
pub mod types;

pub use config::DocVerifyConfig;
pub use error::{Error, Result, Violation};
pub use server::{build_router, state::AppState, DocVerifyServer};
pub use storage::ValidationDb;
pub use types::{
    report::{CheckStatus, CrossValidation, DocumentAnalysis, RiskLevel, VerificationReport, VerificationStatus},
    records::{ValidationRecord, ValidationStatus},
};
