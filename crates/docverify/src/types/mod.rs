//! Core types for the verification service

pub mod records;
pub mod report;

pub use records::{ApiLogEntry, UserRecord, ValidationRecord, ValidationStats, ValidationStatus};
pub use report::{
    CheckStatus, CrossValidation, DocumentAnalysis, ReportSummary, RiskLevel,
    VerificationReport, VerificationStatus,
};
