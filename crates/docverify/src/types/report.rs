//! Verification report returned to callers and persisted as a JSON blob

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Overall verification verdict
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Verified,
    PartiallyVerified,
    NotVerified,
    Suspicious,
}

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 4] = [
        Self::Verified,
        Self::PartiallyVerified,
        Self::NotVerified,
        Self::Suspicious,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::PartiallyVerified => "PARTIALLY_VERIFIED",
            Self::NotVerified => "NOT_VERIFIED",
            Self::Suspicious => "SUSPICIOUS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Risk assessment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Outcome of a single cross-document comparison
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warning,
}

impl CheckStatus {
    pub const ALL: [CheckStatus; 3] = [Self::Pass, Self::Fail, Self::Warning];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Warning => "WARNING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Findings for one uploaded document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentAnalysis {
    /// 1-based position of the document in the upload
    pub document_index: u32,
    /// Document kind as identified by the model (invoice, deed, ...)
    pub document_type: String,
    /// Model confidence, 0-100
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_authentic: Option<bool>,
    /// Free-form extracted fields
    #[serde(default)]
    pub extracted_data: Map<String, Value>,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// One field compared across documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossValidation {
    pub field: String,
    pub status: CheckStatus,
    /// Value of the field per document
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Structured verification report
///
/// Built once per request by [`crate::schema::parse_report`] and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationReport {
    /// Server-generated job identifier
    pub validation_id: String,
    pub is_completely_verified: bool,
    /// Overall confidence, 0-100
    pub overall_confidence: f64,
    pub verification_status: VerificationStatus,
    pub risk_level: RiskLevel,
    /// Per-document analyses ordered by `document_index`
    pub document_analyses: Vec<DocumentAnalysis>,
    pub cross_validations: Vec<CrossValidation>,
    pub total_checks: u32,
    pub passed_checks: u32,
    pub failed_checks: u32,
    pub warning_checks: u32,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub verified_items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl VerificationReport {
    /// Summary columns stored alongside the JSON blob
    pub fn summary_fields(&self) -> ReportSummary {
        ReportSummary {
            is_completely_verified: self.is_completely_verified,
            overall_confidence: self.overall_confidence,
            verification_status: self.verification_status,
            risk_level: self.risk_level,
        }
    }
}

/// The summarized fields of a report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSummary {
    pub is_completely_verified: bool,
    pub overall_confidence: f64,
    pub verification_status: VerificationStatus,
    pub risk_level: RiskLevel,
}
