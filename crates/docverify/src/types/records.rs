//! Persisted row types: users, validation jobs, and API log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a validation job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Job created, pipeline running
    Processing,
    /// Report stored
    Completed,
    /// Pipeline failed after the job was created
    Failed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            _ => Self::Failed,
        }
    }
}

/// A caller of the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_access: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub total_requests: u64,
    pub is_active: bool,
}

/// One analysis request's lifecycle record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub validation_id: String,
    pub user_id: String,
    pub status: ValidationStatus,
    pub file_count: u32,
    pub is_completely_verified: Option<bool>,
    pub overall_confidence: Option<f64>,
    pub verification_status: Option<String>,
    pub risk_level: Option<String>,
    /// Full report as JSON text
    #[serde(skip_serializing)]
    pub result_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// One inbound request, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLogEntry {
    pub endpoint: String,
    pub method: String,
    pub user_id: Option<String>,
    pub response_status: u16,
    /// Elapsed time in seconds
    pub response_time: f64,
    pub created_at: DateTime<Utc>,
}

impl ApiLogEntry {
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        user_id: Option<String>,
        response_status: u16,
        response_time: f64,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            user_id,
            response_status,
            response_time,
            created_at: Utc::now(),
        }
    }
}

/// Job counts per status, reported by the health endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationStats {
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}
