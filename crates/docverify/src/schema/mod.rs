//! Turning raw model output into a [`VerificationReport`]

mod fence;
mod validator;

pub use fence::strip_code_fences;
pub use validator::validate_report;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::VerificationReport;

/// Parse and validate provider output for job `validation_id`
///
/// The server-generated id always wins over anything the model wrote.
pub fn parse_report(raw: &str, validation_id: &str) -> Result<VerificationReport> {
    let body = strip_code_fences(raw);

    let mut value: Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            validation_id,
            error = %e,
            raw,
            "provider returned non-JSON output"
        );
        Error::MalformedResponse {
            raw: raw.to_string(),
            message: e.to_string(),
        }
    })?;

    if let Value::Object(obj) = &mut value {
        obj.insert(
            "validation_id".to_string(),
            Value::String(validation_id.to_string()),
        );
    }

    validate_report(&value).map_err(|violations| {
        tracing::error!(
            validation_id,
            violations = violations.len(),
            raw,
            "provider output failed schema validation"
        );
        Error::SchemaViolation(violations)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskLevel;

    fn payload_text() -> String {
        validator::tests::valid_payload().to_string()
    }

    #[test]
    fn test_fenced_and_plain_match() {
        let plain = payload_text();
        let fenced = format!("```json\n{}\n```", plain);

        let a = parse_report(&plain, "val_1").unwrap();
        let b = parse_report(&fenced, "val_1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_validation_id_is_injected() {
        let report = parse_report(&payload_text(), "val_20250101120000_abcd1234").unwrap();
        assert_eq!(report.validation_id, "val_20250101120000_abcd1234");
    }

    #[test]
    fn test_validation_id_not_required_from_model() {
        let mut payload = validator::tests::valid_payload();
        payload.as_object_mut().unwrap().remove("validation_id");

        let report = parse_report(&payload.to_string(), "val_x").unwrap();
        assert_eq!(report.validation_id, "val_x");
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = parse_report("Sure! Here is the report: {", "val_1").unwrap_err();
        match err {
            Error::MalformedResponse { raw, .. } => assert!(raw.starts_with("Sure!")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_field_is_schema_violation() {
        let mut payload = validator::tests::valid_payload();
        payload.as_object_mut().unwrap().remove("risk_level");

        let err = parse_report(&payload.to_string(), "val_1").unwrap_err();
        match err {
            Error::SchemaViolation(violations) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].path, "risk_level");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
