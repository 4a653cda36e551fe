//! Explicit report schema
//!
//! Walks the provider's JSON once, recording every violation with its path,
//! and only builds a [`VerificationReport`] when nothing was found.
//!
//! Root fields:
//!
//! | field | type | required |
//! |-------|------|----------|
//! | `validation_id` | string | yes (injected) |
//! | `is_completely_verified` | bool | yes |
//! | `overall_confidence` | number 0-100 | yes |
//! | `verification_status` | `VERIFIED` `PARTIALLY_VERIFIED` `NOT_VERIFIED` `SUSPICIOUS` | yes |
//! | `risk_level` | `LOW` `MEDIUM` `HIGH` `CRITICAL` | yes |
//! | `document_N_analysis` | object, N >= 1, at least one | yes |
//! | `cross_validations` | array of objects | yes |
//! | `total_checks` `passed_checks` `failed_checks` `warning_checks` | integer >= 0 | yes |
//! | `critical_issues` `warnings` `verified_items` | array of strings | yes |
//! | `summary` `recommendation` | string | no |

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::Violation;
use crate::types::{
    CheckStatus, CrossValidation, DocumentAnalysis, RiskLevel, VerificationReport,
    VerificationStatus,
};

type Object = Map<String, Value>;

/// Validate a parsed provider response and build the typed report
pub fn validate_report(value: &Value) -> Result<VerificationReport, Vec<Violation>> {
    let mut checker = Checker::default();

    let Some(root) = checker.object(value, "$") else {
        return Err(checker.violations);
    };

    let validation_id = checker.required_str(root, "", "validation_id");
    let is_completely_verified = checker.required_bool(root, "", "is_completely_verified");
    let overall_confidence = checker.required_percent(root, "", "overall_confidence");
    let verification_status = checker.required_enum(
        root,
        "",
        "verification_status",
        VerificationStatus::parse,
        &VerificationStatus::ALL.map(|v| v.as_str()),
    );
    let risk_level = checker.required_enum(
        root,
        "",
        "risk_level",
        RiskLevel::parse,
        &RiskLevel::ALL.map(|v| v.as_str()),
    );
    let document_analyses = checker.document_analyses(root);
    let cross_validations = checker.cross_validations(root);
    let total_checks = checker.required_count(root, "", "total_checks");
    let passed_checks = checker.required_count(root, "", "passed_checks");
    let failed_checks = checker.required_count(root, "", "failed_checks");
    let warning_checks = checker.required_count(root, "", "warning_checks");
    let critical_issues = checker.required_string_list(root, "", "critical_issues");
    let warnings = checker.required_string_list(root, "", "warnings");
    let verified_items = checker.required_string_list(root, "", "verified_items");
    let summary = checker.optional_str(root, "", "summary");
    let recommendation = checker.optional_str(root, "", "recommendation");

    if !checker.violations.is_empty() {
        return Err(checker.violations);
    }

    let build = || {
        Some(VerificationReport {
            validation_id: validation_id?,
            is_completely_verified: is_completely_verified?,
            overall_confidence: overall_confidence?,
            verification_status: verification_status?,
            risk_level: risk_level?,
            document_analyses: document_analyses?,
            cross_validations: cross_validations?,
            total_checks: total_checks?,
            passed_checks: passed_checks?,
            failed_checks: failed_checks?,
            warning_checks: warning_checks?,
            critical_issues: critical_issues?,
            warnings: warnings?,
            verified_items: verified_items?,
            summary,
            recommendation,
        })
    };

    let report = build().ok_or_else(|| vec![Violation::new("$", "incomplete report")])?;

    let counted = u64::from(report.passed_checks)
        + u64::from(report.failed_checks)
        + u64::from(report.warning_checks);
    if counted != u64::from(report.total_checks) {
        tracing::warn!(
            validation_id = %report.validation_id,
            total = report.total_checks,
            passed = report.passed_checks,
            failed = report.failed_checks,
            warning = report.warning_checks,
            "check counters do not add up"
        );
    }

    Ok(report)
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `document_3_analysis` -> 3; `document_03_analysis` is not a document key
fn document_index(key: &str) -> Option<u32> {
    let digits = key.strip_prefix("document_")?.strip_suffix("_analysis")?;
    if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn violation(&mut self, path: String, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    fn mismatch(&mut self, path: String, expected: &str, found: &Value) {
        self.violation(path, format!("expected {}, found {}", expected, type_name(found)));
    }

    /// Fetch a required key, recording a violation when it is absent or null
    fn required<'a>(&mut self, obj: &'a Object, prefix: &str, key: &str) -> Option<&'a Value> {
        match obj.get(key) {
            Some(Value::Null) | None => {
                self.violation(join(prefix, key), "missing required field");
                None
            }
            Some(value) => Some(value),
        }
    }

    fn object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Object> {
        match value {
            Value::Object(obj) => Some(obj),
            other => {
                self.mismatch(path.to_string(), "object", other);
                None
            }
        }
    }

    fn required_bool(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<bool> {
        match self.required(obj, prefix, key)? {
            Value::Bool(b) => Some(*b),
            other => {
                self.mismatch(join(prefix, key), "boolean", other);
                None
            }
        }
    }

    fn optional_bool(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<bool> {
        match obj.get(key)? {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            other => {
                self.mismatch(join(prefix, key), "boolean", other);
                None
            }
        }
    }

    fn required_str(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<String> {
        match self.required(obj, prefix, key)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.mismatch(join(prefix, key), "string", other);
                None
            }
        }
    }

    fn optional_str(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<String> {
        match obj.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => {
                self.mismatch(join(prefix, key), "string", other);
                None
            }
        }
    }

    fn percent(&mut self, value: &Value, path: String) -> Option<f64> {
        let Some(n) = value.as_f64() else {
            self.mismatch(path, "number", value);
            return None;
        };
        if !(0.0..=100.0).contains(&n) {
            self.violation(path, format!("must be between 0 and 100, found {}", n));
            return None;
        }
        Some(n)
    }

    fn required_percent(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<f64> {
        let value = self.required(obj, prefix, key)?;
        self.percent(value, join(prefix, key))
    }

    fn optional_percent(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<f64> {
        match obj.get(key)? {
            Value::Null => None,
            value => self.percent(value, join(prefix, key)),
        }
    }

    fn required_count(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<u32> {
        let value = self.required(obj, prefix, key)?;
        let count = value.as_u64().or_else(|| {
            // Models sometimes emit 3.0 for 3
            value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        });

        match count.and_then(|c| u32::try_from(c).ok()) {
            Some(c) => Some(c),
            None => {
                self.violation(
                    join(prefix, key),
                    format!("expected non-negative integer, found {}", value),
                );
                None
            }
        }
    }

    fn required_enum<T>(
        &mut self,
        obj: &Object,
        prefix: &str,
        key: &str,
        parse: fn(&str) -> Option<T>,
        allowed: &[&str],
    ) -> Option<T> {
        let path = join(prefix, key);
        match self.required(obj, prefix, key)? {
            Value::String(s) => {
                let parsed = parse(s);
                if parsed.is_none() {
                    self.violation(
                        path,
                        format!("invalid value '{}', expected one of {}", s, allowed.join(", ")),
                    );
                }
                parsed
            }
            other => {
                self.mismatch(path, "string", other);
                None
            }
        }
    }

    fn string_list(&mut self, value: &Value, path: &str) -> Option<Vec<String>> {
        let Value::Array(items) = value else {
            self.mismatch(path.to_string(), "array", value);
            return None;
        };

        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::String(s) => out.push(s.clone()),
                other => {
                    self.mismatch(format!("{}[{}]", path, i), "string", other);
                    ok = false;
                }
            }
        }
        ok.then_some(out)
    }

    fn required_string_list(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<Vec<String>> {
        let value = self.required(obj, prefix, key)?;
        self.string_list(value, &join(prefix, key))
    }

    fn optional_string_list(&mut self, obj: &Object, prefix: &str, key: &str) -> Option<Vec<String>> {
        match obj.get(key)? {
            Value::Null => None,
            value => self.string_list(value, &join(prefix, key)),
        }
    }

    fn document_analyses(&mut self, root: &Object) -> Option<Vec<DocumentAnalysis>> {
        let mut keyed: Vec<(u32, &String, &Value)> = root
            .iter()
            .filter_map(|(key, value)| document_index(key).map(|idx| (idx, key, value)))
            .collect();

        if keyed.is_empty() {
            self.violation(
                "document_1_analysis".to_string(),
                "missing required field (at least one document analysis)",
            );
            return None;
        }

        keyed.sort_by_key(|(idx, _, _)| *idx);

        let mut analyses = Vec::with_capacity(keyed.len());
        let mut ok = true;
        for (index, key, value) in keyed {
            match self.document_analysis(index, key, value) {
                Some(analysis) => analyses.push(analysis),
                None => ok = false,
            }
        }
        ok.then_some(analyses)
    }

    fn document_analysis(&mut self, index: u32, path: &str, value: &Value) -> Option<DocumentAnalysis> {
        let obj = self.object(value, path)?;

        let document_type = self.required_str(obj, path, "document_type");
        let confidence = self.required_percent(obj, path, "confidence");
        let file_name = self.optional_str(obj, path, "file_name");
        let is_authentic = self.optional_bool(obj, path, "is_authentic");
        let issues = self.optional_string_list(obj, path, "issues");

        let extracted_data = match obj.get("extracted_data") {
            None | Some(Value::Null) => Some(Map::new()),
            Some(Value::Object(map)) => Some(map.clone()),
            Some(other) => {
                self.mismatch(join(path, "extracted_data"), "object", other);
                None
            }
        };

        let issues_ok = obj.get("issues").map_or(true, |v| v.is_null() || issues.is_some());
        if !issues_ok {
            return None;
        }

        Some(DocumentAnalysis {
            document_index: index,
            document_type: document_type?,
            confidence: confidence?,
            file_name,
            is_authentic,
            extracted_data: extracted_data?,
            issues: issues.unwrap_or_default(),
        })
    }

    fn cross_validations(&mut self, root: &Object) -> Option<Vec<CrossValidation>> {
        let value = self.required(root, "", "cross_validations")?;
        let Value::Array(items) = value else {
            self.mismatch("cross_validations".to_string(), "array", value);
            return None;
        };

        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            let path = format!("cross_validations[{}]", i);
            match self.cross_validation(&path, item) {
                Some(cv) => out.push(cv),
                None => ok = false,
            }
        }
        ok.then_some(out)
    }

    fn cross_validation(&mut self, path: &str, value: &Value) -> Option<CrossValidation> {
        let obj = self.object(value, path)?;

        let field = self.required_str(obj, path, "field");
        let status = self.required_enum(
            obj,
            path,
            "status",
            CheckStatus::parse,
            &CheckStatus::ALL.map(|v| v.as_str()),
        );
        let confidence = self.optional_percent(obj, path, "confidence");
        let explanation = self.optional_str(obj, path, "explanation");
        let values = self.value_map(obj, path);

        let confidence_ok = obj
            .get("confidence")
            .map_or(true, |v| v.is_null() || confidence.is_some());

        if !confidence_ok {
            return None;
        }

        Some(CrossValidation {
            field: field?,
            status: status?,
            values: values?,
            confidence,
            explanation,
        })
    }

    /// `values`: document label -> value as text; scalars are stringified
    fn value_map(&mut self, obj: &Object, prefix: &str) -> Option<BTreeMap<String, String>> {
        let path = join(prefix, "values");
        match obj.get("values") {
            None | Some(Value::Null) => Some(BTreeMap::new()),
            Some(Value::Object(map)) => {
                let mut out = BTreeMap::new();
                let mut ok = true;
                for (k, v) in map {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        Value::Bool(_) | Value::Number(_) => v.to_string(),
                        other => {
                            self.mismatch(format!("{}.{}", path, k), "string", other);
                            ok = false;
                            continue;
                        }
                    };
                    out.insert(k.clone(), text);
                }
                ok.then_some(out)
            }
            Some(other) => {
                self.mismatch(path, "object", other);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn valid_payload() -> Value {
        json!({
            "validation_id": "val_test",
            "is_completely_verified": true,
            "overall_confidence": 92.0,
            "verification_status": "VERIFIED",
            "risk_level": "LOW",
            "document_1_analysis": {
                "document_type": "invoice",
                "confidence": 95,
                "file_name": "invoice.txt",
                "extracted_data": {"amount": "$500", "vendor": "Acme Corp"},
                "issues": []
            },
            "cross_validations": [],
            "total_checks": 1,
            "passed_checks": 1,
            "failed_checks": 0,
            "warning_checks": 0,
            "critical_issues": [],
            "warnings": [],
            "verified_items": ["Invoice amount is consistent"],
            "summary": "Single invoice, internally consistent.",
            "recommendation": "Accept"
        })
    }

    fn paths(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn test_valid_report() {
        let report = validate_report(&valid_payload()).unwrap();
        assert_eq!(report.validation_id, "val_test");
        assert_eq!(report.verification_status, VerificationStatus::Verified);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.document_analyses.len(), 1);
        assert_eq!(report.document_analyses[0].document_index, 1);
        assert_eq!(report.document_analyses[0].confidence, 95.0);
        assert_eq!(report.verified_items.len(), 1);
    }

    #[test]
    fn test_missing_risk_level() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("risk_level");

        let violations = validate_report(&payload).unwrap_err();
        assert_eq!(paths(&violations), vec!["risk_level"]);
        assert_eq!(violations[0].message, "missing required field");
    }

    #[test]
    fn test_collects_all_violations() {
        let mut payload = valid_payload();
        let obj = payload.as_object_mut().unwrap();
        obj.insert("overall_confidence".into(), json!(140));
        obj.insert("verification_status".into(), json!("MAYBE"));
        obj.insert("warnings".into(), json!("none"));
        obj.insert("passed_checks".into(), json!(-1));

        let violations = validate_report(&payload).unwrap_err();
        let found = paths(&violations);
        assert!(found.contains(&"overall_confidence"));
        assert!(found.contains(&"verification_status"));
        assert!(found.contains(&"warnings"));
        assert!(found.contains(&"passed_checks"));
        assert_eq!(violations.len(), 4);
    }

    #[test]
    fn test_document_analyses_sorted_and_checked() {
        let mut payload = valid_payload();
        let obj = payload.as_object_mut().unwrap();
        obj.insert(
            "document_2_analysis".into(),
            json!({"document_type": "sale deed", "confidence": 80, "is_authentic": true}),
        );
        obj.insert(
            "document_10_analysis".into(),
            json!({"document_type": "jamabandi", "confidence": 70}),
        );

        let report = validate_report(&payload).unwrap();
        let indices: Vec<u32> = report.document_analyses.iter().map(|d| d.document_index).collect();
        assert_eq!(indices, vec![1, 2, 10]);
        assert_eq!(report.document_analyses[1].is_authentic, Some(true));

        let obj = payload.as_object_mut().unwrap();
        obj.insert("document_2_analysis".into(), json!({"confidence": "high"}));
        let violations = validate_report(&payload).unwrap_err();
        assert_eq!(
            paths(&violations),
            vec!["document_2_analysis.document_type", "document_2_analysis.confidence"]
        );
    }

    #[test]
    fn test_requires_a_document_analysis() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("document_1_analysis");

        let violations = validate_report(&payload).unwrap_err();
        assert_eq!(paths(&violations), vec!["document_1_analysis"]);
    }

    #[test]
    fn test_cross_validation_paths() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().insert(
            "cross_validations".into(),
            json!([
                {"field": "owner_name", "status": "PASS", "values": {"doc1": "Ram Kumar", "doc2": "R. Kumar"}, "confidence": 91},
                {"field": "plot_number", "status": "UNKNOWN"}
            ]),
        );

        let violations = validate_report(&payload).unwrap_err();
        assert_eq!(paths(&violations), vec!["cross_validations[1].status"]);
    }

    #[test]
    fn test_cross_validation_values_stringified() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().insert(
            "cross_validations".into(),
            json!([{"field": "area_sqft", "status": "WARNING", "values": {"doc1": 27225, "doc2": "27,000"}}]),
        );

        let report = validate_report(&payload).unwrap();
        let cv = &report.cross_validations[0];
        assert_eq!(cv.status, CheckStatus::Warning);
        assert_eq!(cv.values["doc1"], "27225");
        assert_eq!(cv.values["doc2"], "27,000");
    }

    #[test]
    fn test_float_counts_accepted() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().insert("total_checks".into(), json!(1.0));
        assert_eq!(validate_report(&payload).unwrap().total_checks, 1);

        payload.as_object_mut().unwrap().insert("total_checks".into(), json!(1.5));
        let violations = validate_report(&payload).unwrap_err();
        assert_eq!(paths(&violations), vec!["total_checks"]);
    }

    #[test]
    fn test_non_object_root() {
        let violations = validate_report(&json!([1, 2])).unwrap_err();
        assert_eq!(paths(&violations), vec!["$"]);
    }

    #[test]
    fn test_document_index_parsing() {
        assert_eq!(document_index("document_1_analysis"), Some(1));
        assert_eq!(document_index("document_12_analysis"), Some(12));
        assert_eq!(document_index("document_0_analysis"), None);
        assert_eq!(document_index("document_01_analysis"), None);
        assert_eq!(document_index("document_+1_analysis"), None);
        assert_eq!(document_index("document__analysis"), None);
        assert_eq!(document_index("document_x_analysis"), None);
        assert_eq!(document_index("summary"), None);
    }

    #[test]
    fn test_zero_padded_document_key_does_not_duplicate_index() {
        let mut payload = valid_payload();
        let first = payload["document_1_analysis"].clone();
        payload["document_01_analysis"] = first;

        let report = validate_report(&payload).unwrap();
        let indices: Vec<u32> = report
            .document_analyses
            .iter()
            .map(|d| d.document_index)
            .collect();
        assert_eq!(indices, vec![1]);
    }
}
