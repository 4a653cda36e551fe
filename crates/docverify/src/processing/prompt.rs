//! Prompt template for cross-document verification

use crate::providers::RemoteFile;
use crate::types::{CheckStatus, RiskLevel, VerificationStatus};

/// Prompt builder for verification requests
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the analysis prompt for the given (ready) files
    ///
    /// The job identifier is never part of the prompt; it is injected into
    /// the parsed response afterwards.
    pub fn build_analysis_prompt(files: &[RemoteFile]) -> String {
        format!(
            r#"You are an expert document verification analyst.

You are given {count} document(s):
{file_list}

Your task:
1. Analyze each document on its own: identify its type, extract its key fields, and note any sign of tampering, missing stamps or signatures, or internal inconsistency.
2. Cross-validate the documents against each other: compare every field that appears in more than one document (names, identifiers, amounts, areas, dates) and decide whether the values agree. Treat transliterations, abbreviations, and unit conversions of the same value as agreeing.
3. Decide whether the document set as a whole can be trusted.

Return ONLY one JSON object (no markdown, no code fences, no extra text) with exactly these fields:

{{
  "is_completely_verified": boolean,
  "overall_confidence": number from 0 to 100,
  "verification_status": one of {statuses},
  "risk_level": one of {risks},
{document_fields}
  "cross_validations": [
    {{
      "field": "name of the compared field",
      "status": one of {checks},
      "values": {{"document_1": "value as written", "document_2": "value as written"}},
      "confidence": number from 0 to 100,
      "explanation": "why the values agree or disagree"
    }}
  ],
  "total_checks": integer,
  "passed_checks": integer,
  "failed_checks": integer,
  "warning_checks": integer,
  "critical_issues": ["problems that block verification"],
  "warnings": ["problems that need review"],
  "verified_items": ["facts that were confirmed"],
  "summary": "two or three sentence overview",
  "recommendation": "what the reviewer should do next"
}}

Rules:
- Extract real data only. If something cannot be read, use null inside extracted_data and mention it in issues.
- passed_checks + failed_checks + warning_checks must equal total_checks.
- Be honest about confidence scores.
- Return ONLY the JSON object."#,
            count = files.len(),
            file_list = Self::format_file_list(files),
            statuses = quoted(VerificationStatus::ALL.iter().map(|s| s.as_str())),
            risks = quoted(RiskLevel::ALL.iter().map(|r| r.as_str())),
            checks = quoted(CheckStatus::ALL.iter().map(|c| c.as_str())),
            document_fields = Self::format_document_fields(files),
        )
    }

    /// `Document 1: invoice.pdf (application/pdf)` per line
    fn format_file_list(files: &[RemoteFile]) -> String {
        files
            .iter()
            .enumerate()
            .map(|(i, f)| format!("- Document {}: {} ({})", i + 1, f.display_name, f.mime_type))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_document_fields(files: &[RemoteFile]) -> String {
        files
            .iter()
            .enumerate()
            .map(|(i, f)| {
                format!(
                    r#"  "document_{n}_analysis": {{
    "document_type": "kind of document",
    "confidence": number from 0 to 100,
    "file_name": "{name}",
    "is_authentic": boolean,
    "extracted_data": {{"field": "value"}},
    "issues": ["problems found in this document"]
  }},"#,
                    n = i + 1,
                    name = f.display_name.replace('"', "'"),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn quoted<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(" | ")
}
