//! Markdown code-fence removal for model output

/// Strip a surrounding ```` ``` ```` / ```` ```json ```` fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Opening line may carry a language tag
    let body = match rest.find('\n') {
        Some(idx) if is_language_tag(&rest[..idx]) => &rest[idx + 1..],
        _ => strip_json_tag(rest),
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn strip_json_tag(s: &str) -> &str {
    match s.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &s[4..],
        _ => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fence() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```JSON\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_bare_fence() {
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_single_line_fence() {
        assert_eq!(strip_code_fences("```json{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn test_unterminated_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }
}
