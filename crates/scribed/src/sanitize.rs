//! Input hygiene at the pipeline boundary.
//!
//! Pure functions: truncate, strip control bytes, HTML-escape, remove a
//! fixed denylist of dangerous markup, and reject SQL-injection-shaped
//! input outright. Applied by the transport layer before any request
//! reaches the orchestrator.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use scribe_common::PipelineError;

static DANGEROUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)<script[^>]*>.*?</script>",
        r"(?i)javascript:",
        r"(?i)on\w+\s*=",
        r"(?i)<iframe[^>]*>",
        r"(?i)<object[^>]*>",
        r"(?i)<embed[^>]*>",
        r"(?i)data:text/html",
        r"(?i)eval\s*\(",
        r"(?i)expression\s*\(",
        r"(?i)import\s+",
        r"(?i)require\s*\(",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(\bUNION\b|\bSELECT\b|\bINSERT\b|\bDELETE\b|\bUPDATE\b|\bDROP\b)",
        r"(?i)(\bOR\b|\bAND\b)\s+(\d+\s*=\s*\d+|\w+\s*=\s*\w+)",
        r#"['";].*(--)|(/\*)"#,
        r"(?i)xp_\w+",
        r"(?i)sp_\w+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static KEYWORD_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\s\-_]+$").expect("static pattern"));

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Clean one free-text field. Fails only on SQL-injection-shaped input;
/// everything else is stripped or escaped.
pub fn sanitize_string(text: &str, max_len: usize) -> Result<String, PipelineError> {
    if text.is_empty() {
        return Ok(String::new());
    }

    let truncated: String = text.chars().take(max_len).collect();
    let without_nul = truncated.replace('\0', "");
    let mut cleaned = html_escape(&without_nul);

    for pattern in DANGEROUS_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    for pattern in SQL_PATTERNS.iter() {
        if pattern.is_match(&cleaned) {
            let shown: String = cleaned.chars().take(80).collect();
            warn!("Blocked input with injection-shaped content: {}", shown);
            return Err(PipelineError::InputValidation(
                "invalid input detected".to_string(),
            ));
        }
    }

    Ok(cleaned.trim().to_string())
}

/// Clean a keyword list: cap the count, sanitize each entry, drop empties,
/// and keep only alphanumeric/space/hyphen/underscore keywords, lowercased.
pub fn sanitize_keywords(
    keywords: &[String],
    max_count: usize,
    max_len: usize,
) -> Result<Vec<String>, PipelineError> {
    let mut sanitized = Vec::new();
    for keyword in keywords.iter().take(max_count) {
        let cleaned = sanitize_string(keyword, max_len)?;
        if cleaned.is_empty() {
            continue;
        }
        if KEYWORD_SHAPE.is_match(&cleaned) {
            sanitized.push(cleaned.to_lowercase());
        }
    }
    Ok(sanitized)
}

/// Closed-set category check.
pub fn validate_category(category: &str, allowed: &[&str]) -> Result<String, PipelineError> {
    if category.trim().is_empty() {
        return Err(PipelineError::InputValidation(
            "category is required".to_string(),
        ));
    }

    let cleaned = sanitize_string(category, 100)?;
    if allowed.contains(&cleaned.as_str()) {
        Ok(cleaned)
    } else {
        Err(PipelineError::InputValidation(format!(
            "invalid category; allowed: {}",
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_tag_neutralized() {
        let out = sanitize_string("<script>alert(1)</script>", 1000).unwrap();
        assert!(!out.contains("<script"));
        assert!(!out.contains("</script>"));
        // Escaped remnants are fine; executable markup is not
        assert!(!out.contains('<'));
    }

    #[test]
    fn test_sql_injection_rejected() {
        let err = sanitize_string("' OR 1=1 --", 1000).unwrap_err();
        assert!(matches!(err, PipelineError::InputValidation(_)));

        let err = sanitize_string("1; DROP TABLE articles", 1000).unwrap_err();
        assert!(matches!(err, PipelineError::InputValidation(_)));
    }

    #[test]
    fn test_benign_text_passes_through() {
        let out = sanitize_string("Digital marketing trends for 2026", 1000).unwrap();
        assert_eq!(out, "Digital marketing trends for 2026");
    }

    #[test]
    fn test_truncation_and_nul_stripping() {
        let out = sanitize_string("abc\0def", 1000).unwrap();
        assert_eq!(out, "abcdef");

        let out = sanitize_string("abcdefghij", 4).unwrap();
        assert_eq!(out, "abcd");
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let out = sanitize_string("café au lait", 4).unwrap();
        assert_eq!(out, "café");
    }

    #[test]
    fn test_event_handler_and_protocol_stripped() {
        let out = sanitize_string("click javascript:go() onload= here", 1000).unwrap();
        assert!(!out.to_lowercase().contains("javascript:"));
        assert!(!out.to_lowercase().contains("onload"));
    }

    #[test]
    fn test_sanitize_keywords_filters_and_lowercases() {
        let keywords = vec![
            "Marketing".to_string(),
            "A/B testing".to_string(), // slash fails the shape check
            "  ".to_string(),
            "growth-hacking".to_string(),
        ];
        let out = sanitize_keywords(&keywords, 10, 50).unwrap();
        assert_eq!(out, vec!["marketing".to_string(), "growth-hacking".to_string()]);
    }

    #[test]
    fn test_sanitize_keywords_caps_count() {
        let keywords: Vec<String> = (0..20).map(|i| format!("kw{}", i)).collect();
        let out = sanitize_keywords(&keywords, 10, 50).unwrap();
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn test_sanitize_keywords_propagates_injection_failure() {
        let keywords = vec!["' OR 1=1 --".to_string()];
        assert!(sanitize_keywords(&keywords, 10, 50).is_err());
    }

    #[test]
    fn test_validate_category() {
        let allowed = ["Marketing", "Futurist", "Technology"];
        assert_eq!(
            validate_category("Marketing", &allowed).unwrap(),
            "Marketing"
        );
        assert!(validate_category("", &allowed).is_err());
        let err = validate_category("Gadgets", &allowed).unwrap_err();
        assert!(err.to_string().contains("Marketing"));
    }
}
