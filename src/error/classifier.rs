//! Quota error classifier.
//!
//! Matches failure text against a fixed table of quota indicators. Matching is
//! case-insensitive and substring based, not whole-word: unrelated text that
//! happens to contain "limit" (for example "line limit reached") is classified
//! as a quota error. Callers accept that approximation.

use std::sync::OnceLock;

use regex::Regex;

use super::FailureClass;

/// Quota indicators, most specific first so `matched_indicator` is informative.
pub const QUOTA_INDICATORS: &[&str] = &["quota exceeded", "rate limit", "429", "quota", "limit"];

/// A literal indicator compiled into a case-insensitive pattern.
#[derive(Debug)]
pub struct IndicatorPattern {
    indicator: &'static str,
    regex: Regex,
}

impl IndicatorPattern {
    /// Compiles an indicator as an escaped, case-insensitive literal.
    ///
    /// # Panics
    /// Never in practice: escaped literals always compile.
    pub fn literal(indicator: &'static str) -> Self {
        let pattern = format!("(?i){}", regex::escape(indicator));
        Self {
            indicator,
            regex: Regex::new(&pattern).expect("escaped literal is a valid regex"),
        }
    }

    /// The indicator text this pattern was built from.
    pub fn indicator(&self) -> &'static str {
        self.indicator
    }

    /// Checks if the indicator occurs anywhere in `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Classifier holding the compiled indicator table.
#[derive(Debug)]
pub struct ErrorClassifier {
    patterns: Vec<IndicatorPattern>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    /// Compiles [`QUOTA_INDICATORS`] in order.
    pub fn new() -> Self {
        Self {
            patterns: QUOTA_INDICATORS
                .iter()
                .map(|indicator| IndicatorPattern::literal(indicator))
                .collect(),
        }
    }

    /// Classifies raw error text.
    pub fn classify(&self, raw_error_text: &str) -> FailureClass {
        if self.matched_indicator(raw_error_text).is_some() {
            FailureClass::QuotaExceeded
        } else {
            FailureClass::Unrelated
        }
    }

    /// Returns the first indicator found in `raw_error_text`, if any.
    pub fn matched_indicator(&self, raw_error_text: &str) -> Option<&'static str> {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(raw_error_text))
            .map(IndicatorPattern::indicator)
    }

}

/// Shared classifier, compiled on first use.
pub fn shared() -> &'static ErrorClassifier {
    static CLASSIFIER: OnceLock<ErrorClassifier> = OnceLock::new();
    CLASSIFIER.get_or_init(ErrorClassifier::new)
}

/// Classifies raw error text with the shared classifier.
pub fn classify(raw_error_text: &str) -> FailureClass {
    shared().classify(raw_error_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_table_compiles() {
        let classifier = ErrorClassifier::new();
        assert_eq!(classifier.patterns.len(), QUOTA_INDICATORS.len());
    }

    #[test]
    fn test_classify_http_429() {
        assert_eq!(
            classify("Error 429: rate limit exceeded"),
            FailureClass::QuotaExceeded
        );
    }

    #[test]
    fn test_classify_quota_exceeded_mixed_case() {
        assert_eq!(
            classify("RESOURCE_EXHAUSTED: Quota Exceeded for metric"),
            FailureClass::QuotaExceeded
        );
    }

    #[test]
    fn test_classify_bare_limit() {
        assert_eq!(classify("daily LIMIT reached"), FailureClass::QuotaExceeded);
    }

    #[test]
    fn test_classify_permission_denied_is_unrelated() {
        assert_eq!(classify("permission denied"), FailureClass::Unrelated);
    }

    #[test]
    fn test_classify_empty_text_is_unrelated() {
        assert_eq!(classify(""), FailureClass::Unrelated);
    }

    #[test]
    fn test_substring_match_is_not_whole_word() {
        // Accepted approximation: incidental substrings count.
        assert_eq!(classify("unlimited retries"), FailureClass::QuotaExceeded);
        assert_eq!(classify("request id 14290"), FailureClass::QuotaExceeded);
    }

    #[test]
    fn test_matched_indicator_prefers_specific() {
        let classifier = ErrorClassifier::new();
        assert_eq!(
            classifier.matched_indicator("Quota exceeded for project"),
            Some("quota exceeded")
        );
        assert_eq!(
            classifier.matched_indicator("hit the rate limit"),
            Some("rate limit")
        );
        assert_eq!(classifier.matched_indicator("token limit"), Some("limit"));
        assert_eq!(classifier.matched_indicator("segfault"), None);
    }

    #[test]
    fn test_classify_is_idempotent() {
        for text in ["Error 429", "permission denied", "quota", ""] {
            assert_eq!(classify(text), classify(text));
        }
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = IndicatorPattern::literal("a.b");
        assert!(pattern.matches("xa.by"));
        assert!(!pattern.matches("axb"));
    }
}
