//! Page classification: ordered URL/content rules mapped to page kinds.
//!
//! Sites expose the same logical page behind several URL shapes, and some
//! error interstitials share a URL shape with normal pages. The matcher
//! is therefore an insertion-ordered rule list with first-match-wins
//! semantics and an optional content predicate per rule. Classification
//! is a pure function and never fails: an unmatched response is the
//! `None` ("unknown page") state, which callers decide how to treat.

use regex::Regex;

// ============================================================================
// Page Rule
// ============================================================================

/// Content predicate used to disambiguate pages sharing a URL shape.
pub type ContentPredicate = fn(&str) -> bool;

/// One classification rule: a URL pattern plus an optional content check.
pub struct PageRule<K> {
    pattern: Regex,
    content: Option<ContentPredicate>,
    kind: K,
}

impl<K: Copy> PageRule<K> {
    /// Returns the page kind when the rule matches.
    fn matches(&self, url: &str, body: &str) -> Option<K> {
        if !self.pattern.is_match(url) {
            return None;
        }
        if let Some(pred) = self.content {
            if !pred(body) {
                return None;
            }
        }
        Some(self.kind)
    }
}

// ============================================================================
// Page Matcher
// ============================================================================

/// Ordered page-classification table.
///
/// Rules are evaluated in registration order; the first match wins.
/// Multiple rules may map to the same kind.
pub struct PageMatcher<K> {
    rules: Vec<PageRule<K>>,
}

impl<K: Copy + Eq> PageMatcher<K> {
    /// Creates an empty matcher.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Registers a URL-pattern rule.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is not a valid regular expression. Rule
    /// tables are static adapter declarations, so a bad pattern is a
    /// programming error caught by the adapter's own tests.
    #[must_use]
    pub fn rule(mut self, pattern: &str, kind: K) -> Self {
        let pattern = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("invalid page rule pattern {pattern:?}: {e}"));
        self.rules.push(PageRule {
            pattern,
            content: None,
            kind,
        });
        self
    }

    /// Registers a rule that also inspects the response body.
    #[must_use]
    pub fn rule_when(mut self, pattern: &str, content: ContentPredicate, kind: K) -> Self {
        let pattern = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("invalid page rule pattern {pattern:?}: {e}"));
        self.rules.push(PageRule {
            pattern,
            content: Some(content),
            kind,
        });
        self
    }

    /// Classifies a response. `None` means "unknown page".
    pub fn classify(&self, url: &str, body: &str) -> Option<K> {
        self.rules.iter().find_map(|r| r.matches(url, body))
    }

    /// Returns the number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<K: Copy + Eq> Default for PageMatcher<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Page Token
// ============================================================================

/// Opaque continuation descriptor surfaced by page extraction.
///
/// Pagination and task-continuation flows both hand the adapter a set of
/// form parameters to post back; the engine never inspects them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageToken {
    params: Vec<(String, String)>,
}

impl PageToken {
    /// Creates a token from form parameters.
    pub fn new(params: Vec<(String, String)>) -> Self {
        Self { params }
    }

    /// Returns the form parameters.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Consumes the token into form parameters.
    pub fn into_params(self) -> Vec<(String, String)> {
        self.params
    }

    /// Adds or replaces a parameter, returning the updated token.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.params.retain(|(k, _)| *k != key);
        self.params.push((key, value.into()));
        self
    }

    /// Returns the value of a parameter, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Login,
        Accounts,
        Error,
    }

    fn matcher() -> PageMatcher<Kind> {
        PageMatcher::new()
            .rule_when(
                r"https://[^/]+/task/Continue\.do",
                |body| body.contains("technical error"),
                Kind::Error,
            )
            .rule(r"https://[^/]+/auth/Login", Kind::Login)
            .rule(r"https://[^/]+/task/Start\.do\?oid=accounts.*", Kind::Accounts)
            .rule(r"https://[^/]+/task/Continue\.do", Kind::Accounts)
    }

    #[test]
    fn test_first_match_wins() {
        let m = matcher();
        // Same URL shape, disambiguated by content; the error rule is
        // registered first so it shadows the accounts rule.
        assert_eq!(
            m.classify("https://bank.example/task/Continue.do", "technical error occurred"),
            Some(Kind::Error)
        );
        assert_eq!(
            m.classify("https://bank.example/task/Continue.do", "<table>...</table>"),
            Some(Kind::Accounts)
        );
    }

    #[test]
    fn test_unknown_is_none_not_error() {
        let m = matcher();
        assert_eq!(m.classify("https://elsewhere.example/", ""), None);
    }

    #[test]
    fn test_multiple_rules_same_kind() {
        let m = matcher();
        assert_eq!(
            m.classify("https://bank.example/task/Start.do?oid=accounts&t=1", ""),
            Some(Kind::Accounts)
        );
        assert_eq!(
            m.classify("https://bank.example/task/Continue.do", ""),
            Some(Kind::Accounts)
        );
    }

    #[test]
    fn test_token_params() {
        let tok = PageToken::new(vec![("page".into(), "2".into())])
            .with("token", "abc")
            .with("token", "def");
        assert_eq!(tok.get("page"), Some("2"));
        assert_eq!(tok.get("token"), Some("def"));
        assert_eq!(tok.params().len(), 2);
    }
}
