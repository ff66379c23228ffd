// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword lists that mix plain substrings and regular expressions.

use concierge_config::validation::is_pattern;
use regex::{Regex, RegexBuilder};
use tracing::warn;

/// A compiled keyword list. Matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    substrings: Vec<String>,
    patterns: Vec<Regex>,
}

impl KeywordSet {
    /// Entries containing `\` or `[` are compiled as regexes; the rest are
    /// lowercase substrings. Patterns that fail to compile are dropped.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut set = Self::default();
        for entry in entries {
            let entry = entry.as_ref();
            if entry.is_empty() {
                continue;
            }
            if is_pattern(entry) {
                match RegexBuilder::new(entry).case_insensitive(true).build() {
                    Ok(re) => set.patterns.push(re),
                    Err(e) => warn!(pattern = entry, error = %e, "keyword pattern ignored"),
                }
            } else {
                set.substrings.push(entry.to_lowercase());
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.substrings.is_empty() && self.patterns.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return false;
        }
        self.substrings.iter().any(|k| text.contains(k.as_str()))
            || self.patterns.iter().any(|re| re.is_match(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substrings_are_case_insensitive() {
        let set = KeywordSet::new(&["MOQ", "lead time"]);
        assert!(set.matches("What is your moq?"));
        assert!(set.matches("LEAD TIME please"));
        assert!(!set.matches("hello"));
        assert!(!set.matches("   "));
    }

    #[test]
    fn patterns_are_regexes() {
        let set = KeywordSet::new(&[r"\bspec\b", "[0-9]+ ?pcs"]);
        assert!(set.matches("send the spec sheet"));
        assert!(!set.matches("special offer"));
        assert!(set.matches("I need 500pcs"));
    }

    #[test]
    fn broken_pattern_is_dropped() {
        let set = KeywordSet::new(&["[unclosed", "ok"]);
        assert!(set.matches("ok then"));
        assert!(!set.matches("[unclosed"));
        assert!(KeywordSet::new::<&str>(&[]).is_empty());
    }
}
