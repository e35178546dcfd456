//! Keyword blacklist fallback
//!
//! Consulted only when no policy matched. The engine reads it through the
//! [`Blacklist`] trait; the owner mutates it.

use aho_corasick::AhoCorasick;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::rule::normalize;

/// Keyword check consulted after the policies
pub trait Blacklist: Send + Sync {
    /// The matched keyword on a hit, `None` otherwise
    fn check(&self, text: &str) -> Option<String>;
}

/// Mutable, case-insensitive substring blacklist
pub struct KeywordBlacklist {
    state: RwLock<BlacklistState>,
}

struct BlacklistState {
    /// As added, in insertion order
    keywords: Vec<String>,
    /// Lowercased, parallel to `keywords`
    patterns: Vec<String>,
    matcher: Option<AhoCorasick>,
}

impl BlacklistState {
    fn build<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = Self {
            keywords: Vec::new(),
            patterns: Vec::new(),
            matcher: None,
        };
        for keyword in keywords {
            state.insert(keyword.into());
        }
        state.rebuild();
        state
    }

    fn insert(&mut self, keyword: String) -> bool {
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() {
            return false;
        }
        let pattern = normalize(&keyword);
        if self.patterns.contains(&pattern) {
            return false;
        }
        self.keywords.push(keyword);
        self.patterns.push(pattern);
        true
    }

    fn rebuild(&mut self) {
        if self.patterns.is_empty() {
            self.matcher = None;
            return;
        }
        self.matcher = match AhoCorasick::builder().build(&self.patterns) {
            Ok(matcher) => Some(matcher),
            Err(e) => {
                warn!(error = %e, "Failed to build blacklist matcher, using linear scan");
                None
            }
        };
    }

    fn find(&self, text: &str) -> Option<usize> {
        let text = normalize(text);
        match &self.matcher {
            Some(matcher) => matcher
                .find_overlapping_iter(&text)
                .map(|m| m.pattern().as_usize())
                .min(),
            None => self.patterns.iter().position(|p| text.contains(p.as_str())),
        }
    }
}

impl KeywordBlacklist {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: RwLock::new(BlacklistState::build(keywords)),
        }
    }

    /// Add a keyword. Blank and case-insensitive duplicates are refused.
    pub fn add(&self, keyword: impl Into<String>) -> bool {
        let mut state = self.state.write();
        let added = state.insert(keyword.into());
        if added {
            state.rebuild();
            debug!(count = state.keywords.len(), "Blacklist keyword added");
        }
        added
    }

    /// Remove a keyword, case-insensitively
    pub fn remove(&self, keyword: &str) -> bool {
        let pattern = normalize(keyword.trim());
        let mut state = self.state.write();
        let Some(index) = state.patterns.iter().position(|p| *p == pattern) else {
            return false;
        };
        state.keywords.remove(index);
        state.patterns.remove(index);
        state.rebuild();
        debug!(count = state.keywords.len(), "Blacklist keyword removed");
        true
    }

    /// Current keywords, in the order they were added
    pub fn keywords(&self) -> Vec<String> {
        self.state.read().keywords.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().keywords.is_empty()
    }
}

impl Default for KeywordBlacklist {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl Blacklist for KeywordBlacklist {
    fn check(&self, text: &str) -> Option<String> {
        let state = self.state.read();
        state.find(text).map(|index| state.keywords[index].clone())
    }
}

impl std::fmt::Debug for KeywordBlacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordBlacklist")
            .field("keywords", &self.keywords())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_substring() {
        let blacklist = KeywordBlacklist::new(["spam", "Scam"]);
        assert_eq!(blacklist.check("buy SPAM now"), Some("spam".to_string()));
        assert_eq!(blacklist.check("a scammer"), Some("Scam".to_string()));
        assert_eq!(blacklist.check("hello"), None);
    }

    #[test]
    fn test_reports_earliest_listed_keyword() {
        let blacklist = KeywordBlacklist::new(["illegal", "spam"]);
        assert_eq!(
            blacklist.check("spam that is illegal"),
            Some("illegal".to_string())
        );
    }

    #[test]
    fn test_overlapping_keywords() {
        let blacklist = KeywordBlacklist::new(["scams", "scam"]);
        assert_eq!(blacklist.check("no scams here"), Some("scams".to_string()));
        assert_eq!(blacklist.check("a scam"), Some("scam".to_string()));
    }

    #[test]
    fn test_add_and_remove() {
        let blacklist = KeywordBlacklist::default();
        assert!(blacklist.is_empty());
        assert_eq!(blacklist.check("spam"), None);

        assert!(blacklist.add("spam"));
        assert!(!blacklist.add("SPAM"));
        assert!(!blacklist.add("   "));
        assert_eq!(blacklist.len(), 1);
        assert_eq!(blacklist.check("Spam!"), Some("spam".to_string()));

        assert!(blacklist.remove("Spam"));
        assert!(!blacklist.remove("spam"));
        assert_eq!(blacklist.check("spam"), None);
    }

    #[test]
    fn test_keywords_keep_insertion_order() {
        let blacklist = KeywordBlacklist::new(["b", "a"]);
        blacklist.add("c");
        assert_eq!(blacklist.keywords(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_unicode_keywords() {
        let blacklist = KeywordBlacklist::new(["ÜBEL"]);
        assert_eq!(blacklist.check("sehr übel"), Some("ÜBEL".to_string()));
    }
}
