//! # Pattern Cache
//!
//! Compiled regular expressions shared by table/column filtering and
//! transform matching.
//!
//! Patterns are compiled on first use and reused on every later lookup.
//! Compile failures are returned to the caller and never cached, so a pattern
//! that failed once is simply retried the next time it is seen.
//!
//! Matching is an unanchored, case-sensitive search: anchor explicitly with
//! `^...$` to match a whole qualified name.
//!
//! ## Example
//!
//! ```rust
//! use isle_cdc::common::PatternCache;
//!
//! let cache = PatternCache::new();
//! assert!(cache.is_match(r"^public\.users\.(email|phone)$", "public.users.email"));
//! assert!(!cache.is_match(r"^public\.users\.(email|phone)$", "public.users.id"));
//!
//! // Invalid patterns are skipped, not fatal
//! let patterns = vec!["[".to_string(), "^audit\\.".to_string()];
//! assert!(cache.matches_any("audit.log", &patterns));
//! ```

use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Thread-safe memo of compiled regular expressions.
///
/// Reads take a shared lock; only the first compilation of a pattern takes
/// the write lock. Without a bound the cache never evicts, which is fine while
/// the pattern set is derived from configuration.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: RwLock<HashMap<String, Regex>>,
    max_entries: Option<usize>,
}

impl PatternCache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding at most `max_entries` patterns.
    ///
    /// Once full, new patterns are still compiled and used but not retained.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
            max_entries: Some(max_entries),
        }
    }

    /// Return the compiled matcher for `pattern`, compiling it on first use.
    pub fn compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        if let Some(re) = self.compiled.read().get(pattern) {
            return Ok(re.clone());
        }

        let re = Regex::new(pattern)?;

        let mut compiled = self.compiled.write();
        if let Some(existing) = compiled.get(pattern) {
            // Another thread won the race
            return Ok(existing.clone());
        }
        if self.max_entries.is_none_or(|max| compiled.len() < max) {
            debug!(pattern, "compiled and cached pattern");
            compiled.insert(pattern.to_string(), re.clone());
        }
        Ok(re)
    }

    /// Check a subject against one pattern. Non-compiling patterns never match.
    #[inline]
    pub fn is_match(&self, pattern: &str, subject: &str) -> bool {
        self.compile(pattern)
            .map(|re| re.is_match(subject))
            .unwrap_or(false)
    }

    /// True iff any pattern compiles and matches the subject.
    ///
    /// Patterns that fail to compile are skipped rather than aborting the check.
    pub fn matches_any(&self, subject: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|p| self.is_match(p, subject))
    }

    /// Number of cached patterns.
    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    /// Check if nothing is cached yet.
    pub fn is_empty(&self) -> bool {
        self.compiled.read().is_empty()
    }

    /// Check whether a pattern is currently cached.
    pub fn contains(&self, pattern: &str) -> bool {
        self.compiled.read().contains_key(pattern)
    }

    /// Drop every cached pattern.
    pub fn clear(&self) {
        self.compiled.write().clear();
    }
}
