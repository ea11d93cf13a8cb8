//! Selection of the patches handed to the native definition extractor.
//!
//! A patch is kept when its language has a native extractor, its new-side
//! source is available, it inserts at least one line, and its path matches
//! none of the configured skip patterns.

use std::fmt;
use std::path::Path;

use locust_core::{ParseConfig, PatchInfo};

/// Why a patch was left out of native extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No native extractor handles the file's extension.
    UnsupportedLanguage,
    /// The file does not exist at the terminal revision.
    NoSource,
    /// The patch only deletes lines.
    NoInsertions,
    /// Matched a skip pattern.
    PatternMatch(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedLanguage => write!(f, "unsupported language"),
            SkipReason::NoSource => write!(f, "no source at terminal revision"),
            SkipReason::NoInsertions => write!(f, "no inserted lines"),
            SkipReason::PatternMatch(p) => write!(f, "matches pattern: {p}"),
        }
    }
}

/// A patch that was not kept.
#[derive(Debug, Clone)]
pub struct SkippedPatch {
    pub path: String,
    pub reason: SkipReason,
}

/// Result of [`PatchFilter::filter`].
#[derive(Debug, Default)]
pub struct FilterResult {
    pub kept: Vec<PatchInfo>,
    pub skipped: Vec<SkippedPatch>,
}

/// Decides which patches are eligible for native extraction.
///
/// # Examples
///
/// ```
/// use locust_difflens::filter::PatchFilter;
///
/// let filter = PatchFilter::new(&["py"]);
/// assert!(filter.is_supported("pkg/mod.py"));
/// assert!(!filter.is_supported("web/app.js"));
/// ```
#[derive(Debug, Clone)]
pub struct PatchFilter {
    extensions: Vec<String>,
    skip_patterns: Vec<glob::Pattern>,
}

impl PatchFilter {
    /// Create a filter accepting the given file extensions, without skip patterns.
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            skip_patterns: Vec::new(),
        }
    }

    /// Create a filter from parse configuration.
    ///
    /// Invalid glob patterns are logged and ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use locust_core::ParseConfig;
    /// use locust_difflens::filter::PatchFilter;
    ///
    /// let config = ParseConfig {
    ///     skip_patterns: vec!["migrations/**".into()],
    ///     ..ParseConfig::default()
    /// };
    /// let filter = PatchFilter::from_config(&config, &["py"]);
    /// assert!(filter.should_skip("migrations/0001_initial.py"));
    /// assert!(!filter.should_skip("app/models.py"));
    /// ```
    pub fn from_config(config: &ParseConfig, extensions: &[&str]) -> Self {
        let mut skip_patterns = Vec::new();
        for pat in &config.skip_patterns {
            match glob::Pattern::new(pat) {
                Ok(p) => skip_patterns.push(p),
                Err(e) => log::warn!("ignoring invalid skip pattern `{pat}`: {e}"),
            }
        }
        Self {
            skip_patterns,
            ..Self::new(extensions)
        }
    }

    /// Whether `path` has an extension with a native extractor.
    pub fn is_supported(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Whether `path` matches a skip pattern.
    pub fn should_skip(&self, path: &str) -> bool {
        self.matching_pattern(path).is_some()
    }

    fn matching_pattern(&self, path: &str) -> Option<&glob::Pattern> {
        self.skip_patterns.iter().find(|p| p.matches(path))
    }

    /// Reason `patch` is not eligible, or `None` if it should be extracted.
    pub fn check(&self, patch: &PatchInfo) -> Option<SkipReason> {
        if let Some(pattern) = self.matching_pattern(&patch.new_path) {
            return Some(SkipReason::PatternMatch(pattern.to_string()));
        }
        if !self.is_supported(&patch.new_path) {
            return Some(SkipReason::UnsupportedLanguage);
        }
        if patch.new_source.is_none() {
            return Some(SkipReason::NoSource);
        }
        if patch.insertion_boundaries().is_empty() {
            return Some(SkipReason::NoInsertions);
        }
        None
    }

    /// Split `patches` into eligible and skipped ones, preserving order.
    pub fn filter(&self, patches: Vec<PatchInfo>) -> FilterResult {
        let mut result = FilterResult::default();
        for patch in patches {
            match self.check(&patch) {
                Some(reason) => {
                    log::debug!("skipping {}: {reason}", patch.new_path);
                    result.skipped.push(SkippedPatch {
                        path: patch.new_path,
                        reason,
                    });
                }
                None => result.kept.push(patch),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use locust_core::{HunkInfo, LineInfo, LineType};

    use super::*;

    fn patch(path: &str, source: Option<&str>, inserted: &[u32]) -> PatchInfo {
        let lines = inserted
            .iter()
            .map(|&n| LineInfo {
                old_line_number: None,
                new_line_number: Some(n),
                line_type: LineType::Insertion,
                text: String::new(),
            })
            .collect();
        PatchInfo {
            old_path: path.into(),
            new_path: path.into(),
            hunks: vec![HunkInfo::new("@@ @@", lines)],
            old_source: None,
            new_source: source.map(String::from),
        }
    }

    #[test]
    fn keeps_python_with_insertions() {
        let filter = PatchFilter::new(&["py"]);
        assert_eq!(filter.check(&patch("a.py", Some("x"), &[1])), None);
    }

    #[test]
    fn reports_each_skip_reason() {
        let config = ParseConfig {
            skip_patterns: vec!["vendor/**".into()],
            ..ParseConfig::default()
        };
        let filter = PatchFilter::from_config(&config, &["py"]);
        assert_eq!(
            filter.check(&patch("vendor/x.py", Some("x"), &[1])),
            Some(SkipReason::PatternMatch("vendor/**".into()))
        );
        assert_eq!(
            filter.check(&patch("x.rs", Some("x"), &[1])),
            Some(SkipReason::UnsupportedLanguage)
        );
        assert_eq!(
            filter.check(&patch("x.py", None, &[1])),
            Some(SkipReason::NoSource)
        );
        assert_eq!(
            filter.check(&patch("x.py", Some("x"), &[])),
            Some(SkipReason::NoInsertions)
        );
    }

    #[test]
    fn invalid_pattern_is_ignored() {
        let config = ParseConfig {
            skip_patterns: vec!["[".into()],
            ..ParseConfig::default()
        };
        let filter = PatchFilter::from_config(&config, &["py"]);
        assert!(!filter.should_skip("["));
    }

    #[test]
    fn filter_preserves_order() {
        let filter = PatchFilter::new(&["py"]);
        let result = filter.filter(vec![
            patch("b.py", Some("x"), &[1]),
            patch("README.md", Some("x"), &[1]),
            patch("a.py", Some("x"), &[2]),
        ]);
        let kept: Vec<&str> = result.kept.iter().map(|p| p.new_path.as_str()).collect();
        assert_eq!(kept, vec!["b.py", "a.py"]);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason.to_string(), "unsupported language");
    }
}
