//! Path matching shared by every rule table.
//!
//! # Responsibilities
//! - Decide literal vs regex from the authored pattern
//! - Match a concrete request path against a compiled pattern
//!
//! # Design Decisions
//! - A pattern containing `*` is a regex; anything else is a literal
//! - Regexes are anchored at both ends: full-string match, never substring
//! - Compilation happens once at load time; matching never fails
//!
//! The `*` heuristic is a known sharp edge: `/files/*.txt` is a regex, so the
//! `.` matches any byte and `*` repeats the preceding `/`. It is kept as-is
//! because existing control documents depend on it.

use regex::Regex;
use thiserror::Error;

/// Marks a pattern as a regular expression.
pub const WILDCARD: char = '*';

/// A pattern that failed to compile.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("empty path pattern")]
    Empty,

    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Byte-exact comparison.
    Literal(String),
    /// Full-match regex; `source` is the pattern as authored.
    Regex { source: String, regex: Regex },
}

impl PathPattern {
    /// Compile an authored pattern.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        if !pattern.contains(WILDCARD) {
            return Ok(Self::Literal(pattern.to_string()));
        }

        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self::Regex {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as authored.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(p) => p,
            Self::Regex { source, .. } => source,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Regex { .. })
    }

    /// Returns true if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Literal(p) => p == path,
            Self::Regex { regex, .. } => regex.is_match(path),
        }
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.is_regex() == other.is_regex() && self.as_str() == other.as_str()
    }
}

impl Eq for PathPattern {}

/// One-shot match of an uncompiled pattern. Invalid patterns never match.
pub fn matches(pattern: &str, path: &str) -> bool {
    PathPattern::compile(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_byte_exact() {
        let pattern = PathPattern::compile("/about").unwrap();
        assert!(!pattern.is_regex());
        assert!(pattern.matches("/about"));
        assert!(!pattern.matches("/about/"));
        assert!(!pattern.matches("/About"));
        assert!(!pattern.matches("/about/team"));
    }

    #[test]
    fn test_literal_regex_metacharacters_are_not_special() {
        // No `*`, so `.` and `+` are plain bytes.
        let pattern = PathPattern::compile("/a.b+c").unwrap();
        assert!(pattern.matches("/a.b+c"));
        assert!(!pattern.matches("/axbbc"));
    }

    #[test]
    fn test_regex_is_full_match() {
        let pattern = PathPattern::compile("/admin/.*").unwrap();
        assert!(pattern.is_regex());
        assert!(pattern.matches("/admin/x"));
        assert!(pattern.matches("/admin/"));
        // Substring search would accept these; full match does not.
        assert!(!pattern.matches("/public/admin/x"));
        assert!(!pattern.matches("/admin"));
    }

    #[test]
    fn test_authored_anchors_are_harmless() {
        let pattern = PathPattern::compile("^/docs/.*$").unwrap();
        assert!(pattern.matches("/docs/intro"));
        assert!(!pattern.matches("/x/docs/intro"));
    }

    #[test]
    fn test_star_heuristic_sharp_edge() {
        // Authored as a glob but compiled as a regex: `/files/*` means
        // "/files" followed by any number of slashes.
        let pattern = PathPattern::compile("/files/*").unwrap();
        assert!(pattern.matches("/files/"));
        assert!(pattern.matches("/files//"));
        assert!(!pattern.matches("/files/report.pdf"));
    }

    #[test]
    fn test_invalid_regex_fails_at_compile_time() {
        let err = PathPattern::compile("/broken/(*").unwrap_err();
        assert!(matches!(err, PatternError::InvalidRegex { .. }));
        assert!(!matches("/broken/(*", "/broken/("));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(PathPattern::compile(""), Err(PatternError::Empty)));
    }

    #[test]
    fn test_equality_compares_source() {
        assert_eq!(
            PathPattern::compile("/a/.*").unwrap(),
            PathPattern::compile("/a/.*").unwrap()
        );
        assert_ne!(
            PathPattern::compile("/a/.*").unwrap(),
            PathPattern::compile("/a/x*").unwrap()
        );
    }
}
