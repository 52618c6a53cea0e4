//! Request path matching for bypass lists and cache rules.
//!
//! Three pattern forms, decided by shape:
//! - `^...` compiles as a regular expression
//! - a trailing `*` matches the prefix before it
//! - anything else matches exactly
//!
//! Patterns compile once at construction; per-request matching never
//! touches the regex engine unless the pattern asked for one.

use regex_lite::Regex;

/// A single compiled path pattern.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Exact(String),
    Prefix(String),
    Pattern(Regex),
}

impl PathMatcher {
    /// Compile one pattern. The error is a plain message so callers can
    /// attach their own field context.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        if pattern.is_empty() {
            return Err("empty pattern".to_string());
        }
        if let Some(stripped) = pattern.strip_prefix('^') {
            if stripped.is_empty() {
                return Err("empty regex pattern".to_string());
            }
            let regex = Regex::new(pattern).map_err(|e| format!("invalid regex: {e}"))?;
            return Ok(Self::Pattern(regex));
        }
        if let Some(prefix) = pattern.strip_suffix('*') {
            return Ok(Self::Prefix(prefix.to_string()));
        }
        Ok(Self::Exact(pattern.to_string()))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(prefix) => path.starts_with(prefix),
            Self::Pattern(regex) => regex.is_match(path),
        }
    }
}

/// An ordered collection of compiled patterns.
#[derive(Debug, Clone, Default)]
pub struct PathMatcherSet {
    matchers: Vec<PathMatcher>,
}

impl PathMatcherSet {
    /// Compile every pattern, failing on the first bad one. Validation
    /// reports them all beforehand, so a failure here is a caller bug.
    pub fn compile(patterns: &[String]) -> Result<Self, String> {
        let matchers = patterns
            .iter()
            .map(|p| PathMatcher::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}
