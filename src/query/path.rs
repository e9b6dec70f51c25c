//! Metric paths and glob patterns
//!
//! A metric path is an ordered list of non-empty segments joined by `.`.
//! A glob pattern has the same shape, but each segment may contain
//! wildcards that match within exactly one segment:
//!
//! ```text
//! *        any run of characters
//! ?        a single character
//! [abc]    one character from a set ([!abc] negates)
//! {x,y}    one of the listed alternatives
//! ```

use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::query::error::{QueryError, QueryResult};

/// An immutable dotted metric path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricPath {
    segments: Vec<String>,
}

impl MetricPath {
    /// Parse a dotted path, rejecting empty segments
    pub fn parse(path: &str) -> QueryResult<Self> {
        let segments = split_segments(path).ok_or_else(|| QueryError::InvalidPath(path.to_string()))?;
        Ok(Self { segments })
    }

    /// Build a path from segments that are already known to be valid
    pub(crate) fn from_segments(segments: Vec<String>) -> Self {
        debug_assert!(!segments.is_empty());
        Self { segments }
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Final segment
    pub fn last(&self) -> &str {
        // Paths are never empty
        &self.segments[self.segments.len() - 1]
    }

    /// The first `depth` segments (the whole path if it is shorter)
    pub fn prefix(&self, depth: usize) -> MetricPath {
        let depth = depth.clamp(1, self.segments.len());
        Self::from_segments(self.segments[..depth].to_vec())
    }

    /// Path without its last segment, `None` for single-segment paths
    pub fn parent(&self) -> Option<MetricPath> {
        if self.segments.len() > 1 {
            Some(self.prefix(self.segments.len() - 1))
        } else {
            None
        }
    }

    /// Path extended by one segment
    pub fn child(&self, segment: impl Into<String>) -> MetricPath {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::from_segments(segments)
    }

    /// Length of the dotted form in bytes
    pub fn serialized_len(&self) -> usize {
        self.segments.iter().map(String::len).sum::<usize>() + self.segments.len() - 1
    }
}

impl fmt::Display for MetricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for MetricPath {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn split_segments(path: &str) -> Option<Vec<String>> {
    if path.is_empty() {
        return None;
    }
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return None;
    }
    Some(segments)
}

/// One compiled pattern segment
#[derive(Debug, Clone)]
enum SegmentMatcher {
    /// `*` on its own
    Any,
    /// No wildcard characters
    Literal(String),
    /// Anything else, compiled to an anchored regex
    Wildcard(Regex),
}

impl SegmentMatcher {
    fn compile(segment: &str) -> QueryResult<Self> {
        if segment == "*" {
            return Ok(SegmentMatcher::Any);
        }
        if !segment.contains(['*', '?', '[', '{']) {
            return Ok(SegmentMatcher::Literal(segment.to_string()));
        }
        let regex = Regex::new(&glob_to_regex(segment)?)
            .map_err(|e| QueryError::InvalidPattern(format!("{}: {}", segment, e)))?;
        Ok(SegmentMatcher::Wildcard(regex))
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            SegmentMatcher::Any => true,
            SegmentMatcher::Literal(literal) => literal == segment,
            SegmentMatcher::Wildcard(regex) => regex.is_match(segment),
        }
    }
}

/// Translate a single glob segment into an anchored regex
fn glob_to_regex(segment: &str) -> QueryResult<String> {
    let mut out = String::from("^");
    let mut chars = segment.chars().peekable();
    let mut in_alternation = false;

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^.]*"),
            '?' => out.push_str("[^.]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' || c == '[' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                if !closed {
                    return Err(QueryError::InvalidPattern(format!(
                        "unclosed character class in {}",
                        segment
                    )));
                }
                out.push(']');
            }
            '{' if !in_alternation => {
                in_alternation = true;
                out.push_str("(?:");
            }
            ',' if in_alternation => out.push('|'),
            '}' if in_alternation => {
                in_alternation = false;
                out.push(')');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    if in_alternation {
        return Err(QueryError::InvalidPattern(format!(
            "unclosed alternation in {}",
            segment
        )));
    }
    out.push('$');
    Ok(out)
}

/// A compiled dotted glob query
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: Vec<String>,
    matchers: Vec<SegmentMatcher>,
}

impl GlobPattern {
    /// Compile a dotted glob
    pub fn parse(pattern: &str) -> QueryResult<Self> {
        let raw = split_segments(pattern)
            .ok_or_else(|| QueryError::InvalidPattern(pattern.to_string()))?;
        let matchers = raw
            .iter()
            .map(|s| SegmentMatcher::compile(s))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self { raw, matchers })
    }

    /// Nominal query depth
    pub fn depth(&self) -> usize {
        self.raw.len()
    }

    /// Raw text of the final segment
    pub fn last_segment(&self) -> &str {
        &self.raw[self.raw.len() - 1]
    }

    /// Whether the final segment contains no wildcard
    pub fn last_is_literal(&self) -> bool {
        matches!(self.matchers[self.matchers.len() - 1], SegmentMatcher::Literal(_))
    }

    /// Whether segment `index` of the pattern accepts `segment`
    pub fn segment_matches(&self, index: usize, segment: &str) -> bool {
        self.matchers
            .get(index)
            .map(|m| m.matches(segment))
            .unwrap_or(false)
    }

    /// Whether the final segment of the pattern accepts `segment`
    pub fn last_matches(&self, segment: &str) -> bool {
        self.segment_matches(self.depth() - 1, segment)
    }

    /// Exact-depth match
    pub fn matches(&self, path: &MetricPath) -> bool {
        path.depth() == self.depth() && self.matches_prefix(path)
    }

    /// Whether the first `depth()` segments of `path` match; `path` may be deeper
    pub fn matches_prefix(&self, path: &MetricPath) -> bool {
        path.depth() >= self.depth()
            && self
                .matchers
                .iter()
                .zip(path.segments())
                .all(|(m, s)| m.matches(s))
    }

    /// Pattern with the last `n` segments removed, `None` if nothing would remain
    pub fn ancestor(&self, n: usize) -> Option<GlobPattern> {
        if n >= self.depth() {
            return None;
        }
        let keep = self.depth() - n;
        Some(Self {
            raw: self.raw[..keep].to_vec(),
            matchers: self.matchers[..keep].to_vec(),
        })
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw.join("."))
    }
}
