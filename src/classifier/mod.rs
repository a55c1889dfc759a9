//! Statement classification for dump ingestion.
//!
//! Dump tools interleave real DDL/DML with session artifacts (USE, conditional
//! comments, session-variable restores) that must not reach the target
//! database. The classifier decides per statement, on the text with leading
//! comment lines removed; accepted statements are passed through unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::Serialize;

/// Why a statement was withheld from execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing but whitespace.
    Empty,
    /// Only `--` comment lines.
    Comment,
    /// USE statement; the target schema is fixed by the connection.
    Use,
    /// `/*!` or `/*M!` versioned conditional comment emitted by dump tools.
    ConditionalComment,
    /// `SET ... @OLD_...` session-variable save/restore pair member.
    SessionRestore,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Empty => write!(f, "empty"),
            SkipReason::Comment => write!(f, "comment"),
            SkipReason::Use => write!(f, "USE statement"),
            SkipReason::ConditionalComment => write!(f, "conditional comment"),
            SkipReason::SessionRestore => write!(f, "session variable restore"),
        }
    }
}

/// Regex for restoring a saved session variable: SET FOO = @OLD_FOO.
static SET_FROM_OLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^SET\s+.*=\s*@OLD_").unwrap());

/// Regex for saving a session variable: SET @OLD_FOO = @@FOO.
static SET_OLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^SET\s+@OLD_").unwrap());

/// Drop leading full-line `--` comments, returning the first non-comment
/// text (trimmed at the front). Returns an empty slice when the statement
/// is comments all the way down.
pub fn strip_leading_comment_lines(stmt: &str) -> &str {
    let mut body = stmt.trim_start();

    while body.starts_with("--") {
        match body.find('\n') {
            Some(pos) => body = body[pos + 1..].trim_start(),
            None => return "",
        }
    }

    body
}

/// Decide whether a statement is a dump artifact, and which kind.
/// `None` means the statement should execute.
pub fn classify(stmt: &str) -> Option<SkipReason> {
    let trimmed = stmt.trim();
    if trimmed.is_empty() {
        return Some(SkipReason::Empty);
    }

    let body = strip_leading_comment_lines(trimmed);
    if body.is_empty() {
        return Some(SkipReason::Comment);
    }

    let bytes = body.as_bytes();
    if bytes.len() >= 4 && bytes[..4].eq_ignore_ascii_case(b"use ") {
        return Some(SkipReason::Use);
    }

    if body.starts_with("/*!") || body.starts_with("/*M!") {
        return Some(SkipReason::ConditionalComment);
    }

    if SET_FROM_OLD_RE.is_match(body) || SET_OLD_RE.is_match(body) {
        return Some(SkipReason::SessionRestore);
    }

    None
}

/// True when the statement should reach the database.
pub fn should_execute(stmt: &str) -> bool {
    classify(stmt).is_none()
}

/// Per-reason skip counters for extraction reports.
#[derive(Debug, Default, Clone, Copy, Serialize, JsonSchema)]
pub struct SkipStats {
    pub empty: u64,
    pub comments: u64,
    pub use_statements: u64,
    pub conditional_comments: u64,
    pub session_restores: u64,
}

impl SkipStats {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Empty => self.empty += 1,
            SkipReason::Comment => self.comments += 1,
            SkipReason::Use => self.use_statements += 1,
            SkipReason::ConditionalComment => self.conditional_comments += 1,
            SkipReason::SessionRestore => self.session_restores += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.empty
            + self.comments
            + self.use_statements
            + self.conditional_comments
            + self.session_restores
    }
}
