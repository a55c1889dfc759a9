pub mod decode;
pub mod stream;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::classifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    CreateView,
    Other,
}

/// Regex to extract the table name from CREATE TABLE.
/// Supports: `table` (backticks), "table" (double quotes), table (unquoted),
/// with an optional IF NOT EXISTS clause.
static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"]?(\w+)[`"]?"#).unwrap()
});

/// Regex to extract the view name from CREATE VIEW, with an optional
/// OR REPLACE clause.
static CREATE_VIEW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^CREATE\s+(?:OR\s+REPLACE\s+)?VIEW\s+[`"]?(\w+)[`"]?"#).unwrap());

/// Find the byte offset of the `;` that terminates the first statement in
/// `sql`, or `None` if no terminator exists outside a string literal.
///
/// Only single quotes delimit strings in dump output. Inside a string both
/// escape conventions are honored at once: a backslash consumes the next
/// character, and a doubled `''` stays inside the string. A `;` inside a
/// string never terminates.
pub fn find_statement_end(sql: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        if in_string {
            match memchr::memchr2(b'\\', b'\'', &bytes[i..]) {
                Some(off) => {
                    let j = i + off;
                    if bytes[j] == b'\\' {
                        // Escape consumes the following byte as well.
                        i = j + 2;
                    } else if bytes.get(j + 1) == Some(&b'\'') {
                        // Doubled quote, still inside the string.
                        i = j + 2;
                    } else {
                        in_string = false;
                        i = j + 1;
                    }
                }
                None => return None,
            }
        } else {
            match memchr::memchr2(b'\'', b';', &bytes[i..]) {
                Some(off) => {
                    let j = i + off;
                    if bytes[j] == b';' {
                        return Some(j);
                    }
                    in_string = true;
                    i = j + 1;
                }
                None => return None,
            }
        }
    }

    None
}

/// Split a complete buffer into trimmed statements, terminators excluded.
///
/// A trailing non-empty remainder without a `;` is kept as the final
/// statement, so a dump whose last statement lost its terminator still
/// deploys in full.
pub fn segment_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut rest = sql;

    while let Some(end) = find_statement_end(rest) {
        let stmt = rest[..end].trim();
        if !stmt.is_empty() {
            statements.push(stmt);
        }
        rest = &rest[end + 1..];
    }

    let tail = rest.trim();
    if !tail.is_empty() {
        statements.push(tail);
    }

    statements
}

/// Whole-buffer extraction: segmentation filtered down to the statements
/// that should reach the database.
pub fn executable_statements(sql: &str) -> Vec<&str> {
    segment_statements(sql)
        .into_iter()
        .filter(|stmt| classifier::should_execute(stmt))
        .collect()
}

/// Classify a statement as CREATE TABLE / CREATE VIEW / other and extract
/// the created identifier. Leading full-line `--` comments are ignored for
/// the decision, so a CREATE glued to its comment banner still classifies.
pub fn statement_kind(stmt: &str) -> (StatementKind, String) {
    let body = classifier::strip_leading_comment_lines(stmt);

    if body.len() < 12 {
        return (StatementKind::Other, String::new());
    }

    let upper_prefix: Vec<u8> = body.bytes().take(8).map(|b| b.to_ascii_uppercase()).collect();
    if !upper_prefix.starts_with(b"CREATE") {
        return (StatementKind::Other, String::new());
    }

    if let Some(caps) = CREATE_TABLE_RE.captures(body) {
        if let Some(m) = caps.get(1) {
            return (StatementKind::CreateTable, m.as_str().to_string());
        }
    }

    if let Some(caps) = CREATE_VIEW_RE.captures(body) {
        if let Some(m) = caps.get(1) {
            return (StatementKind::CreateView, m.as_str().to_string());
        }
    }

    (StatementKind::Other, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_end_simple() {
        assert_eq!(find_statement_end("SELECT 1; SELECT 2;"), Some(8));
    }

    #[test]
    fn test_find_end_no_terminator() {
        assert_eq!(find_statement_end("SELECT 1"), None);
        assert_eq!(find_statement_end(""), None);
    }

    #[test]
    fn test_find_end_semicolon_in_string() {
        let sql = "INSERT INTO t VALUES ('a;b');";
        assert_eq!(find_statement_end(sql), Some(28));
    }

    #[test]
    fn test_find_end_backslash_escaped_quote() {
        let sql = "INSERT INTO t VALUES ('don\\'t; x');";
        assert_eq!(find_statement_end(sql), Some(34));
    }

    #[test]
    fn test_find_end_doubled_quote() {
        let sql = "INSERT INTO t VALUES ('it''s; ok');";
        assert_eq!(find_statement_end(sql), Some(34));
    }

    #[test]
    fn test_find_end_unclosed_string() {
        // The terminator is inside a string that never closes.
        assert_eq!(find_statement_end("INSERT INTO t VALUES ('oops;"), None);
    }

    #[test]
    fn test_find_end_double_quotes_not_strings() {
        // Double quotes quote identifiers, not strings; the first `;` wins.
        let sql = "CREATE TABLE \"a;b\" (id INT);";
        assert_eq!(find_statement_end(sql), Some(15));
    }

    #[test]
    fn test_find_end_trailing_backslash() {
        assert_eq!(find_statement_end("VALUES ('x\\"), None);
    }

    #[test]
    fn test_segment_basic() {
        let stmts = segment_statements("CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);\n");
        assert_eq!(
            stmts,
            vec!["CREATE TABLE t (id INT)", "INSERT INTO t VALUES (1)"]
        );
    }

    #[test]
    fn test_segment_trailing_unterminated() {
        let stmts = segment_statements("SELECT 1;\nSELECT 2");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_segment_skips_blank_segments() {
        let stmts = segment_statements(";;\nSELECT 1;\n\n;");
        assert_eq!(stmts, vec!["SELECT 1"]);
    }

    #[test]
    fn test_segment_string_spanning_lines() {
        let sql = "INSERT INTO t VALUES ('line one;\nline two');\nSELECT 1;";
        let stmts = segment_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("line one;\nline two"));
        assert_eq!(stmts[1], "SELECT 1");
    }

    #[test]
    fn test_kind_create_table() {
        let (kind, name) = statement_kind("CREATE TABLE users (id INT)");
        assert_eq!(kind, StatementKind::CreateTable);
        assert_eq!(name, "users");
    }

    #[test]
    fn test_kind_create_table_backticks() {
        let (kind, name) = statement_kind("CREATE TABLE IF NOT EXISTS `logs` (id INT)");
        assert_eq!(kind, StatementKind::CreateTable);
        assert_eq!(name, "logs");
    }

    #[test]
    fn test_kind_create_table_double_quotes() {
        let (kind, name) = statement_kind("CREATE TABLE \"events\" (id INT)");
        assert_eq!(kind, StatementKind::CreateTable);
        assert_eq!(name, "events");
    }

    #[test]
    fn test_kind_create_view() {
        let (kind, name) = statement_kind("CREATE VIEW `v_orders` AS SELECT 1");
        assert_eq!(kind, StatementKind::CreateView);
        assert_eq!(name, "v_orders");
    }

    #[test]
    fn test_kind_create_or_replace_view() {
        let (kind, name) = statement_kind("CREATE OR REPLACE VIEW active_users AS SELECT 1");
        assert_eq!(kind, StatementKind::CreateView);
        assert_eq!(name, "active_users");
    }

    #[test]
    fn test_kind_other() {
        let (kind, name) = statement_kind("INSERT INTO users VALUES (1)");
        assert_eq!(kind, StatementKind::Other);
        assert_eq!(name, "");
    }

    #[test]
    fn test_kind_with_leading_comment_banner() {
        let stmt = "--\n-- Table structure for table `t2`\n--\nCREATE TABLE t2 (id INT)";
        let (kind, name) = statement_kind(stmt);
        assert_eq!(kind, StatementKind::CreateTable);
        assert_eq!(name, "t2");
    }

    #[test]
    fn test_kind_multiple_spaces() {
        let (kind, name) = statement_kind("CREATE  TABLE  spaced (id INT)");
        assert_eq!(kind, StatementKind::CreateTable);
        assert_eq!(name, "spaced");
    }

    #[test]
    fn test_executable_statements_filters_artifacts() {
        let sql = "USE mydb;\nCREATE TABLE t (id INT);\n/*!40101 SET NAMES utf8 */;\nINSERT INTO t VALUES (1);";
        let stmts = executable_statements(sql);
        assert_eq!(
            stmts,
            vec!["CREATE TABLE t (id INT)", "INSERT INTO t VALUES (1)"]
        );
    }
}
