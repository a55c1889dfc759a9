//! Idempotent schema rewriting.
//!
//! Schema dumps are redeployed onto databases that already hold a previous
//! version, so every CREATE TABLE / CREATE VIEW gets a matching
//! `DROP ... IF EXISTS` injected immediately before it, and the whole run is
//! bracketed by FOREIGN_KEY_CHECKS toggles so drop order never trips FK
//! constraints. Injection works on segmented statements, never on raw text,
//! so identifier-like content inside string literals is left alone.

use crate::parser::{self, StatementKind};

/// Toggle statements bracketing a rewritten deployment.
pub const FK_CHECKS_DISABLE: &str = "SET FOREIGN_KEY_CHECKS = 0";
pub const FK_CHECKS_ENABLE: &str = "SET FOREIGN_KEY_CHECKS = 1";

/// Result of rewriting a schema buffer: the payload statement sequence plus
/// the identifiers that received drop injection.
#[derive(Debug, Default)]
pub struct Rewritten {
    pub statements: Vec<String>,
    pub tables: Vec<String>,
    pub views: Vec<String>,
}

impl Rewritten {
    /// Render the payload as runnable SQL text bracketed by the FK toggles,
    /// each statement re-terminated with `;`.
    pub fn to_script(&self) -> String {
        let body: usize = self.statements.iter().map(|s| s.len() + 2).sum();
        let mut out = String::with_capacity(body + 64);

        out.push_str(FK_CHECKS_DISABLE);
        out.push_str(";\n\n");

        for stmt in &self.statements {
            out.push_str(stmt);
            out.push_str(";\n");
        }

        out.push('\n');
        out.push_str(FK_CHECKS_ENABLE);
        out.push_str(";\n");

        out
    }
}

/// Rewrite a complete schema buffer into an idempotent payload sequence.
///
/// Dump artifacts are filtered out, and each surviving CREATE TABLE /
/// CREATE VIEW is preceded by its `DROP ... IF EXISTS`. The FK toggle
/// bracket is not part of the payload; execution drivers emit it separately
/// and [`preprocess`] adds it to the text form.
pub fn rewrite(schema_sql: &str) -> Rewritten {
    let mut rewritten = Rewritten::default();

    for stmt in parser::executable_statements(schema_sql) {
        let (kind, name) = parser::statement_kind(stmt);
        match kind {
            StatementKind::CreateTable => {
                rewritten
                    .statements
                    .push(format!("DROP TABLE IF EXISTS `{name}`"));
                rewritten.tables.push(name);
            }
            StatementKind::CreateView => {
                rewritten
                    .statements
                    .push(format!("DROP VIEW IF EXISTS `{name}`"));
                rewritten.views.push(name);
            }
            StatementKind::Other => {}
        }
        rewritten.statements.push(stmt.to_string());
    }

    rewritten
}

/// Rewrite a schema buffer and render it as runnable SQL text.
pub fn preprocess(schema_sql: &str) -> String {
    rewrite(schema_sql).to_script()
}
