//! Executor implementations bundled with the CLI.
//!
//! The deployer itself is collaborator-agnostic; these are the two
//! implementations the command layer wires in. [`ScriptExecutor`] renders
//! the exact statement sequence as a runnable SQL script, which makes the
//! pipeline's output inspectable and replayable. [`NullExecutor`] discards
//! everything and backs `--dry-run`.

use super::StatementExecutor;
use std::io::{self, Write};

/// Writes every received statement to an output in execution order.
pub struct ScriptExecutor<W: Write> {
    writer: W,
    statements_written: u64,
}

impl<W: Write> ScriptExecutor<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            statements_written: 0,
        }
    }

    /// Script preamble in dump-comment style.
    pub fn write_header(&mut self, file_count: usize) -> io::Result<()> {
        writeln!(self.writer, "-- Deployment script")?;
        writeln!(self.writer, "-- Generated by sql-deployer")?;
        writeln!(self.writer, "-- Files: {}", file_count)?;
        writeln!(
            self.writer,
            "-- Date: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(self.writer)
    }

    /// Comment banner marking where one source file's statements begin.
    pub fn write_file_banner(&mut self, source: &str) -> io::Result<()> {
        writeln!(self.writer, "--")?;
        writeln!(self.writer, "-- Source: {}", source)?;
        writeln!(self.writer, "--")
    }

    pub fn statements_written(&self) -> u64 {
        self.statements_written
    }

    /// Flush buffered output. Call once after the last file.
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write> StatementExecutor for ScriptExecutor<W> {
    fn execute(&mut self, sql: &str) -> anyhow::Result<()> {
        writeln!(self.writer, "{};", sql)?;
        self.statements_written += 1;
        Ok(())
    }
}

/// Counts statements and discards them.
#[derive(Debug, Default)]
pub struct NullExecutor {
    pub executed: u64,
}

impl StatementExecutor for NullExecutor {
    fn execute(&mut self, _sql: &str) -> anyhow::Result<()> {
        self.executed += 1;
        Ok(())
    }
}
