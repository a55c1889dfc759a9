//! Ordered execution of dump files against a statement executor.
//!
//! The deployer runs the full ingestion pipeline for one file at a time:
//! extract statements, filter dump artifacts, rewrite for idempotent
//! redeployment, and hand every surviving statement to the executor in
//! source order. The first executor failure stops the file and is reported
//! with enough context to find the offending statement in the dump.
//!
//! Files at or below the streaming threshold are rewritten whole-buffer;
//! larger (and all compressed) files stream with bounded memory. The
//! streaming path synthesizes DROP TABLE before each CREATE TABLE but does
//! not drop views; redeploying a large dump that contains CREATE VIEW
//! without OR REPLACE can therefore fail, which matches the buffered path's
//! behavior only for tables. The FK toggle bracket is executed in both modes
//! and never counted.

pub mod config;
pub mod executor;

use crate::input::Compression;
use crate::parser::stream::{StatementStream, DEFAULT_CHUNK_SIZE};
use crate::parser::{self, StatementKind};
use crate::progress::ProgressReader;
use crate::rewriter::{self, FK_CHECKS_DISABLE, FK_CHECKS_ENABLE};
use ahash::AHashSet;
use anyhow::Context;
use schemars::JsonSchema;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

/// Files strictly larger than this deploy in streaming mode.
pub const STREAMING_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Character budget for the statement excerpt carried in failure reports.
pub const STATEMENT_PREVIEW_CHARS: usize = 100;

/// The seam to the database collaborator. Implementations receive
/// statements without terminators, in source order, and are expected to
/// apply each one immediately (autocommit semantics are theirs to provide).
pub trait StatementExecutor {
    fn execute(&mut self, sql: &str) -> anyhow::Result<()>;
}

impl<E: StatementExecutor + ?Sized> StatementExecutor for &mut E {
    fn execute(&mut self, sql: &str) -> anyhow::Result<()> {
        (**self).execute(sql)
    }
}

impl<E: StatementExecutor + ?Sized> StatementExecutor for Box<E> {
    fn execute(&mut self, sql: &str) -> anyhow::Result<()> {
        (**self).execute(sql)
    }
}

/// Deployment tuning. All state is explicit; nothing global.
pub struct DeployConfig {
    pub chunk_size: usize,
    pub streaming_threshold: u64,
    pub fk_disable: String,
    pub fk_enable: String,
    pub progress_fn: Option<Rc<dyn Fn(u64)>>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            streaming_threshold: STREAMING_THRESHOLD,
            fk_disable: FK_CHECKS_DISABLE.to_string(),
            fk_enable: FK_CHECKS_ENABLE.to_string(),
            progress_fn: None,
        }
    }
}

/// Which pipeline path handled a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    Buffered,
    Streaming,
}

impl std::fmt::Display for DeployMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployMode::Buffered => write!(f, "buffered"),
            DeployMode::Streaming => write!(f, "streaming"),
        }
    }
}

/// Where the offending statement sat and what it looked like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct FailureDetail {
    /// 0-based ordinal among the counted (payload) statements of the file.
    pub statement_index: u64,
    /// Excerpt of the failing statement, at most
    /// [`STATEMENT_PREVIEW_CHARS`] characters.
    pub statement: String,
    pub error: String,
}

/// Outcome of deploying one file. Failures are values, not unwinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DeployStatus {
    Success,
    Failed(FailureDetail),
}

impl DeployStatus {
    pub fn failed(statement_index: u64, statement: &str, error: anyhow::Error) -> Self {
        DeployStatus::Failed(FailureDetail {
            statement_index,
            statement: statement_preview(statement),
            error: error.to_string(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeployStatus::Success)
    }
}

/// Per-file deployment record.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FileReport {
    pub file: String,
    pub size_bytes: u64,
    pub mode: DeployMode,
    /// Counted payload statements that executed successfully. FK toggles
    /// are executed but never counted.
    pub statements_executed: u64,
    /// Tables that received drop injection, first occurrence order.
    pub tables: Vec<String>,
    pub status: DeployStatus,
}

/// Character-safe excerpt of a statement for failure reports.
pub fn statement_preview(stmt: &str) -> String {
    stmt.chars().take(STATEMENT_PREVIEW_CHARS).collect()
}

/// Drives one file at a time through the pipeline into an executor.
pub struct Deployer<E> {
    executor: E,
    config: DeployConfig,
}

impl<E: StatementExecutor> Deployer<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            config: DeployConfig::default(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_streaming_threshold(mut self, threshold: u64) -> Self {
        self.config.streaming_threshold = threshold;
        self
    }

    pub fn with_fk_toggles(
        mut self,
        disable: impl Into<String>,
        enable: impl Into<String>,
    ) -> Self {
        self.config.fk_disable = disable.into();
        self.config.fk_enable = enable.into();
        self
    }

    pub fn with_progress<F: Fn(u64) + 'static>(mut self, f: F) -> Self {
        self.config.progress_fn = Some(Rc::new(f));
        self
    }

    /// Deploy a file, choosing the mode by on-disk size. Compressed dumps
    /// always stream: their decoded size is unknown up front.
    pub fn deploy_file(&mut self, path: &Path) -> anyhow::Result<FileReport> {
        let size_bytes = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();

        let compression = Compression::from_path(path);
        if compression == Compression::None && size_bytes <= self.config.streaming_threshold {
            self.deploy_buffered(path)
        } else {
            self.deploy_stream(path)
        }
    }

    /// Whole-buffer deployment: read everything, rewrite for idempotent
    /// redeployment, execute the payload inside the FK bracket.
    pub fn deploy_buffered(&mut self, path: &Path) -> anyhow::Result<FileReport> {
        let (bytes, size_bytes) = self.read_input(path)?;
        let sql = String::from_utf8_lossy(&bytes);
        let rewritten = rewriter::rewrite(&sql);

        let mut statements_executed = 0u64;
        let mut status = DeployStatus::Success;

        if let Err(e) = self.executor.execute(&self.config.fk_disable) {
            status = DeployStatus::failed(0, &self.config.fk_disable, e);
        } else {
            for stmt in &rewritten.statements {
                if let Err(e) = self.executor.execute(stmt) {
                    status = DeployStatus::failed(statements_executed, stmt, e);
                    break;
                }
                statements_executed += 1;
            }
            // The enable toggle is not attempted after a failure; the
            // collaborator's session is assumed gone.
            if status.is_success() {
                if let Err(e) = self.executor.execute(&self.config.fk_enable) {
                    status = DeployStatus::failed(statements_executed, &self.config.fk_enable, e);
                }
            }
        }

        let mut seen: AHashSet<&str> = AHashSet::new();
        let mut tables = Vec::new();
        for name in &rewritten.tables {
            if seen.insert(name.as_str()) {
                tables.push(name.clone());
            }
        }

        Ok(FileReport {
            file: path.display().to_string(),
            size_bytes,
            mode: DeployMode::Buffered,
            statements_executed,
            tables,
            status,
        })
    }

    /// Streaming deployment with bounded memory. DROP TABLE IF EXISTS is
    /// synthesized before each CREATE TABLE as it is encountered; views are
    /// not dropped on this path (see module docs).
    pub fn deploy_stream(&mut self, path: &Path) -> anyhow::Result<FileReport> {
        let (reader, size_bytes) = self.open_input(path)?;
        let mut stream = StatementStream::with_chunk_size(reader, self.config.chunk_size);

        let mut statements_executed = 0u64;
        let mut tables_seen: AHashSet<String> = AHashSet::new();
        let mut tables = Vec::new();
        let mut status = DeployStatus::Success;

        if let Err(e) = self.executor.execute(&self.config.fk_disable) {
            status = DeployStatus::failed(0, &self.config.fk_disable, e);
        } else {
            loop {
                let Some(stmt) = stream.next_executable()? else {
                    break;
                };

                let (kind, name) = parser::statement_kind(&stmt);
                if kind == StatementKind::CreateTable {
                    let drop_stmt = format!("DROP TABLE IF EXISTS `{name}`");
                    if let Err(e) = self.executor.execute(&drop_stmt) {
                        status = DeployStatus::failed(statements_executed, &drop_stmt, e);
                        break;
                    }
                    statements_executed += 1;
                    if tables_seen.insert(name.clone()) {
                        tables.push(name);
                    }
                }

                if let Err(e) = self.executor.execute(&stmt) {
                    status = DeployStatus::failed(statements_executed, &stmt, e);
                    break;
                }
                statements_executed += 1;
            }

            if status.is_success() {
                if let Err(e) = self.executor.execute(&self.config.fk_enable) {
                    status = DeployStatus::failed(statements_executed, &self.config.fk_enable, e);
                }
            }
        }

        Ok(FileReport {
            file: path.display().to_string(),
            size_bytes,
            mode: DeployMode::Streaming,
            statements_executed,
            tables,
            status,
        })
    }

    fn open_input(&mut self, path: &Path) -> anyhow::Result<(Box<dyn Read>, u64)> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let size_bytes = file.metadata()?.len();
        let compression = Compression::from_path(path);

        // Clone, not take: the same deployer may open several files and each
        // one gets the callback.
        let reader = if let Some(cb) = self.config.progress_fn.clone() {
            let progress = ProgressReader::new(file, move |bytes| cb(bytes));
            compression.wrap_reader(Box::new(progress))?
        } else {
            compression.wrap_reader(Box::new(file))?
        };

        Ok((reader, size_bytes))
    }

    fn read_input(&mut self, path: &Path) -> anyhow::Result<(Vec<u8>, u64)> {
        let (mut reader, size_bytes) = self.open_input(path)?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok((bytes, size_bytes))
    }
}
