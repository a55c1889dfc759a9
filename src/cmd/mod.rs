pub(crate) mod deploy;
pub(crate) mod extract;
mod glob_util;
pub(crate) mod preprocess;
mod schema;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sql-deployer")]
#[command(version)]
#[command(about = "Deploy MySQL dump files as ordered, idempotent statement batches", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy dump files in order, rewriting schemas for clean redeployment
    Deploy {
        /// Input SQL file or glob pattern (e.g., *.sql, dumps/**/*.sql)
        /// Supports .gz, .bz2, .xz, .zst compression
        #[arg(required_unless_present = "config")]
        file: Option<PathBuf>,

        /// Write the deployment script to this file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// YAML manifest with the file list and tuning overrides
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Read chunk size in bytes for streaming mode
        #[arg(long)]
        chunk_size: Option<usize>,

        /// File size in bytes above which deployment streams
        #[arg(long)]
        streaming_threshold: Option<u64>,

        /// Plan the deployment without writing a script
        #[arg(long)]
        dry_run: bool,

        /// Stop on the first file that fails
        #[arg(long)]
        fail_fast: bool,

        /// Show progress during deployment
        #[arg(short, long)]
        progress: bool,

        /// Output results as JSON instead of human-readable text
        #[arg(long)]
        json: bool,

        /// List rewritten tables per file
        #[arg(short, long)]
        verbose: bool,
    },

    /// Extract executable statements from a dump, dropping client artifacts
    Extract {
        /// Input SQL file or glob pattern (e.g., *.sql, dumps/**/*.sql)
        /// Supports .gz, .bz2, .xz, .zst compression
        file: PathBuf,

        /// Output SQL file or directory (default: stdout for single file, required for glob)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read chunk size in bytes
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Show progress during extraction
        #[arg(short, long)]
        progress: bool,

        /// Output results as JSON instead of human-readable text
        #[arg(long)]
        json: bool,

        /// Stop on first file that fails (for glob patterns)
        #[arg(long)]
        fail_fast: bool,
    },

    /// Rewrite a dump into an idempotent redeployment script
    Preprocess {
        /// Input SQL file or glob pattern (e.g., *.sql, dumps/**/*.sql)
        /// Supports .gz, .bz2, .xz, .zst compression
        file: PathBuf,

        /// Output SQL file or directory (default: stdout for single file, required for glob)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output results as JSON instead of human-readable text
        #[arg(long)]
        json: bool,

        /// Stop on first file that fails (for glob patterns)
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print JSON schemas for --json command output
    Schema {
        /// Command to print the schema for (default: all)
        name: Option<String>,

        /// List available schema names
        #[arg(long)]
        list: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Deploy {
            file,
            output,
            config,
            chunk_size,
            streaming_threshold,
            dry_run,
            fail_fast,
            progress,
            json,
            verbose,
        } => deploy::run(
            file,
            output,
            config,
            chunk_size,
            streaming_threshold,
            dry_run,
            fail_fast,
            progress,
            json,
            verbose,
        ),
        Commands::Extract {
            file,
            output,
            chunk_size,
            progress,
            json,
            fail_fast,
        } => extract::run(file, output, chunk_size, progress, json, fail_fast),
        Commands::Preprocess {
            file,
            output,
            json,
            fail_fast,
        } => preprocess::run(file, output, json, fail_fast),
        Commands::Schema { name, list } => schema::run(name, list),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "sql-deployer",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}
