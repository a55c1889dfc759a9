use crate::deployer::config::DeployManifest;
use crate::deployer::executor::{NullExecutor, ScriptExecutor};
use crate::deployer::{
    DeployStatus, Deployer, FailureDetail, FileReport, StatementExecutor, STREAMING_THRESHOLD,
};
use crate::input::Compression;
use crate::parser::stream::DEFAULT_CHUNK_SIZE;
use crate::rewriter::{FK_CHECKS_DISABLE, FK_CHECKS_ENABLE};
use indicatif::{ProgressBar, ProgressStyle};
use schemars::JsonSchema;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::glob_util::{expand_file_pattern, MultiFileResult};

/// JSON output for single file deploy
#[derive(Serialize, JsonSchema)]
pub(crate) struct DeployJsonOutput {
    input_file: String,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<String>,
    mode: String,
    dry_run: bool,
    statements_executed: u64,
    tables: Vec<String>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureDetail>,
    elapsed_secs: f64,
}

/// JSON output for multi-file deploy
#[derive(Serialize, JsonSchema)]
pub(crate) struct MultiDeployJsonOutput {
    total_files: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    dry_run: bool,
    elapsed_secs: f64,
    results: Vec<DeployFileResult>,
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct DeployFileResult {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statements_executed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tables: Option<Vec<String>>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureDetail>,
}

impl DeployFileResult {
    fn skipped(file: &Path, error: String) -> Self {
        Self {
            file: file.display().to_string(),
            size_bytes: None,
            mode: None,
            statements_executed: None,
            tables: None,
            status: "skipped".to_string(),
            error: Some(error),
            failure: None,
        }
    }

    fn failed_early(file: &Path, size_bytes: u64, error: String) -> Self {
        Self {
            file: file.display().to_string(),
            size_bytes: Some(size_bytes),
            mode: None,
            statements_executed: None,
            tables: None,
            status: "failed".to_string(),
            error: Some(error),
            failure: None,
        }
    }

    fn from_report(report: &FileReport) -> Self {
        let (status, failure) = match &report.status {
            DeployStatus::Success => ("success".to_string(), None),
            DeployStatus::Failed(detail) => ("failed".to_string(), Some(detail.clone())),
        };
        Self {
            file: report.file.clone(),
            size_bytes: Some(report.size_bytes),
            mode: Some(report.mode.to_string()),
            statements_executed: Some(report.statements_executed),
            tables: Some(report.tables.clone()),
            status,
            error: failure.as_ref().map(|f| f.error.clone()),
            failure,
        }
    }
}

/// Resolved settings after merging CLI flags, manifest values and defaults.
struct EffectiveOptions {
    chunk_size: usize,
    streaming_threshold: u64,
    fk_disable: String,
    fk_enable: String,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    file: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    chunk_size: Option<usize>,
    streaming_threshold: Option<u64>,
    dry_run: bool,
    fail_fast: bool,
    progress: bool,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let manifest = match &config {
        Some(path) => Some(DeployManifest::load(path)?),
        None => None,
    };

    // Manifest files deploy first, in manifest order; a CLI file or glob
    // appends after them.
    let mut files: Vec<PathBuf> = manifest
        .as_ref()
        .map(|m| m.files.clone())
        .unwrap_or_default();
    if let Some(pattern) = file {
        files.extend(expand_file_pattern(&pattern)?.files);
    }
    if files.is_empty() {
        anyhow::bail!("no input files: pass a file or a --config manifest with a files list");
    }

    if json && !dry_run && output.is_none() {
        anyhow::bail!(
            "--json would interleave with the script on stdout; pass --output or --dry-run"
        );
    }

    let opts = EffectiveOptions {
        chunk_size: chunk_size
            .or(manifest.as_ref().and_then(|m| m.chunk_size))
            .unwrap_or(DEFAULT_CHUNK_SIZE),
        streaming_threshold: streaming_threshold
            .or(manifest.as_ref().and_then(|m| m.streaming_threshold))
            .unwrap_or(STREAMING_THRESHOLD),
        fk_disable: manifest
            .as_ref()
            .and_then(|m| m.fk_disable.clone())
            .unwrap_or_else(|| FK_CHECKS_DISABLE.to_string()),
        fk_enable: manifest
            .as_ref()
            .and_then(|m| m.fk_enable.clone())
            .unwrap_or_else(|| FK_CHECKS_ENABLE.to_string()),
    };

    if dry_run {
        let mut executor = NullExecutor::default();
        run_deploy(
            &mut executor,
            |_, _| Ok(()),
            &files,
            &opts,
            dry_run,
            fail_fast,
            progress,
            json,
            verbose,
        )
    } else if let Some(out_path) = output {
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let out_file = File::create(&out_path)?;
        let mut executor = ScriptExecutor::new(BufWriter::with_capacity(256 * 1024, out_file));
        executor.write_header(files.len())?;
        let result = run_deploy(
            &mut executor,
            |e, src| {
                e.write_file_banner(src)?;
                Ok(())
            },
            &files,
            &opts,
            dry_run,
            fail_fast,
            progress,
            json,
            verbose,
        );
        executor.finish()?;
        result
    } else {
        let stdout = io::stdout();
        let mut executor = ScriptExecutor::new(BufWriter::new(stdout.lock()));
        executor.write_header(files.len())?;
        let result = run_deploy(
            &mut executor,
            |e, src| {
                e.write_file_banner(src)?;
                Ok(())
            },
            &files,
            &opts,
            dry_run,
            fail_fast,
            progress,
            json,
            verbose,
        );
        executor.finish()?;
        result
    }
}

/// Deploy every file in order through the given executor. Human-readable
/// reporting goes to stderr because stdout may carry the script.
#[allow(clippy::too_many_arguments)]
fn run_deploy<E: StatementExecutor>(
    executor: &mut E,
    mut banner: impl FnMut(&mut E, &str) -> anyhow::Result<()>,
    files: &[PathBuf],
    opts: &EffectiveOptions,
    dry_run: bool,
    fail_fast: bool,
    progress: bool,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let total = files.len();
    let mut result = MultiFileResult::new();
    result.total_files = total;

    if !json && total > 1 {
        eprintln!(
            "{} {} files...\n",
            if dry_run { "Planning" } else { "Deploying" },
            total
        );
    }

    let start_time = Instant::now();
    let mut json_results: Vec<DeployFileResult> = Vec::new();
    let mut single_output: Option<DeployJsonOutput> = None;

    for (idx, file) in files.iter().enumerate() {
        if !json && total > 1 {
            eprintln!(
                "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n[{}/{}] {}",
                idx + 1,
                total,
                file.display()
            );
        }

        // A listed file that is gone is skipped with a warning so the rest
        // of the batch still deploys.
        let file_size = match fs::metadata(file) {
            Ok(m) => m.len(),
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", file.display(), e);
                json_results.push(DeployFileResult::skipped(file, e.to_string()));
                result.record_skip();
                continue;
            }
        };
        let file_size_mb = file_size as f64 / (1024.0 * 1024.0);
        let compression = Compression::from_path(file);

        if !json {
            if total == 1 {
                if compression != Compression::None {
                    eprintln!("Detected compression: {}", compression);
                }
                eprintln!(
                    "{} SQL file: {} ({:.2} MB)",
                    if dry_run { "Planning" } else { "Deploying" },
                    file.display(),
                    file_size_mb
                );
                eprintln!();
            } else {
                eprintln!("  Size: {:.2} MB", file_size_mb);
            }
        }

        banner(&mut *executor, &file.display().to_string())?;

        match deploy_one(&mut *executor, file, file_size, opts, progress && !json) {
            Ok(report) => {
                report_outcome(&report, total, verbose, dry_run, json);
                let failed = !report.status.is_success();
                if failed {
                    let error = match &report.status {
                        DeployStatus::Failed(detail) => detail.error.clone(),
                        DeployStatus::Success => String::new(),
                    };
                    result.record_failure(file.clone(), error);
                } else {
                    result.record_success();
                }
                if json && total == 1 {
                    single_output = Some(single_json(&report, compression, dry_run, &start_time));
                }
                json_results.push(DeployFileResult::from_report(&report));
                if failed && fail_fast {
                    break;
                }
            }
            Err(e) => {
                if !json {
                    eprintln!("  Error: {}\n", e);
                }
                json_results.push(DeployFileResult::failed_early(file, file_size, e.to_string()));
                result.record_failure(file.clone(), e.to_string());
                if fail_fast {
                    break;
                }
            }
        }
    }

    let elapsed = start_time.elapsed();

    if json {
        if total == 1 {
            match single_output {
                Some(out) => println!("{}", serde_json::to_string_pretty(&out)?),
                // The single file was skipped or failed before deployment.
                None => {
                    let out = MultiDeployJsonOutput {
                        total_files: total,
                        succeeded: result.succeeded,
                        failed: result.failed,
                        skipped: result.skipped,
                        dry_run,
                        elapsed_secs: elapsed.as_secs_f64(),
                        results: json_results,
                    };
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        } else {
            let out = MultiDeployJsonOutput {
                total_files: total,
                succeeded: result.succeeded,
                failed: result.failed,
                skipped: result.skipped,
                dry_run,
                elapsed_secs: elapsed.as_secs_f64(),
                results: json_results,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    } else if total > 1 {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Deployment Summary:");
        eprintln!("  Total files: {}", total);
        eprintln!("  Succeeded: {}", result.succeeded);
        eprintln!("  Failed: {}", result.failed);
        eprintln!("  Skipped: {}", result.skipped);
        eprintln!("  Time: {:.3?}", elapsed);

        if result.has_failures() {
            eprintln!();
            eprintln!("Failed files:");
            for (path, error) in &result.errors {
                eprintln!("  - {}: {}", path.display(), error);
            }
        }
    } else {
        eprintln!("  Elapsed time: {:.3?}", elapsed);
    }

    if result.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn deploy_one<E: StatementExecutor>(
    executor: &mut E,
    file: &Path,
    file_size: u64,
    opts: &EffectiveOptions,
    progress: bool,
) -> anyhow::Result<FileReport> {
    let mut deployer = Deployer::new(&mut *executor)
        .with_chunk_size(opts.chunk_size)
        .with_streaming_threshold(opts.streaming_threshold)
        .with_fk_toggles(opts.fk_disable.clone(), opts.fk_enable.clone());

    if progress {
        let pb = ProgressBar::new(file_size);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.green} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({percent}%)",
            )
            .unwrap()
            .progress_chars("█▓▒░  "),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let pb_clone = pb.clone();
        deployer = deployer.with_progress(move |bytes| {
            pb_clone.set_position(bytes);
        });

        let report = deployer.deploy_file(file);
        pb.finish_and_clear();
        report
    } else {
        deployer.deploy_file(file)
    }
}

fn report_outcome(report: &FileReport, total: usize, verbose: bool, dry_run: bool, json: bool) {
    if json {
        return;
    }

    match &report.status {
        DeployStatus::Success => {
            if total == 1 {
                if dry_run {
                    eprintln!("✓ Dry run completed!");
                } else {
                    eprintln!("✓ Deployment completed successfully!");
                }
                eprintln!();
                eprintln!("Statistics:");
                eprintln!("  Mode: {}", report.mode);
                eprintln!("  Statements executed: {}", report.statements_executed);
                eprintln!("  Tables rewritten: {}", report.tables.len());
            } else {
                eprintln!(
                    "  Mode: {} | Statements: {} | {}\n",
                    report.mode,
                    report.statements_executed,
                    if dry_run { "(dry run)" } else { "✓" }
                );
            }
            if verbose && !report.tables.is_empty() {
                if total == 1 {
                    eprintln!("  Tables:");
                }
                for name in &report.tables {
                    eprintln!("    - {}", name);
                }
                if total > 1 {
                    eprintln!();
                }
            }
        }
        DeployStatus::Failed(detail) => {
            eprintln!(
                "  ✗ Failed at statement {}: {}",
                detail.statement_index, detail.error
            );
            eprintln!("    Statement: {}", detail.statement);
            if total > 1 {
                eprintln!();
            }
        }
    }
}

fn single_json(
    report: &FileReport,
    compression: Compression,
    dry_run: bool,
    start_time: &Instant,
) -> DeployJsonOutput {
    let (status, failure) = match &report.status {
        DeployStatus::Success => ("success".to_string(), None),
        DeployStatus::Failed(detail) => ("failed".to_string(), Some(detail.clone())),
    };
    DeployJsonOutput {
        input_file: report.file.clone(),
        size_bytes: report.size_bytes,
        compression: if compression != Compression::None {
            Some(compression.to_string())
        } else {
            None
        },
        mode: report.mode.to_string(),
        dry_run,
        statements_executed: report.statements_executed,
        tables: report.tables.clone(),
        status,
        failure,
        elapsed_secs: start_time.elapsed().as_secs_f64(),
    }
}
