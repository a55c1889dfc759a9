use crate::input::Compression;
use crate::rewriter;
use schemars::JsonSchema;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::glob_util::{expand_file_pattern, MultiFileResult};

/// JSON output for single file preprocess
#[derive(Serialize, JsonSchema)]
pub(crate) struct PreprocessJsonOutput {
    input_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<String>,
    statements: usize,
    tables: Vec<String>,
    views: Vec<String>,
    elapsed_secs: f64,
}

/// JSON output for multi-file preprocess
#[derive(Serialize, JsonSchema)]
pub(crate) struct MultiPreprocessJsonOutput {
    total_files: usize,
    succeeded: usize,
    failed: usize,
    elapsed_secs: f64,
    results: Vec<PreprocessFileResult>,
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct PreprocessFileResult {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statements: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tables: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    views: Option<Vec<String>>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(
    file: PathBuf,
    output: Option<PathBuf>,
    json: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let expanded = expand_file_pattern(&file)?;

    if expanded.files.len() == 1 {
        run_single(expanded.files.into_iter().next().unwrap(), output, json)
    } else {
        run_multi(expanded.files, output, json, fail_fast)
    }
}

fn run_single(file: PathBuf, output: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("input file does not exist: {}", file.display());
    }
    if json && output.is_none() {
        anyhow::bail!("--json would interleave with the script on stdout; pass --output");
    }

    let file_size = fs::metadata(&file)?.len();
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);
    let compression = Compression::from_path(&file);

    if !json {
        if compression != Compression::None {
            eprintln!("Detected compression: {}", compression);
        }
        eprintln!(
            "Preprocessing SQL file: {} ({:.2} MB)",
            file.display(),
            file_size_mb
        );
        eprintln!();
    }

    let start_time = Instant::now();
    let rewritten = preprocess_file(&file)?;
    let script = rewritten.to_script();

    match &output {
        Some(out_path) => {
            if let Some(parent) = out_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(out_path, &script)?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            writer.write_all(script.as_bytes())?;
            writer.flush()?;
        }
    }

    let elapsed = start_time.elapsed();

    if json {
        let output_json = PreprocessJsonOutput {
            input_file: file.display().to_string(),
            output: output.map(|p| p.display().to_string()),
            compression: if compression != Compression::None {
                Some(compression.to_string())
            } else {
                None
            },
            statements: rewritten.statements.len(),
            tables: rewritten.tables,
            views: rewritten.views,
            elapsed_secs: elapsed.as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&output_json)?);
    } else {
        eprintln!("✓ Preprocessing completed!");
        eprintln!();
        eprintln!("Statistics:");
        eprintln!("  Statements written: {}", rewritten.statements.len());
        eprintln!("  Tables rewritten: {}", rewritten.tables.len());
        eprintln!("  Views rewritten: {}", rewritten.views.len());
        eprintln!("  Elapsed time: {:.3?}", elapsed);
    }

    Ok(())
}

fn run_multi(
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    json: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let Some(output_dir) = output else {
        anyhow::bail!("--output directory is required when preprocessing multiple files");
    };
    fs::create_dir_all(&output_dir)?;

    let total = files.len();
    let mut result = MultiFileResult::new();
    result.total_files = total;

    if !json {
        eprintln!("Preprocessing {} files...\n", total);
    }

    let start_time = Instant::now();
    let mut json_results: Vec<PreprocessFileResult> = Vec::new();

    for (idx, file) in files.iter().enumerate() {
        if !json {
            eprintln!(
                "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n[{}/{}] {}",
                idx + 1,
                total,
                file.display()
            );
        }

        let file_stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("file_{}", idx));
        let out_name = if file_stem.ends_with(".sql") {
            file_stem
        } else {
            format!("{}.sql", file_stem)
        };
        let out_path = output_dir.join(out_name);

        match preprocess_file(file).and_then(|rewritten| {
            fs::write(&out_path, rewritten.to_script())?;
            Ok(rewritten)
        }) {
            Ok(rewritten) => {
                if !json {
                    eprintln!(
                        "  Statements: {} | Tables: {} | Views: {} | ✓\n",
                        rewritten.statements.len(),
                        rewritten.tables.len(),
                        rewritten.views.len()
                    );
                }
                json_results.push(PreprocessFileResult {
                    file: file.display().to_string(),
                    output: Some(out_path.display().to_string()),
                    statements: Some(rewritten.statements.len()),
                    tables: Some(rewritten.tables),
                    views: Some(rewritten.views),
                    status: "success".to_string(),
                    error: None,
                });
                result.record_success();
            }
            Err(e) => {
                if !json {
                    eprintln!("  Error: {}\n", e);
                }
                json_results.push(PreprocessFileResult {
                    file: file.display().to_string(),
                    output: None,
                    statements: None,
                    tables: None,
                    views: None,
                    status: "failed".to_string(),
                    error: Some(e.to_string()),
                });
                result.record_failure(file.clone(), e.to_string());
                if fail_fast {
                    break;
                }
            }
        }
    }

    let elapsed = start_time.elapsed();

    if json {
        let output_json = MultiPreprocessJsonOutput {
            total_files: total,
            succeeded: result.succeeded,
            failed: result.failed,
            elapsed_secs: elapsed.as_secs_f64(),
            results: json_results,
        };
        println!("{}", serde_json::to_string_pretty(&output_json)?);
    } else {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Preprocess Summary:");
        eprintln!("  Total files: {}", total);
        eprintln!("  Succeeded: {}", result.succeeded);
        eprintln!("  Failed: {}", result.failed);
        eprintln!("  Time: {:.3?}", elapsed);

        if result.has_failures() {
            eprintln!();
            eprintln!("Failed files:");
            for (path, error) in &result.errors {
                eprintln!("  - {}: {}", path.display(), error);
            }
        }
    }

    if result.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

/// Read a schema dump, decompressing if needed, and rewrite it.
fn preprocess_file(file: &Path) -> anyhow::Result<rewriter::Rewritten> {
    let compression = Compression::from_path(file);
    let file_handle = File::open(file)?;
    let mut reader = compression.wrap_reader(Box::new(file_handle))?;

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let sql = String::from_utf8_lossy(&bytes);

    Ok(rewriter::rewrite(&sql))
}
