use crate::classifier::SkipStats;
use crate::input::Compression;
use crate::parser::stream::{StatementStream, DEFAULT_CHUNK_SIZE};
use crate::progress::ProgressReader;
use indicatif::{ProgressBar, ProgressStyle};
use schemars::JsonSchema;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use super::glob_util::{expand_file_pattern, MultiFileResult};

/// JSON output for single file extract
#[derive(Serialize, JsonSchema)]
pub(crate) struct ExtractJsonOutput {
    input_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<String>,
    statistics: ExtractStatistics,
    skipped: SkipStats,
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct ExtractStatistics {
    statements_extracted: u64,
    statements_skipped: u64,
    bytes_read: u64,
    elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    throughput_mb_per_sec: Option<f64>,
}

/// JSON output for multi-file extract
#[derive(Serialize, JsonSchema)]
pub(crate) struct MultiExtractJsonOutput {
    total_files: usize,
    succeeded: usize,
    failed: usize,
    elapsed_secs: f64,
    results: Vec<ExtractFileResult>,
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct ExtractFileResult {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statements_extracted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statements_skipped: Option<u64>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(
    file: PathBuf,
    output: Option<PathBuf>,
    chunk_size: Option<usize>,
    progress: bool,
    json: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let expanded = expand_file_pattern(&file)?;
    let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);

    if expanded.files.len() == 1 {
        run_single(
            expanded.files.into_iter().next().unwrap(),
            output,
            chunk_size,
            progress,
            json,
        )
    } else {
        run_multi(expanded.files, output, chunk_size, progress, json, fail_fast)
    }
}

fn run_single(
    file: PathBuf,
    output: Option<PathBuf>,
    chunk_size: usize,
    progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("input file does not exist: {}", file.display());
    }
    if json && output.is_none() {
        anyhow::bail!(
            "--json would interleave with the extracted statements on stdout; pass --output"
        );
    }

    let file_size = fs::metadata(&file)?.len();
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);
    let compression = Compression::from_path(&file);

    if !json {
        if compression != Compression::None {
            eprintln!("Detected compression: {}", compression);
        }
        eprintln!(
            "Extracting statements: {} ({:.2} MB)",
            file.display(),
            file_size_mb
        );
        eprintln!();
    }

    let start_time = Instant::now();

    let pb = if progress && !json {
        let pb = ProgressBar::new(file_size);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("█▓▒░  ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let file_handle = File::open(&file)?;
    let reader: Box<dyn Read> = match &pb {
        Some(pb) => {
            let pb_clone = pb.clone();
            let progress_reader = ProgressReader::new(file_handle, move |bytes| {
                pb_clone.set_position(bytes);
            });
            compression.wrap_reader(Box::new(progress_reader))?
        }
        None => compression.wrap_reader(Box::new(file_handle))?,
    };

    let (extracted, skipped, bytes_read) = match &output {
        Some(out_path) => {
            if let Some(parent) = out_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let out_file = File::create(out_path)?;
            extract_to(reader, chunk_size, BufWriter::with_capacity(256 * 1024, out_file))?
        }
        None => {
            let stdout = io::stdout();
            extract_to(reader, chunk_size, BufWriter::new(stdout.lock()))?
        }
    };

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let elapsed = start_time.elapsed();

    if json {
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            Some(bytes_read as f64 / (1024.0 * 1024.0) / elapsed.as_secs_f64())
        } else {
            None
        };
        let output_json = ExtractJsonOutput {
            input_file: file.display().to_string(),
            output: output.map(|p| p.display().to_string()),
            compression: if compression != Compression::None {
                Some(compression.to_string())
            } else {
                None
            },
            statistics: ExtractStatistics {
                statements_extracted: extracted,
                statements_skipped: skipped.total(),
                bytes_read,
                elapsed_secs: elapsed.as_secs_f64(),
                throughput_mb_per_sec: throughput,
            },
            skipped,
        };
        println!("{}", serde_json::to_string_pretty(&output_json)?);
    } else {
        eprintln!("✓ Extraction completed!");
        eprintln!();
        eprintln!("Statistics:");
        eprintln!("  Statements extracted: {}", extracted);
        eprintln!("  Artifacts skipped: {}", skipped.total());
        eprintln!("    Empty: {}", skipped.empty);
        eprintln!("    Comment-only: {}", skipped.comments);
        eprintln!("    USE statements: {}", skipped.use_statements);
        eprintln!("    Conditional comments: {}", skipped.conditional_comments);
        eprintln!("    Session restores: {}", skipped.session_restores);
        eprintln!(
            "  Bytes read: {:.2} MB",
            bytes_read as f64 / (1024.0 * 1024.0)
        );
        eprintln!("  Elapsed time: {:.3?}", elapsed);

        if elapsed.as_secs_f64() > 0.0 {
            let throughput = bytes_read as f64 / (1024.0 * 1024.0) / elapsed.as_secs_f64();
            eprintln!("  Throughput: {:.2} MB/s", throughput);
        }
    }

    Ok(())
}

fn run_multi(
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    chunk_size: usize,
    progress: bool,
    json: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let Some(output_dir) = output else {
        anyhow::bail!("--output directory is required when extracting multiple files");
    };
    fs::create_dir_all(&output_dir)?;

    let total = files.len();
    let mut result = MultiFileResult::new();
    result.total_files = total;

    if !json {
        eprintln!("Extracting {} files...\n", total);
    }

    let start_time = Instant::now();
    let mut json_results: Vec<ExtractFileResult> = Vec::new();

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

        let file_size = match fs::metadata(file) {
            Ok(m) => m.len(),
            Err(e) => {
                if !json {
                    eprintln!("  Error: {}\n", e);
                }
                json_results.push(ExtractFileResult {
                    file: file.display().to_string(),
                    size_bytes: None,
                    output: None,
                    statements_extracted: None,
                    statements_skipped: None,
                    status: "failed".to_string(),
                    error: Some(e.to_string()),
                });
                result.record_failure(file.clone(), e.to_string());
                if fail_fast {
                    break;
                }
                continue;
            }
        };
        let file_size_mb = file_size as f64 / (1024.0 * 1024.0);

        if !json {
            eprintln!("  Size: {:.2} MB | Output: {}", file_size_mb, out_path.display());
        }

        let extract_result = extract_one(file, &out_path, chunk_size, file_size, progress && !json);

        match extract_result {
            Ok((extracted, skipped)) => {
                if !json {
                    eprintln!(
                        "  Statements: {} | Skipped: {} | ✓\n",
                        extracted,
                        skipped.total()
                    );
                }
                json_results.push(ExtractFileResult {
                    file: file.display().to_string(),
                    size_bytes: Some(file_size),
                    output: Some(out_path.display().to_string()),
                    statements_extracted: Some(extracted),
                    statements_skipped: Some(skipped.total()),
                    status: "success".to_string(),
                    error: None,
                });
                result.record_success();
            }
            Err(e) => {
                if !json {
                    eprintln!("  Error: {}\n", e);
                }
                json_results.push(ExtractFileResult {
                    file: file.display().to_string(),
                    size_bytes: Some(file_size),
                    output: None,
                    statements_extracted: None,
                    statements_skipped: None,
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
        let output_json = MultiExtractJsonOutput {
            total_files: total,
            succeeded: result.succeeded,
            failed: result.failed,
            elapsed_secs: elapsed.as_secs_f64(),
            results: json_results,
        };
        println!("{}", serde_json::to_string_pretty(&output_json)?);
    } else {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Extraction Summary:");
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

fn extract_one(
    file: &PathBuf,
    out_path: &PathBuf,
    chunk_size: usize,
    file_size: u64,
    progress: bool,
) -> anyhow::Result<(u64, SkipStats)> {
    let compression = Compression::from_path(file);
    let file_handle = File::open(file)?;

    let pb = if progress {
        let pb = ProgressBar::new(file_size);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.green} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({percent}%)",
            )
            .unwrap()
            .progress_chars("█▓▒░  "),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let reader: Box<dyn Read> = match &pb {
        Some(pb) => {
            let pb_clone = pb.clone();
            let progress_reader = ProgressReader::new(file_handle, move |bytes| {
                pb_clone.set_position(bytes);
            });
            compression.wrap_reader(Box::new(progress_reader))?
        }
        None => compression.wrap_reader(Box::new(file_handle))?,
    };

    let out_file = File::create(out_path)?;
    let (extracted, skipped, _) = extract_to(
        reader,
        chunk_size,
        BufWriter::with_capacity(256 * 1024, out_file),
    )?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    Ok((extracted, skipped))
}

/// Stream executable statements from `reader` into `writer`, one per line
/// group, terminators restored.
fn extract_to<W: Write>(
    reader: Box<dyn Read>,
    chunk_size: usize,
    mut writer: W,
) -> anyhow::Result<(u64, SkipStats, u64)> {
    let mut stream = StatementStream::with_chunk_size(reader, chunk_size);
    let mut extracted = 0u64;

    while let Some(stmt) = stream.next_executable()? {
        writeln!(writer, "{};", stmt)?;
        extracted += 1;
    }
    writer.flush()?;

    Ok((extracted, stream.skip_stats(), stream.bytes_read()))
}
