//! Batch processing of many inputs (URLs or company names) from CSV/JSON/text files
//!
//! Supports:
//! - Text or CSV files with one input per line, or a CSV "input"/"url"/"company" column
//! - JSON files with an array of strings, objects with an "input" field, or `{"inputs": [...]}`
//! - Concurrent processing, one `Pipeline` (and so one fetcher session) per input
//! - One JSON output file per input plus a `batch_summary.json`
//! - Error resilience: a failed input is recorded and the batch continues

use anyhow::{bail, Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::export::export_json;
use crate::pipeline::Pipeline;

/// File name of the summary written next to the per-input results
pub const SUMMARY_FILENAME: &str = "batch_summary.json";

/// Column names accepted as the input column of a CSV with headers
const INPUT_COLUMNS: [&str; 3] = ["input", "url", "company"];

/// One input from a batch file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputEntry {
    /// URL or company name handed to `Pipeline::process`
    pub input: String,
    /// Optional label carried into the summary
    #[serde(default)]
    pub label: Option<String>,
}

impl InputEntry {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            label: None,
        }
    }

    pub fn with_label(input: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            label: Some(label.into()),
        }
    }
}

/// Outcome for one input of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputResult {
    pub input: String,
    pub label: Option<String>,
    pub success: bool,
    /// The `error` value of the output record when processing failed
    pub error: Option<String>,
    pub competitor_count: usize,
    /// Path of the per-input JSON file, when it was written
    pub output_file: Option<String>,
    pub duration_secs: f64,
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_inputs: usize,
    pub successful: usize,
    pub failed: usize,
    /// Competitors found across all successful inputs
    pub total_competitors: usize,
    /// Results in input-file order
    pub input_results: Vec<InputResult>,
    pub total_duration_secs: f64,
    pub started_at: String,
    pub completed_at: String,
}

/// Input format for batch files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Csv,
    Json,
    /// Plain list, one input per line
    Text,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("csv") => Some(Self::Csv),
            Some("json") => Some(Self::Json),
            Some("txt") | Some("lst") => Some(Self::Text),
            _ => None,
        }
    }
}

/// Parse an input list from a file (format detected from the extension)
pub fn parse_input_file(path: &Path) -> Result<Vec<InputEntry>> {
    let format = InputFormat::from_path(path).context(format!(
        "Cannot determine input format from file extension. Expected .csv, .json or .txt: {}",
        path.display()
    ))?;

    let content = fs::read_to_string(path)
        .context(format!("Failed to read input file: {}", path.display()))?;

    match format {
        InputFormat::Csv => parse_csv_inputs(&content),
        InputFormat::Json => parse_json_inputs(&content),
        InputFormat::Text => Ok(parse_line_inputs(&content)),
    }
}

/// Parse inputs from CSV content
///
/// Supports two formats:
/// 1. One input per line (no header). Commas are kept, so "Acme, Inc." stays whole.
/// 2. CSV with an "input", "url" or "company" column header (and optional "label" column)
pub fn parse_csv_inputs(content: &str) -> Result<Vec<InputEntry>> {
    let Some(first_line) = content.lines().next() else {
        return Ok(Vec::new());
    };

    let has_header = first_line
        .split(',')
        .any(|field| INPUT_COLUMNS.contains(&field.trim().to_lowercase().as_str()));

    if !has_header {
        return Ok(parse_line_inputs(content));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().context("Failed to read CSV headers")?.clone();

    let input_idx = headers
        .iter()
        .position(|h| INPUT_COLUMNS.contains(&h.trim().to_lowercase().as_str()))
        .context("CSV must have an 'input', 'url' or 'company' column when using headers")?;
    let label_idx = headers.iter().position(|h| h.trim().to_lowercase() == "label");

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to parse CSV record")?;

        let Some(input) = record.get(input_idx).map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };

        let label = label_idx
            .and_then(|idx| record.get(idx))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        entries.push(InputEntry {
            input: input.to_string(),
            label,
        });
    }

    Ok(entries)
}

/// One input per line; blank lines and `#` comments are skipped
pub fn parse_line_inputs(content: &str) -> Vec<InputEntry> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(InputEntry::new)
        .collect()
}

/// Parse inputs from JSON content
///
/// Supports three formats:
/// 1. Array of strings: ["https://example.com/pr", "Acme Bio"]
/// 2. Array of objects with "input" field: [{"input": "Acme Bio", "label": "acme"}]
/// 3. Object with "inputs" array: {"inputs": ["Acme Bio"]}
pub fn parse_json_inputs(content: &str) -> Result<Vec<InputEntry>> {
    let value: serde_json::Value = serde_json::from_str(content).context("Failed to parse JSON content")?;

    let entries = match &value {
        serde_json::Value::Array(arr) => parse_json_array(arr),

        serde_json::Value::Object(obj) => match obj.get("inputs") {
            Some(serde_json::Value::Array(arr)) => parse_json_array(arr),
            Some(_) => bail!("'inputs' field must be an array"),
            None => bail!("JSON object must have an 'inputs' array field"),
        },

        _ => bail!("JSON must be an array of inputs or an object with an 'inputs' field"),
    };

    Ok(entries)
}

fn parse_json_array(arr: &[serde_json::Value]) -> Vec<InputEntry> {
    let mut entries = Vec::new();

    for item in arr {
        match item {
            serde_json::Value::String(input) => {
                let input = input.trim();
                if !input.is_empty() {
                    entries.push(InputEntry::new(input));
                }
            }

            serde_json::Value::Object(obj) => {
                let Some(input) = obj.get("input").and_then(|v| v.as_str()).map(str::trim) else {
                    continue;
                };
                if input.is_empty() {
                    continue;
                }
                let label = obj
                    .get("label")
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());

                entries.push(InputEntry {
                    input: input.to_string(),
                    label,
                });
            }

            _ => {
                // Numbers, nulls and nested arrays are skipped
            }
        }
    }

    entries
}

/// Output file name for the input at `index`: "003_acme_bio.json"
pub fn output_filename(index: usize, input: &str) -> String {
    let mut slug = String::new();
    for c in input.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
        if slug.len() >= 60 {
            break;
        }
    }
    let slug = slug.trim_matches('_');

    if slug.is_empty() {
        format!("{:03}.json", index)
    } else {
        format!("{:03}_{}.json", index, slug)
    }
}

/// Export batch summary to JSON file
pub fn export_batch_summary(summary: &BatchSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize batch summary")?;

    fs::write(output_path, json)
        .context(format!("Failed to write batch summary to: {}", output_path.display()))?;

    Ok(())
}

pub fn new_batch_summary() -> BatchSummary {
    BatchSummary {
        total_inputs: 0,
        successful: 0,
        failed: 0,
        total_competitors: 0,
        input_results: Vec::new(),
        total_duration_secs: 0.0,
        started_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        completed_at: String::new(),
    }
}

/// Finalize a batch summary with end time and totals
pub fn finalize_batch_summary(summary: &mut BatchSummary) {
    summary.completed_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    summary.total_inputs = summary.input_results.len();
    summary.successful = summary.input_results.iter().filter(|r| r.success).count();
    summary.failed = summary.input_results.iter().filter(|r| !r.success).count();
    summary.total_competitors = summary.input_results.iter().map(|r| r.competitor_count).sum();
}

/// Process every entry with a pipeline built from `config`
pub async fn run_batch(
    entries: &[InputEntry],
    config: &AppConfig,
    output_dir: &Path,
    concurrency: usize,
    progress: &ProgressBar,
) -> Result<BatchSummary> {
    let config = config.clone();
    run_batch_with(entries, output_dir, concurrency, progress, move || Pipeline::new(&config)).await
}

/// Process every entry on its own tokio task, building a fresh pipeline per
/// entry with `make_pipeline`.
///
/// At most `concurrency` inputs are in flight at once. Each result is written
/// to `output_dir` as it completes; the summary is written last.
pub async fn run_batch_with<F>(
    entries: &[InputEntry],
    output_dir: &Path,
    concurrency: usize,
    progress: &ProgressBar,
    make_pipeline: F,
) -> Result<BatchSummary>
where
    F: Fn() -> Result<Pipeline> + Send + Sync + 'static,
{
    fs::create_dir_all(output_dir)
        .context(format!("Failed to create output directory: {}", output_dir.display()))?;

    let mut summary = new_batch_summary();
    let batch_start = Instant::now();
    let total = entries.len();

    info!("Starting batch of {} inputs ({} concurrent)", total, concurrency.max(1));

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let make_pipeline = Arc::new(make_pipeline);
    let mut handles = Vec::with_capacity(total);

    for (index, entry) in entries.iter().enumerate() {
        let semaphore = semaphore.clone();
        let make_pipeline = make_pipeline.clone();
        let output_dir = output_dir.to_path_buf();
        let progress = progress.clone();
        let task_entry = entry.clone();

        let handle = tokio::spawn(async move {
            let entry = task_entry;
            let _permit = semaphore.acquire_owned().await.ok();
            let result = process_entry(index, &entry, &output_dir, make_pipeline.as_ref()).await;
            progress.inc(1);
            progress.set_message(entry.input.clone());

            if result.success {
                info!(
                    "[{}/{}] Completed: {} - {} competitors in {:.1}s",
                    index + 1,
                    total,
                    entry.input,
                    result.competitor_count,
                    result.duration_secs
                );
            } else {
                warn!(
                    "[{}/{}] Failed: {} - {}",
                    index + 1,
                    total,
                    entry.input,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            result
        });
        handles.push((entry.clone(), handle));
    }

    // Awaiting in spawn order keeps results in input-file order
    for (entry, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Task for '{}' did not complete: {}", entry.input, e);
                failed_result(&entry, format!("Task did not complete: {}", e), 0.0)
            }
        };
        summary.input_results.push(result);
    }

    summary.total_duration_secs = batch_start.elapsed().as_secs_f64();
    finalize_batch_summary(&mut summary);

    export_batch_summary(&summary, &output_dir.join(SUMMARY_FILENAME))?;
    progress.finish_with_message("done");

    Ok(summary)
}

fn failed_result(entry: &InputEntry, error: String, duration_secs: f64) -> InputResult {
    InputResult {
        input: entry.input.clone(),
        label: entry.label.clone(),
        success: false,
        error: Some(error),
        competitor_count: 0,
        output_file: None,
        duration_secs,
    }
}

async fn process_entry<F>(index: usize, entry: &InputEntry, output_dir: &Path, make_pipeline: &F) -> InputResult
where
    F: Fn() -> Result<Pipeline> + Sync,
{
    let start = Instant::now();

    let mut pipeline = match make_pipeline() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            let error = format!("Failed to build pipeline: {:#}", e);
            return failed_result(entry, error, start.elapsed().as_secs_f64());
        }
    };

    let output = pipeline.process(&entry.input).await;
    let mut result = InputResult {
        input: entry.input.clone(),
        label: entry.label.clone(),
        success: !output.is_error(),
        error: output.error_message().map(str::to_string),
        competitor_count: output.as_record().map_or(0, |record| record.competitors.len()),
        output_file: None,
        duration_secs: 0.0,
    };

    let path: PathBuf = output_dir.join(output_filename(index, &entry.input));
    match export_json(&output, &path) {
        Ok(()) => result.output_file = Some(path.display().to_string()),
        Err(e) => {
            warn!("Could not write result for '{}': {:#}", entry.input, e);
            if result.error.is_none() {
                result.error = Some(format!("{:#}", e));
            }
            result.success = false;
        }
    }

    result.duration_secs = start.elapsed().as_secs_f64();
    result
}
