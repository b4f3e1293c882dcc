use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

use marketpulse::batch::{parse_input_file, run_batch, SUMMARY_FILENAME};
use marketpulse::cli::{Cli, Commands};
use marketpulse::config::{AppConfig, CONFIG_PATH};
use marketpulse::export::{export_competitors_csv, export_json, print_record_summary};
use marketpulse::logger::{batch_progress, init_tracing, VerbosityLevel};
use marketpulse::pipeline::Pipeline;
use marketpulse::record::PipelineOutput;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    let verbosity = if cli.quiet {
        VerbosityLevel::Silent
    } else {
        VerbosityLevel::from_verbose_count(cli.verbose)
    };
    init_tracing(verbosity)?;

    match &cli.command {
        Commands::InitConfig { path, force } => init_config(path.as_deref(), *force),
        Commands::Analyze {
            input,
            output,
            csv,
            text_file,
            summary,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let options = AnalyzeOptions {
                output: output.as_deref(),
                csv: csv.as_deref(),
                text_file: *text_file,
                summary: *summary,
            };
            analyze(&config, input, &options).await
        }
        Commands::Batch {
            file,
            output_dir,
            concurrency,
        } => {
            let config = load_config(cli.config.as_deref())?;
            batch(&config, file, output_dir, *concurrency, verbosity).await
        }
    }
}

/// An explicit `--config` must exist; the default location may be absent
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AppConfig::load_or_default(None).context("Failed to load configuration")?,
    };
    debug!("Configuration loaded: {:?}", config);
    Ok(config)
}

fn init_config(path: Option<&Path>, force: bool) -> Result<ExitCode> {
    let path: PathBuf = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(CONFIG_PATH));

    if path.exists() && !force {
        eprintln!("Configuration file already exists at: {}", path.display());
        eprintln!("   Use --force to overwrite it.");
        return Ok(ExitCode::FAILURE);
    }

    let written = AppConfig::create_default_config_at(&path)
        .with_context(|| format!("Failed to create configuration file at {}", path.display()))?;
    println!("Created default configuration file at: {}", written.display());
    println!("   Edit this file to customize settings, then run marketpulse again.");
    Ok(ExitCode::SUCCESS)
}

struct AnalyzeOptions<'a> {
    output: Option<&'a Path>,
    csv: Option<&'a Path>,
    text_file: bool,
    summary: bool,
}

async fn analyze(config: &AppConfig, input: &str, options: &AnalyzeOptions<'_>) -> Result<ExitCode> {
    let mut pipeline = Pipeline::new(config)?;

    let output = if options.text_file {
        let content = fs::read_to_string(input).with_context(|| format!("Failed to read input file: {}", input))?;
        pipeline.analyze_document(input, &content)
    } else {
        pipeline.process(input).await
    };

    write_output(&output, options)?;

    if output.is_error() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn write_output(output: &PipelineOutput, options: &AnalyzeOptions<'_>) -> Result<()> {
    match options.output {
        Some(path) => export_json(output, path)?,
        None if options.summary => print_record_summary(output),
        None => {
            let json = serde_json::to_string_pretty(output).context("Failed to serialize record")?;
            println!("{}", json);
        }
    }

    if let (Some(path), Some(record)) = (options.csv, output.as_record()) {
        export_competitors_csv(&record.competitors, path)?;
    }

    Ok(())
}

async fn batch(
    config: &AppConfig,
    file: &Path,
    output_dir: &Path,
    concurrency: usize,
    verbosity: VerbosityLevel,
) -> Result<ExitCode> {
    let entries = parse_input_file(file)?;
    if entries.is_empty() {
        bail!("No inputs found in {}", file.display());
    }

    info!("Loaded {} inputs from {}", entries.len(), file.display());

    let progress = batch_progress(entries.len() as u64, verbosity);
    let summary = run_batch(&entries, config, output_dir, concurrency, &progress).await?;

    println!();
    println!("========================================================================");
    println!("                       BATCH ANALYSIS COMPLETE                          ");
    println!("========================================================================");
    println!();
    println!("Summary:");
    println!("   Total inputs:        {}", summary.total_inputs);
    println!("   Successful:          {}", summary.successful);
    println!("   Failed:              {}", summary.failed);
    println!("   Total competitors:   {}", summary.total_competitors);
    println!("   Total duration:      {:.1}s", summary.total_duration_secs);
    println!();
    println!("Results written to: {}", output_dir.display());
    println!("Batch summary: {}", output_dir.join(SUMMARY_FILENAME).display());

    if summary.failed > 0 && summary.successful == 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
