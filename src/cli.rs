use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Upper bound for `batch --concurrency`
pub const MAX_CONCURRENCY: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "marketpulse")]
#[command(about = "Extract clinical pipeline, deal and competitor facts from pharma press releases")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging (use -v for DEBUG from marketpulse, -vv for DEBUG everywhere)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to ./config/marketpulse.toml, built-in defaults if missing)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one URL or company name, or a local file with --text-file
    Analyze {
        /// URL, company name, or path to a local document when --text-file is set
        input: String,

        /// Write the JSON record to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Also write the competitor list as CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,

        /// Treat INPUT as a local text or HTML file and skip fetching
        #[arg(long)]
        text_file: bool,

        /// Print a human-readable summary to stdout instead of JSON
        #[arg(long)]
        summary: bool,
    },

    /// Analyze every input listed in a .csv, .json or .txt file
    Batch {
        /// Input list file
        file: PathBuf,

        /// Directory for per-input records and batch_summary.json
        #[arg(long, value_name = "DIR", default_value = "marketpulse_results")]
        output_dir: PathBuf,

        /// Inputs processed at the same time
        #[arg(short = 'j', long, value_name = "N", default_value = "1")]
        concurrency: usize,
    },

    /// Write the default configuration file
    InitConfig {
        /// Destination (defaults to ./config/marketpulse.toml)
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Commands::Batch { concurrency, .. } if *concurrency == 0 => {
                Err("Concurrency must be greater than 0".to_string())
            }
            Commands::Batch { concurrency, .. } if *concurrency > MAX_CONCURRENCY => Err(format!(
                "Concurrency cannot exceed {} to avoid overwhelming target sites",
                MAX_CONCURRENCY
            )),
            _ => Ok(()),
        }
    }
}
