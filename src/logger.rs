use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Warnings and errors only
    Summary = 1,  // Pipeline stages and results (default)
    Detailed = 2, // Fetch attempts, candidates, rotations
    Debug = 3,    // Everything, including dependency crates
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Default `EnvFilter` directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Silent => "warn",
            VerbosityLevel::Summary => "warn,marketpulse=info",
            VerbosityLevel::Detailed => "warn,marketpulse=debug",
            VerbosityLevel::Debug => "debug",
        }
    }

    pub fn shows_progress(&self) -> bool {
        *self <= VerbosityLevel::Summary
    }
}

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over `verbosity`.
pub fn init_tracing(verbosity: VerbosityLevel) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(verbosity.filter_directive()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= VerbosityLevel::Detailed)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Progress bar for a batch run; hidden when verbose logging would interleave with it
pub fn batch_progress(total: u64, verbosity: VerbosityLevel) -> ProgressBar {
    if !verbosity.shows_progress() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| {
                // Fallback to a simpler template if the complex one fails
                ProgressStyle::default_bar()
                    .template("{bar:40} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
            })
            .progress_chars("##-"),
    );
    bar
}
