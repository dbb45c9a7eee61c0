//! `markr render` command implementation.

use std::path::PathBuf;

use clap::Args;
use markr_build::{BuildConfig, Builder};
use markr_config::{CliSettings, Config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Markdown input file.
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Typeset output file.
    #[arg(long = "out", value_name = "FILE")]
    output: PathBuf,

    /// Reuse rendered diagrams across runs (overrides config).
    #[arg(long, conflicts_with = "no_cache")]
    cache: bool,

    /// Render every diagram afresh (overrides config).
    #[arg(long)]
    no_cache: bool,

    /// Diagram format: "pdf" or "eps" (overrides config).
    #[arg(long, value_name = "FORMAT")]
    diagrams: Option<String>,

    /// Diagram resolution in dpi (overrides config).
    #[arg(long, value_name = "DPI")]
    resolution: Option<u32>,

    /// Keep rendered diagrams and the intermediate document.
    #[arg(long)]
    keep_temporaries: bool,

    /// Directory for rendered diagrams (overrides config).
    #[arg(long, env = "MARKR_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,

    /// Path to configuration file (default: auto-discover markr.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl RenderArgs {
    fn cli_settings(&self) -> CliSettings {
        let cache = if self.cache {
            Some(true)
        } else {
            self.no_cache.then_some(false)
        };
        CliSettings {
            format: self.diagrams.clone(),
            dpi: self.resolution,
            cache,
            keep_temporaries: self.keep_temporaries.then_some(true),
            work_dir: self.work_dir.clone(),
        }
    }

    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), Some(&self.cli_settings()))?;
        if let Some(path) = &config.config_path {
            tracing::info!(config = %path.display(), "loaded configuration");
        }

        let build_config = BuildConfig::from_config(&config, &self.input, &self.output)?;
        let report = Builder::new(build_config).build()?;

        if let Some(path) = &report.intermediate {
            output.info(&format!("Intermediate document: {}", path.display()));
        }
        output.success(&format!(
            "Rendered {} ({} diagrams, {} from cache)",
            self.output.display(),
            report.blocks,
            report.cache_hits
        ));
        Ok(())
    }
}
