//! `markr clean` command implementation.

use std::path::PathBuf;

use clap::Args;
use markr_config::{CliSettings, Config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the clean command.
#[derive(Args)]
pub(crate) struct CleanArgs {
    /// Markdown input file whose artifacts are deleted.
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Directory holding rendered diagrams (overrides config).
    #[arg(long, env = "MARKR_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,

    /// Path to configuration file (default: auto-discover markr.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl CleanArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            work_dir: self.work_dir.clone(),
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let work_dir = &config.render.work_dir;

        let removed = markr_build::clean(&self.input, work_dir)?;
        output.success(&format!(
            "Removed {removed} artifacts of {} from {}",
            self.input.display(),
            work_dir.display()
        ));
        Ok(())
    }
}
