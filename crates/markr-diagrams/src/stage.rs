//! Render stages: one external tool invocation each.
//!
//! Two transports implement [`RenderStage`]:
//! - [`StreamingStage`] pipes the input to stdin and collects stdout
//! - [`FileStage`] stages the input in a named temporary file and reads the
//!   artifact back from a named output file
//!
//! Both report "exited non-zero", "exited zero without producing anything"
//! and "could not be started" through the same [`StageError`].

use std::fs;
use std::io;
use std::path::PathBuf;

use markr_process::{ProcessError, ToolLog};

use crate::tool::{ToolCommand, ToolVars};

/// One external tool invocation turning bytes into bytes.
pub trait RenderStage {
    /// Stage name used in logs and errors (usually the tool name).
    fn name(&self) -> &str;

    /// Run the tool on `input` and return the bytes it produced.
    fn render(&self, input: &[u8]) -> Result<Vec<u8>, StageError>;
}

/// Error returned by a [`RenderStage`].
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The tool template has no program.
    #[error("{stage}: empty command template")]
    EmptyCommand { stage: String },
    /// The tool could not be started or exited unsuccessfully.
    #[error("{stage}: {source}{}", diagnostics_suffix(.diagnostics))]
    Process {
        stage: String,
        #[source]
        source: ProcessError,
        /// Last lines the tool wrote to stderr.
        diagnostics: String,
    },
    /// The tool exited successfully without creating its output file.
    #[error("{stage} reported success but did not create {}", path.display())]
    MissingOutput { stage: String, path: PathBuf },
    /// The tool exited successfully but produced no bytes.
    #[error("{stage} reported success but produced no output")]
    EmptyOutput { stage: String },
    /// Staging files for the tool failed.
    #[error("{stage}: staging files: {source}")]
    Io {
        stage: String,
        #[source]
        source: io::Error,
    },
}

fn diagnostics_suffix(diagnostics: &str) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!("\n{diagnostics}")
    }
}

/// Stage exchanging data with its tool over stdin/stdout.
#[derive(Debug, Clone)]
pub struct StreamingStage {
    name: String,
    tool: ToolCommand,
    format: String,
    dpi: u32,
}

impl StreamingStage {
    /// Create a streaming stage requesting `format` at `dpi`.
    #[must_use]
    pub fn new(name: impl Into<String>, tool: ToolCommand, format: &str, dpi: u32) -> Self {
        Self {
            name: name.into(),
            tool,
            format: format.to_owned(),
            dpi,
        }
    }
}

impl RenderStage for StreamingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, input: &[u8]) -> Result<Vec<u8>, StageError> {
        let vars = ToolVars {
            format: &self.format,
            dpi: self.dpi,
            ..ToolVars::default()
        };
        let mut command = self.tool.command(&vars).ok_or_else(|| StageError::EmptyCommand {
            stage: self.name.clone(),
        })?;

        tracing::info!(stage = %self.name, format = %self.format, "rendering");
        let mut output = Vec::new();
        let mut diagnostics = ToolLog::new(&self.name);
        if let Err(source) =
            markr_process::run(&mut command, input, &mut output, &mut diagnostics)
        {
            return Err(StageError::Process {
                stage: self.name.clone(),
                source,
                diagnostics: diagnostics.tail(),
            });
        }

        if output.is_empty() {
            return Err(StageError::EmptyOutput {
                stage: self.name.clone(),
            });
        }
        tracing::debug!(stage = %self.name, bytes = output.len(), "rendered");
        Ok(output)
    }
}

/// Stage exchanging data with its tool through named files.
///
/// The input is written to `input.{input_extension}` and the tool is expected
/// to create `output.{format}`, both inside a private temporary directory
/// that is removed when the stage finishes.
#[derive(Debug, Clone)]
pub struct FileStage {
    name: String,
    tool: ToolCommand,
    input_extension: String,
    format: String,
    dpi: u32,
}

impl FileStage {
    /// Create a file-based stage converting `input_extension` files to `format`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        tool: ToolCommand,
        input_extension: &str,
        format: &str,
        dpi: u32,
    ) -> Self {
        Self {
            name: name.into(),
            tool,
            input_extension: input_extension.to_owned(),
            format: format.to_owned(),
            dpi,
        }
    }

    fn io_error(&self, source: io::Error) -> StageError {
        StageError::Io {
            stage: self.name.clone(),
            source,
        }
    }
}

impl RenderStage for FileStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, input: &[u8]) -> Result<Vec<u8>, StageError> {
        let workspace = tempfile::Builder::new()
            .prefix("markr-stage-")
            .tempdir()
            .map_err(|e| self.io_error(e))?;
        let input_path = workspace.path().join(format!("input.{}", self.input_extension));
        let output_path = workspace.path().join(format!("output.{}", self.format));
        fs::write(&input_path, input).map_err(|e| self.io_error(e))?;

        let vars = ToolVars {
            format: &self.format,
            dpi: self.dpi,
            input: Some(&input_path),
            output: Some(&output_path),
        };
        let mut command = self.tool.command(&vars).ok_or_else(|| StageError::EmptyCommand {
            stage: self.name.clone(),
        })?;

        tracing::info!(stage = %self.name, format = %self.format, "rendering via files");
        let mut stdout = ToolLog::new(&self.name);
        let mut diagnostics = ToolLog::new(&self.name);
        if let Err(source) = markr_process::run(&mut command, b"", &mut stdout, &mut diagnostics) {
            return Err(StageError::Process {
                stage: self.name.clone(),
                source,
                diagnostics: diagnostics.tail(),
            });
        }

        if !output_path.exists() {
            return Err(StageError::MissingOutput {
                stage: self.name.clone(),
                path: output_path,
            });
        }
        let output = fs::read(&output_path).map_err(|e| self.io_error(e))?;
        if output.is_empty() {
            return Err(StageError::EmptyOutput {
                stage: self.name.clone(),
            });
        }
        tracing::debug!(stage = %self.name, bytes = output.len(), "rendered");
        Ok(output)
    }
}
