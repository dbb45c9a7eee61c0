//! Final typesetting of the assembled document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use markr_process::{ProcessError, ToolLog};

/// Tag used for typesetter diagnostics.
const TOOL_NAME: &str = "pandoc";

/// Error returned by [`Typesetter::render`].
#[derive(Debug, thiserror::Error)]
pub enum TypesetError {
    /// The typesetter command template is empty.
    #[error("typesetter command is empty")]
    EmptyCommand,
    /// The output path has no file name.
    #[error("invalid output path {}", .0.display())]
    InvalidOutput(PathBuf),
    /// The staging directory could not be created.
    #[error("preparing output next to {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The typesetter failed.
    #[error("running pandoc: {source}{}", diagnostics_suffix(.diagnostics))]
    Process {
        #[source]
        source: ProcessError,
        diagnostics: String,
    },
    /// The typesetter exited successfully without writing its output.
    #[error("pandoc reported success but did not create {}", path.display())]
    MissingOutput { path: PathBuf },
    /// The finished output could not be moved into place.
    #[error("moving output to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
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

/// External typesetter with a fixed option template.
///
/// Invoked as `{command} {options} -o {output}` with the document on stdin.
#[derive(Debug, Clone)]
pub struct Typesetter {
    command: Vec<String>,
    options: Vec<String>,
}

impl Typesetter {
    /// Create a typesetter from a command and its options.
    #[must_use]
    pub fn new(command: Vec<String>, options: Vec<String>) -> Self {
        Self { command, options }
    }

    /// Typeset `document` into `output`.
    ///
    /// The tool writes into a private directory next to `output`; the result
    /// is renamed onto `output` only after a successful exit, so a failed run
    /// never leaves a partial file at the declared path.
    ///
    /// # Errors
    ///
    /// Returns [`TypesetError::Process`] if the tool fails and
    /// [`TypesetError::MissingOutput`] if it exits successfully without
    /// producing its output.
    pub fn render(&self, document: &[u8], output: &Path) -> Result<(), TypesetError> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or(TypesetError::EmptyCommand)?;
        let file_name = output
            .file_name()
            .ok_or_else(|| TypesetError::InvalidOutput(output.to_path_buf()))?;
        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let staging = tempfile::Builder::new()
            .prefix(".markr-")
            .tempdir_in(parent)
            .map_err(|source| TypesetError::Staging {
                path: output.to_path_buf(),
                source,
            })?;
        let staged = staging.path().join(file_name);

        let mut command = Command::new(program);
        command
            .args(leading)
            .args(&self.options)
            .arg("-o")
            .arg(&staged);

        tracing::info!(output = %output.display(), "rendering with {TOOL_NAME}");
        let mut stdout = ToolLog::new(TOOL_NAME);
        let mut stderr = ToolLog::new(TOOL_NAME);
        if let Err(source) = markr_process::run(&mut command, document, &mut stdout, &mut stderr) {
            return Err(TypesetError::Process {
                source,
                diagnostics: stderr.tail(),
            });
        }

        if !staged.exists() {
            return Err(TypesetError::MissingOutput {
                path: output.to_path_buf(),
            });
        }
        fs::rename(&staged, output).map_err(|source| TypesetError::Persist {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}
