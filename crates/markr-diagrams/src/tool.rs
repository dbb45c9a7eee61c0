//! External tool command templates.

use std::path::Path;
use std::process::Command;

/// How a stage hands data to and from its tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Input on stdin, artifact on stdout.
    #[default]
    Stream,
    /// Input and artifact exchanged through named files, for tools that need
    /// a seekable file or infer the format from a file extension.
    File,
}

/// Values substituted into a [`ToolCommand`] template.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolVars<'a> {
    /// Requested output format (`{format}`).
    pub format: &'a str,
    /// Rendering resolution (`{dpi}`).
    pub dpi: u32,
    /// Input file (`{input}`), file transport only.
    pub input: Option<&'a Path>,
    /// Output file (`{output}`), file transport only.
    pub output: Option<&'a Path>,
}

/// An argv template for an external tool.
///
/// Each argument may contain `{format}`, `{dpi}`, `{input}` and `{output}`
/// placeholders. Placeholders without a value are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Data transport used by the tool.
    pub transport: Transport,
}

impl ToolCommand {
    /// Create a streaming tool command.
    #[must_use]
    pub fn stream<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            transport: Transport::Stream,
        }
    }

    /// Create a file-based tool command.
    #[must_use]
    pub fn file<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            transport: Transport::File,
        }
    }

    /// Expand the template into a [`Command`].
    ///
    /// Returns `None` if the template has no program.
    #[must_use]
    pub fn command(&self, vars: &ToolVars<'_>) -> Option<Command> {
        let (program, args) = self.argv.split_first()?;
        let mut command = Command::new(expand(program, vars));
        command.args(args.iter().map(|arg| expand(arg, vars)));
        Some(command)
    }
}

fn expand(arg: &str, vars: &ToolVars<'_>) -> String {
    if !arg.contains('{') {
        return arg.to_owned();
    }
    let mut expanded = arg
        .replace("{format}", vars.format)
        .replace("{dpi}", &vars.dpi.to_string());
    if let Some(input) = vars.input {
        expanded = expanded.replace("{input}", &input.to_string_lossy());
    }
    if let Some(output) = vars.output {
        expanded = expanded.replace("{output}", &output.to_string_lossy());
    }
    expanded
}
