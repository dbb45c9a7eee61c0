//! Single-run document build.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use markr_cache::{
    ArtifactCache, CleanupRegistry, CleanupReport, ResolveError, run_identifier, write_artifact,
};
use markr_config::Config;
use markr_diagrams::{
    DiagramFormat, DiagramTools, RenderError, RenderPipeline, ToolCommand, Transport,
};
use markr_document::{DocumentError, MacroSyntax, assemble};

use crate::typeset::{TypesetError, Typesetter};

/// Cache kind of rendered diagrams.
const DIAGRAM_KIND: &str = "diagram";

/// Cache kind of the kept intermediate document.
const DOCUMENT_KIND: &str = "document";

/// Everything one build needs.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Source document.
    pub input: PathBuf,
    /// Final typeset output.
    pub output: PathBuf,
    /// Diagram artifact format.
    pub format: DiagramFormat,
    /// Resolution passed to diagram tools.
    pub dpi: u32,
    /// Whether artifacts are reused across runs.
    pub cache: bool,
    /// Whether run-scoped files survive the run.
    pub keep_temporaries: bool,
    /// Directory holding artifacts.
    pub work_dir: PathBuf,
    /// Macro block delimiters.
    pub syntax: MacroSyntax,
    /// Diagram tools.
    pub tools: DiagramTools,
    /// Document typesetter.
    pub typesetter: Typesetter,
}

impl BuildConfig {
    /// Build settings for `input` → `output` from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Format`] if the configured diagram format is
    /// unknown.
    pub fn from_config(config: &Config, input: &Path, output: &Path) -> Result<Self, BuildError> {
        let format = DiagramFormat::parse(&config.render.format)
            .ok_or_else(|| BuildError::Format(config.render.format.clone()))?;
        let tools = &config.tools;

        Ok(Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            format,
            dpi: config.render.dpi,
            cache: config.render.cache,
            keep_temporaries: config.render.keep_temporaries,
            work_dir: config.render.work_dir.clone(),
            syntax: MacroSyntax::with_kinds(&config.macros.kinds),
            tools: DiagramTools {
                plantuml: tool_command(&tools.plantuml),
                inkscape: tool_command(&tools.inkscape),
            },
            typesetter: Typesetter::new(tools.pandoc.command.clone(), tools.pandoc.options.clone()),
        })
    }
}

fn tool_command(tool: &markr_config::ToolConfig) -> ToolCommand {
    ToolCommand {
        argv: tool.command.clone(),
        transport: match tool.transport {
            markr_config::Transport::Stream => Transport::Stream,
            markr_config::Transport::File => Transport::File,
        },
    }
}

/// Error returned by [`Builder::build`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("unsupported diagram format {0:?}")]
    Format(String),
    #[error("opening {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Document(#[from] DocumentError<ResolveError<RenderError>>),
    #[error("writing intermediate document {}: {source}", path.display())]
    Intermediate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Typeset(#[from] TypesetError),
}

/// Outcome of a successful build.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Diagram blocks encountered.
    pub blocks: usize,
    /// Blocks served from the cache.
    pub cache_hits: usize,
    /// Blocks rendered by the tool chain.
    pub rendered: usize,
    /// Intermediate document, when temporaries are kept.
    pub intermediate: Option<PathBuf>,
    /// What end-of-run cleanup did.
    pub cleanup: CleanupReport,
}

/// Runs builds.
pub struct Builder {
    config: BuildConfig,
}

impl Builder {
    /// Create a builder.
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Run one build.
    ///
    /// Every run-scoped file registered during the run is cleaned up before
    /// this returns, whether the build succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns the first failure: unreadable input, an unclosed block, a
    /// failed diagram render, or a failed typesetter run. No output is
    /// written at the declared path on failure.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let mut registry = if self.config.keep_temporaries {
            CleanupRegistry::retaining()
        } else {
            CleanupRegistry::new()
        };

        let result = self.run(&mut registry);
        let cleanup = registry.drain();
        if !cleanup.failed.is_empty() {
            tracing::warn!(
                failed = cleanup.failed.len(),
                "some temporary files could not be deleted"
            );
        }

        let mut report = result?;
        report.cleanup = cleanup;
        tracing::info!(
            blocks = report.blocks,
            cache_hits = report.cache_hits,
            rendered = report.rendered,
            output = %self.config.output.display(),
            "build finished"
        );
        Ok(report)
    }

    fn run(&self, registry: &mut CleanupRegistry) -> Result<BuildReport, BuildError> {
        let config = &self.config;
        let file = File::open(&config.input).map_err(|source| BuildError::Input {
            path: config.input.clone(),
            source,
        })?;

        let run_id = run_identifier(&config.input);
        tracing::info!(input = %config.input.display(), run_id = %run_id, "starting build");
        let cache = ArtifactCache::new(&config.work_dir, run_id, config.cache);
        let pipeline = RenderPipeline::new(config.format, &config.tools, config.dpi);

        let mut report = BuildReport::default();
        let document = assemble(
            BufReader::new(file),
            &config.syntax,
            |block| -> Result<PathBuf, ResolveError<RenderError>> {
                report.blocks += 1;
                tracing::debug!(line = block.line, kind = %block.kind, "diagram block");
                let resolved = cache.resolve(DIAGRAM_KIND, block.as_bytes(), &pipeline, registry)?;
                if resolved.cached {
                    report.cache_hits += 1;
                } else {
                    report.rendered += 1;
                }
                Ok(resolved.path)
            },
        )?;

        let rendered = document.render();
        if config.keep_temporaries {
            let path = cache.artifact_path(DOCUMENT_KIND, &rendered, "md");
            write_artifact(&path, &rendered).map_err(|source| BuildError::Intermediate {
                path: path.clone(),
                source,
            })?;
            tracing::info!(file = %path.display(), "wrote intermediate document");
            registry.register(&path);
            report.intermediate = Some(path);
        }

        config.typesetter.render(&rendered, &config.output)?;
        Ok(report)
    }
}

/// Delete every artifact belonging to `input`'s runs from `work_dir`.
///
/// Returns the number of files removed. A missing `work_dir` counts as clean.
///
/// # Errors
///
/// Returns the first I/O error from listing the directory or deleting a file.
pub fn clean(input: &Path, work_dir: &Path) -> io::Result<usize> {
    let prefix = format!("{}-", run_identifier(input));
    let entries = match fs::read_dir(work_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let owned = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if owned && entry.file_type()?.is_file() {
            tracing::info!(file = %entry.path().display(), "deleting");
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
