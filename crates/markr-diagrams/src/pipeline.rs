//! Format-driven composition of render stages.

use markr_cache::ArtifactRenderer;

use crate::format::DiagramFormat;
use crate::stage::{FileStage, RenderStage, StageError, StreamingStage};
use crate::tool::{ToolCommand, Transport};

/// File extension of diagram descriptions handed to a file-based renderer.
const DESCRIPTION_EXTENSION: &str = "puml";

/// External tools used to render diagrams.
#[derive(Debug, Clone)]
pub struct DiagramTools {
    /// Description renderer (description → vector image).
    pub plantuml: ToolCommand,
    /// Vector converter (vector image → final format).
    pub inkscape: ToolCommand,
}

/// Error returned by [`RenderPipeline::render`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The description renderer failed.
    #[error("rendering diagram: {0}")]
    Render(#[source] StageError),
    /// The vector converter failed.
    #[error("converting diagram: {0}")]
    Convert(#[source] StageError),
}

/// Description bytes in, artifact bytes out.
///
/// For formats the description renderer emits directly this is a single
/// stage; otherwise the renderer's vector output feeds a conversion stage.
pub struct RenderPipeline {
    format: DiagramFormat,
    describe: Box<dyn RenderStage>,
    convert: Option<Box<dyn RenderStage>>,
}

impl RenderPipeline {
    /// Build the pipeline for `format` from the configured tools.
    #[must_use]
    pub fn new(format: DiagramFormat, tools: &DiagramTools, dpi: u32) -> Self {
        let describe = stage_for(
            "plantuml",
            &tools.plantuml,
            DESCRIPTION_EXTENSION,
            format.vector_format(),
            dpi,
        );
        let convert = format.needs_conversion().then(|| {
            stage_for(
                "inkscape",
                &tools.inkscape,
                format.vector_format(),
                format.as_str(),
                dpi,
            )
        });
        Self {
            format,
            describe,
            convert,
        }
    }

    /// Render a diagram description into artifact bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Render`] or [`RenderError::Convert`] wrapping the
    /// failing stage's error. The converter is not run if rendering fails.
    pub fn render(&self, description: &[u8]) -> Result<Vec<u8>, RenderError> {
        let vector = self
            .describe
            .render(description)
            .map_err(RenderError::Render)?;
        match &self.convert {
            Some(convert) => convert.render(&vector).map_err(RenderError::Convert),
            None => Ok(vector),
        }
    }
}

impl ArtifactRenderer for RenderPipeline {
    type Error = RenderError;

    fn extension(&self) -> &str {
        self.format.as_str()
    }

    fn render(&self, source: &[u8]) -> Result<Vec<u8>, RenderError> {
        RenderPipeline::render(self, source)
    }
}

fn stage_for(
    name: &str,
    tool: &ToolCommand,
    input_extension: &str,
    format: &str,
    dpi: u32,
) -> Box<dyn RenderStage> {
    match tool.transport {
        Transport::Stream => Box::new(StreamingStage::new(name, tool.clone(), format, dpi)),
        Transport::File => Box::new(FileStage::new(
            name,
            tool.clone(),
            input_extension,
            format,
            dpi,
        )),
    }
}
