//! Diagram rendering through external tools for markr.
//!
//! A diagram description is turned into an artifact by one or two external
//! tools, each wrapped in a [`RenderStage`]:
//!
//! - [`DiagramFormat::Eps`]: the description renderer emits EPS directly
//! - [`DiagramFormat::Pdf`]: the description renderer emits SVG, which a
//!   converter then turns into PDF
//!
//! [`RenderPipeline`] chains the stages for a format and implements
//! [`ArtifactRenderer`](markr_cache::ArtifactRenderer) so it can be plugged
//! straight into the artifact cache.
//!
//! # Architecture
//!
//! - [`format`]: output formats and their intermediate vector formats
//! - [`tool`]: command templates with `{placeholder}` expansion
//! - [`stage`]: streaming and file-based stage transports
//! - [`pipeline`]: format-driven stage composition
//!
//! # Example
//!
//! ```ignore
//! use markr_diagrams::{DiagramFormat, DiagramTools, RenderPipeline};
//!
//! let pipeline = RenderPipeline::new(DiagramFormat::Pdf, &tools, 300);
//! let pdf = pipeline.render(b"@startuml\nA -> B\n@enduml\n")?;
//! ```

mod format;
mod pipeline;
mod stage;
mod tool;

pub use format::DiagramFormat;
pub use pipeline::{DiagramTools, RenderError, RenderPipeline};
pub use stage::{FileStage, RenderStage, StageError, StreamingStage};
pub use tool::{ToolCommand, ToolVars, Transport};
