//! CLI command implementations.

pub(crate) mod clean;
pub(crate) mod render;

pub(crate) use clean::CleanArgs;
pub(crate) use render::RenderArgs;
