//! Content-addressed artifact cache for markr.
//!
//! Rendering a diagram means launching one or two external tools, so every
//! rendered file is named after a digest of the exact bytes it was rendered
//! from. Three pieces cooperate:
//!
//! - [`ArtifactKey`]: deterministic artifact file name derived from the run
//!   identifier, artifact kind, content hash and extension
//! - [`ArtifactCache`]: decides whether an artifact can be reused or has to be
//!   rendered through an [`ArtifactRenderer`], and persists new artifacts
//!   atomically
//! - [`CleanupRegistry`]: ordered list of run-scoped files deleted once at the
//!   end of a run when caching is disabled
//!
//! # Example
//!
//! ```
//! use std::convert::Infallible;
//! use markr_cache::{ArtifactCache, ArtifactRenderer, CleanupRegistry};
//!
//! struct Upper;
//!
//! impl ArtifactRenderer for Upper {
//!     type Error = Infallible;
//!
//!     fn extension(&self) -> &str {
//!         "txt"
//!     }
//!
//!     fn render(&self, source: &[u8]) -> Result<Vec<u8>, Infallible> {
//!         Ok(source.to_ascii_uppercase())
//!     }
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! let cache = ArtifactCache::new(dir.path(), "markr-doc", false);
//! let mut registry = CleanupRegistry::new();
//!
//! let resolved = cache.resolve("diagram", b"a -> b\n", &Upper, &mut registry).unwrap();
//! assert_eq!(std::fs::read(&resolved.path).unwrap(), b"A -> B\n");
//!
//! registry.drain();
//! assert!(!resolved.path.exists());
//! ```

mod cleanup;
mod key;
mod store;

pub use cleanup::{CleanupRegistry, CleanupReport};
pub use key::{ArtifactKey, content_hash, run_identifier};
pub use store::{ArtifactCache, ArtifactRenderer, ResolveError, Resolved, write_artifact};
