//! Artifact resolution and persistence.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::cleanup::CleanupRegistry;
use crate::key::ArtifactKey;

/// Something that turns source bytes into artifact bytes.
pub trait ArtifactRenderer {
    /// Rendering failure.
    type Error: std::error::Error + 'static;

    /// Extension of the produced artifact, without the leading dot.
    fn extension(&self) -> &str;

    /// Render `source` into artifact bytes.
    fn render(&self, source: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Error returned by [`ArtifactCache::resolve`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError<E: std::error::Error + 'static> {
    /// The renderer failed; no artifact was written.
    #[error(transparent)]
    Render(E),
    /// The rendered artifact could not be persisted.
    #[error("writing artifact {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A resolved artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Artifact location.
    pub path: PathBuf,
    /// Whether an existing artifact was reused instead of rendering.
    pub cached: bool,
}

/// Content-addressed store of rendered artifacts in a single directory.
///
/// With caching enabled, an existing file at the derived path is reused as-is;
/// its content is not re-verified against the current renderer. With caching
/// disabled, every request renders and the artifact is registered for cleanup
/// at the end of the run.
#[derive(Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
    run_id: String,
    enabled: bool,
}

impl ArtifactCache {
    /// Create a cache storing artifacts in `dir` for the given run.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, run_id: impl Into<String>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            run_id: run_id.into(),
            enabled,
        }
    }

    /// Path the artifact for `source` would have.
    #[must_use]
    pub fn artifact_path(&self, kind: &str, source: &[u8], extension: &str) -> PathBuf {
        ArtifactKey::new(&self.run_id, kind, source, extension).path_in(&self.dir)
    }

    /// Return the artifact for `source`, rendering it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Render`] with the renderer's error unchanged, or
    /// [`ResolveError::Write`] if the artifact cannot be stored. In both cases
    /// nothing is left at the artifact path.
    pub fn resolve<R: ArtifactRenderer>(
        &self,
        kind: &str,
        source: &[u8],
        renderer: &R,
        registry: &mut CleanupRegistry,
    ) -> Result<Resolved, ResolveError<R::Error>> {
        let key = ArtifactKey::new(&self.run_id, kind, source, renderer.extension());
        let path = key.path_in(&self.dir);
        tracing::info!(sha256 = %key.hash, "{kind} source checksum");

        if self.enabled && path.exists() {
            tracing::info!(file = %path.display(), "reusing cached {kind}");
            return Ok(Resolved { path, cached: true });
        }

        let bytes = renderer.render(source).map_err(ResolveError::Render)?;
        write_artifact(&path, &bytes).map_err(|source| ResolveError::Write {
            path: path.clone(),
            source,
        })?;

        if self.enabled {
            tracing::info!(file = %path.display(), "keeping for cache");
        } else {
            registry.register(&path);
        }
        Ok(Resolved {
            path,
            cached: false,
        })
    }
}

/// Write `bytes` to `path` atomically.
///
/// The data goes to a temporary file in the same directory, which is renamed
/// onto `path` only once fully written. On failure the temporary file is
/// removed and `path` is untouched.
///
/// # Errors
///
/// Returns any I/O error from creating the directory, writing, or renaming.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
