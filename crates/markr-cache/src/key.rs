//! Artifact key computation.
//!
//! Provides [`ArtifactKey`] for mapping content hashes to artifact file names.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Prefix of every run identifier.
const RUN_PREFIX: &str = "markr";

/// Hex-encoded SHA-256 digest of `content`.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Per-document run identifier derived from the input path.
///
/// The path is hashed exactly as given, so the same document invoked through
/// the same path always maps to the same set of artifact names.
#[must_use]
pub fn run_identifier(input: &Path) -> String {
    let digest = content_hash(input.as_os_str().as_encoded_bytes());
    format!("{RUN_PREFIX}-{digest}")
}

/// Identity of a rendered artifact.
///
/// Two keys built from the same content, kind, extension and run identifier
/// always produce the same file name, wherever the content appeared in the
/// source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey<'a> {
    /// Run identifier (see [`run_identifier`]).
    pub run_id: &'a str,
    /// Artifact kind (e.g., "diagram", "document").
    pub kind: &'a str,
    /// Hex content hash (see [`content_hash`]).
    pub hash: String,
    /// File extension without the leading dot.
    pub extension: &'a str,
}

impl<'a> ArtifactKey<'a> {
    /// Build a key by hashing `content`.
    #[must_use]
    pub fn new(run_id: &'a str, kind: &'a str, content: &[u8], extension: &'a str) -> Self {
        Self {
            run_id,
            kind,
            hash: content_hash(content),
            extension,
        }
    }

    /// File name: `{run-id}-{kind}-{hash}.{extension}`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.{}",
            self.run_id, self.kind, self.hash, self.extension
        )
    }

    /// Artifact path inside `dir`.
    #[must_use]
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}
