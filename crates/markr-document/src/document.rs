//! Assembled intermediate document.

use std::io::{self, BufRead};
use std::path::PathBuf;

use crate::scanner::{MacroBlock, MacroScanner, ScanError, Step};
use crate::syntax::MacroSyntax;

/// One piece of the assembled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A plain input line, without its terminator, byte for byte.
    Text(Vec<u8>),
    /// An image inclusion of a rendered artifact.
    Inclusion(PathBuf),
}

impl Segment {
    /// Append this segment's rendering, including the trailing newline.
    pub fn render_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Text(line) => out.extend_from_slice(line),
            Self::Inclusion(path) => {
                out.extend_from_slice(b"![](");
                out.extend_from_slice(path.as_os_str().as_encoded_bytes());
                out.push(b')');
            }
        }
        out.push(b'\n');
    }
}

/// Ordered segments making up the intermediate document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    segments: Vec<Segment>,
}

impl Document {
    /// Render the document as bytes.
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for segment in &self.segments {
            segment.render_into(&mut out);
        }
        out
    }
}

/// Accumulates segments into a [`Document`].
#[derive(Debug, Default)]
pub struct DocumentAssembler {
    segments: Vec<Segment>,
}

impl DocumentAssembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain line.
    pub fn push_text(&mut self, line: &[u8]) {
        self.segments.push(Segment::Text(line.to_vec()));
    }

    /// Append an inclusion of the artifact at `path`.
    pub fn push_inclusion(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::info!(file = %path.display(), "using diagram");
        self.segments.push(Segment::Inclusion(path));
    }

    /// Finish the document.
    #[must_use]
    pub fn finish(self) -> Document {
        Document {
            segments: self.segments,
        }
    }
}

/// Error returned by [`assemble`].
#[derive(Debug, thiserror::Error)]
pub enum DocumentError<E: std::error::Error + 'static> {
    /// Reading the input failed.
    #[error("reading input: {0}")]
    Io(#[from] io::Error),
    /// The input ended inside a block.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// A block could not be resolved to an artifact.
    #[error("{kind} block at line {line}: {source}")]
    Resolve {
        kind: String,
        line: usize,
        #[source]
        source: E,
    },
}

/// Scan `reader` and assemble the intermediate document.
///
/// Each closed block is handed to `resolve`, which returns the path of its
/// artifact; blocks are resolved one at a time, in document order. Lines are
/// split on `\n` and a trailing `\r` is stripped; no encoding is assumed.
///
/// # Errors
///
/// Fails on the first read error, resolver error, or on end of input inside
/// a block. No document is produced in that case.
pub fn assemble<R, F, E>(
    mut reader: R,
    syntax: &MacroSyntax,
    mut resolve: F,
) -> Result<Document, DocumentError<E>>
where
    R: BufRead,
    F: FnMut(&MacroBlock) -> Result<PathBuf, E>,
    E: std::error::Error + 'static,
{
    let mut scanner = MacroScanner::new(syntax);
    let mut assembler = DocumentAssembler::new();

    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match scanner.feed(line) {
            Step::Text(text) => assembler.push_text(text),
            Step::Opened | Step::Collected => {}
            Step::Closed(block) => {
                let path = resolve(&block).map_err(|source| DocumentError::Resolve {
                    kind: block.kind.clone(),
                    line: block.line,
                    source,
                })?;
                assembler.push_inclusion(path);
            }
        }
    }
    scanner.finish()?;

    Ok(assembler.finish())
}
