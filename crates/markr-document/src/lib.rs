//! Macro block scanning and document assembly for markr.
//!
//! Input documents are plain text with embedded diagram blocks:
//!
//! ```text
//! Some prose.
//! {{plantuml
//! Alice -> Bob
//! }}
//! More prose.
//! ```
//!
//! [`MacroScanner`] walks the input line by line, passing plain lines through
//! and collecting block bodies into [`MacroBlock`]s. Bodies that do not start
//! with an explicit `@start…` line are wrapped in `@startuml`/`@enduml`.
//! [`DocumentAssembler`] then rebuilds the document with every block replaced
//! by an image inclusion of its rendered artifact.
//!
//! [`assemble`] ties both together for a reader and a block resolver.

mod document;
mod scanner;
mod syntax;

pub use document::{Document, DocumentAssembler, DocumentError, Segment, assemble};
pub use scanner::{MacroBlock, MacroScanner, ScanError, Step};
pub use syntax::MacroSyntax;
