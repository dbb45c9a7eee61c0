//! Macro delimiters and auto-wrapping markers.

/// Delimiters and wrapping convention recognised by the scanner.
///
/// Delimiters are matched as byte prefixes, so lines in any encoding can be
/// scanned as long as the delimiters themselves are ASCII-compatible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroSyntax {
    /// Prefix opening a block, followed directly by the block kind.
    pub open: String,
    /// Block kinds accepted after [`open`](Self::open).
    pub kinds: Vec<String>,
    /// Prefix closing a block.
    pub close: String,
    /// First byte of an explicit start line in a block body.
    pub explicit_start: u8,
    /// Line injected before a body lacking an explicit start.
    pub begin_marker: String,
    /// Line injected after a body lacking an explicit start.
    pub end_marker: String,
}

impl Default for MacroSyntax {
    fn default() -> Self {
        Self {
            open: "{{".to_owned(),
            kinds: vec!["plantuml".to_owned(), "diagram".to_owned()],
            close: "}}".to_owned(),
            explicit_start: b'@',
            begin_marker: "@startuml".to_owned(),
            end_marker: "@enduml".to_owned(),
        }
    }
}

impl MacroSyntax {
    /// Default syntax accepting the given block kinds.
    #[must_use]
    pub fn with_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Block kind if `line` opens a block.
    #[must_use]
    pub fn opening_kind(&self, line: &[u8]) -> Option<&str> {
        let rest = line.strip_prefix(self.open.as_bytes())?;
        self.kinds
            .iter()
            .find(|kind| rest.starts_with(kind.as_bytes()))
            .map(String::as_str)
    }

    /// Whether `line` closes a block.
    #[must_use]
    pub fn is_close(&self, line: &[u8]) -> bool {
        line.starts_with(self.close.as_bytes())
    }

    /// Whether `line` is an explicit start line, suppressing auto-wrapping.
    #[must_use]
    pub fn is_explicit_start(&self, line: &[u8]) -> bool {
        line.first() == Some(&self.explicit_start)
    }
}
