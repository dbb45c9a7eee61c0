//! Diagram output formats.

use std::fmt;

/// Output format for rendered diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramFormat {
    /// PDF, rendered to SVG first and then converted.
    #[default]
    Pdf,
    /// EPS, rendered directly by the description renderer.
    Eps,
}

impl DiagramFormat {
    /// Parse a format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "eps" => Some(Self::Eps),
            _ => None,
        }
    }

    /// Format name, also used as the artifact file extension.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Eps => "eps",
        }
    }

    /// Format requested from the description renderer.
    #[must_use]
    pub fn vector_format(self) -> &'static str {
        match self {
            Self::Pdf => "svg",
            Self::Eps => "eps",
        }
    }

    /// Whether a conversion stage follows the description renderer.
    #[must_use]
    pub fn needs_conversion(self) -> bool {
        self.vector_format() != self.as_str()
    }
}

impl fmt::Display for DiagramFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
