//! Two-state line scanner separating plain text from macro blocks.

use crate::syntax::MacroSyntax;

/// A finished macro block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroBlock {
    /// Kind named by the opening delimiter.
    pub kind: String,
    /// One-based line number of the opening delimiter.
    pub line: usize,
    /// Body lines, each terminated by `\n`, including injected markers.
    ///
    /// Body bytes are kept exactly as read; no encoding is assumed.
    pub content: Vec<u8>,
    /// Whether begin/end markers were injected around the body.
    pub auto_wrapped: bool,
}

impl MacroBlock {
    /// Exact bytes to hash and render.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }
}

/// Error returned when the input ends inside a block.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// End of input was reached before the block's closing delimiter.
    #[error("{kind} block opened at line {line} is never closed")]
    UnclosedBlock { kind: String, line: usize },
}

/// Result of feeding one line to the scanner.
#[derive(Debug, PartialEq, Eq)]
pub enum Step<'a> {
    /// A plain line outside any block, to be copied verbatim.
    Text(&'a [u8]),
    /// A block was opened; the delimiter line itself is dropped.
    Opened,
    /// A body line was added to the open block.
    Collected,
    /// The open block was closed.
    Closed(MacroBlock),
}

#[derive(Debug)]
enum State {
    Outside,
    Inside(OpenBlock),
}

#[derive(Debug)]
struct OpenBlock {
    kind: String,
    line: usize,
    content: Vec<u8>,
    auto_wrapped: bool,
    /// True until the first body line is seen.
    after_opening: bool,
}

/// Line scanner with two states: outside and inside a macro block.
///
/// Outside, lines opening a block switch the scanner inside; every other
/// line is passed through. Inside, lines are collected until the closing
/// delimiter. The first body line decides wrapping: unless it is an explicit
/// start line, the begin marker is injected before it and the end marker
/// after the last body line. A block with no body at all is wrapped too.
#[derive(Debug)]
pub struct MacroScanner<'s> {
    syntax: &'s MacroSyntax,
    state: State,
    line: usize,
}

impl<'s> MacroScanner<'s> {
    /// Create a scanner for `syntax`.
    #[must_use]
    pub fn new(syntax: &'s MacroSyntax) -> Self {
        Self {
            syntax,
            state: State::Outside,
            line: 0,
        }
    }

    /// Feed the next line, without its line terminator.
    pub fn feed<'a>(&mut self, line: &'a [u8]) -> Step<'a> {
        self.line += 1;
        let syntax = self.syntax;
        match std::mem::replace(&mut self.state, State::Outside) {
            State::Outside => {
                let Some(kind) = syntax.opening_kind(line) else {
                    return Step::Text(line);
                };
                tracing::debug!(line = self.line, kind, "macro start");
                self.state = State::Inside(OpenBlock {
                    kind: kind.to_owned(),
                    line: self.line,
                    content: Vec::new(),
                    auto_wrapped: false,
                    after_opening: true,
                });
                Step::Opened
            }
            State::Inside(block) if syntax.is_close(line) => Step::Closed(self.close(block)),
            State::Inside(mut block) => {
                if block.after_opening {
                    block.after_opening = false;
                    if !syntax.is_explicit_start(line) {
                        tracing::debug!(line = self.line, "injecting begin marker");
                        block.auto_wrapped = true;
                        push_line(&mut block.content, syntax.begin_marker.as_bytes());
                    }
                }
                push_line(&mut block.content, line);
                self.state = State::Inside(block);
                Step::Collected
            }
        }
    }

    /// Finish scanning.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::UnclosedBlock`] if a block is still open.
    pub fn finish(self) -> Result<(), ScanError> {
        match self.state {
            State::Outside => Ok(()),
            State::Inside(block) => Err(ScanError::UnclosedBlock {
                kind: block.kind,
                line: block.line,
            }),
        }
    }

    fn close(&self, mut block: OpenBlock) -> MacroBlock {
        if block.after_opening {
            tracing::debug!(line = block.line, "empty block body");
            block.auto_wrapped = true;
            push_line(&mut block.content, self.syntax.begin_marker.as_bytes());
        }
        if block.auto_wrapped {
            tracing::debug!(line = self.line, "injecting end marker");
            push_line(&mut block.content, self.syntax.end_marker.as_bytes());
        }
        tracing::debug!(line = self.line, kind = %block.kind, "macro end");
        MacroBlock {
            kind: block.kind,
            line: block.line,
            content: block.content,
            auto_wrapped: block.auto_wrapped,
        }
    }
}

fn push_line(content: &mut Vec<u8>, line: &[u8]) {
    content.extend_from_slice(line);
    content.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan(input: &[u8]) -> (Vec<Vec<u8>>, Vec<MacroBlock>, Result<(), ScanError>) {
        let syntax = MacroSyntax::default();
        let mut scanner = MacroScanner::new(&syntax);
        let mut text = Vec::new();
        let mut blocks = Vec::new();
        let body = input.strip_suffix(b"\n").unwrap_or(input);
        for line in body.split(|&b| b == b'\n') {
            match scanner.feed(line) {
                Step::Text(t) => text.push(t.to_vec()),
                Step::Closed(block) => blocks.push(block),
                Step::Opened | Step::Collected => {}
            }
        }
        (text, blocks, scanner.finish())
    }

    fn lines(text: &[&str]) -> Vec<Vec<u8>> {
        text.iter().map(|line| line.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_plain_text_passes_through() {
        let (text, blocks, result) = scan(b"# Title\n\nparagraph }}\n@startuml\n{{mermaid\n");
        assert_eq!(
            text,
            lines(&["# Title", "", "paragraph }}", "@startuml", "{{mermaid"])
        );
        assert!(blocks.is_empty());
        assert!(result.is_ok());
    }

    #[test]
    fn test_block_is_auto_wrapped() {
        let (text, blocks, result) = scan(b"A\n{{diagram\nX --> Y\n}}\nB\n");
        result.unwrap();
        assert_eq!(text, lines(&["A", "B"]));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, b"@startuml\nX --> Y\n@enduml\n");
        assert!(blocks[0].auto_wrapped);
        assert_eq!(blocks[0].kind, "diagram");
        assert_eq!(blocks[0].line, 2);
    }

    #[test]
    fn test_explicit_start_is_not_wrapped() {
        let (_, blocks, _) = scan(b"{{plantuml\n@startuml\nA -> B\n@enduml\n}}\n");
        assert_eq!(blocks[0].content, b"@startuml\nA -> B\n@enduml\n");
        assert!(!blocks[0].auto_wrapped);
    }

    #[test]
    fn test_wrapping_looks_only_at_first_body_line() {
        let (_, blocks, _) = scan(
            b"{{plantuml\nA -> B\n@startuml\n}}\n\
              {{plantuml\n@startmindmap\n* root\n@endmindmap\n}}\n",
        );
        assert_eq!(blocks[0].content, b"@startuml\nA -> B\n@startuml\n@enduml\n");
        assert!(blocks[0].auto_wrapped);
        assert_eq!(blocks[1].content, b"@startmindmap\n* root\n@endmindmap\n");
        assert!(!blocks[1].auto_wrapped);
    }

    #[test]
    fn test_empty_first_line_is_wrapped() {
        let (_, blocks, _) = scan(b"{{plantuml\n\nA -> B\n}}\n");
        assert_eq!(blocks[0].content, b"@startuml\n\nA -> B\n@enduml\n");
    }

    #[test]
    fn test_empty_block_is_wrapped() {
        let (_, blocks, _) = scan(b"{{plantuml\n}}\n");
        assert_eq!(blocks[0].content, b"@startuml\n@enduml\n");
        assert!(blocks[0].auto_wrapped);
    }

    #[test]
    fn test_opening_delimiter_inside_block_is_content() {
        let (text, blocks, _) = scan(b"{{plantuml\nA -> B\n{{plantuml\n}}\nafter\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, b"@startuml\nA -> B\n{{plantuml\n@enduml\n");
        assert_eq!(text, lines(&["after"]));
    }

    #[test]
    fn test_unclosed_block_is_an_error() {
        let (text, blocks, result) = scan(b"intro\n\n{{plantuml\nA -> B\n");
        assert_eq!(text, lines(&["intro", ""]));
        assert!(blocks.is_empty());
        match result {
            Err(ScanError::UnclosedBlock { kind, line }) => {
                assert_eq!(kind, "plantuml");
                assert_eq!(line, 3);
            }
            Ok(()) => panic!("expected unclosed block error"),
        }
    }

    #[test]
    fn test_identical_bodies_produce_identical_bytes() {
        let (_, blocks, _) = scan(b"x\n{{plantuml\nA -> B\n}}\ny\nz\n{{diagram\nA -> B\n}}\n");
        assert_eq!(blocks[0].as_bytes(), blocks[1].as_bytes());
        assert_ne!(blocks[0].line, blocks[1].line);
    }

    #[test]
    fn test_non_utf8_bytes_are_kept() {
        let (text, blocks, result) = scan(b"caf\xe9\n{{plantuml\nAlice -> Jos\xe9\n}}\n\xff\xfe\n");
        result.unwrap();
        assert_eq!(text, vec![b"caf\xe9".to_vec(), b"\xff\xfe".to_vec()]);
        assert_eq!(blocks[0].as_bytes(), b"@startuml\nAlice -> Jos\xe9\n@enduml\n");
    }

    #[test]
    fn test_steps() {
        let syntax = MacroSyntax::default();
        let mut scanner = MacroScanner::new(&syntax);
        assert_eq!(scanner.feed(b"text"), Step::Text(b"text"));
        assert_eq!(scanner.feed(b"{{plantuml"), Step::Opened);
        assert_eq!(scanner.feed(b"A -> B"), Step::Collected);
        assert!(matches!(scanner.feed(b"}}"), Step::Closed(_)));
        assert_eq!(scanner.feed(b"}}"), Step::Text(b"}}"));
        scanner.finish().unwrap();
    }
}
