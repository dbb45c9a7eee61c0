//! Line-buffered diagnostic sink.

use std::collections::VecDeque;
use std::io::{self, Write};

/// Number of diagnostic lines retained for error reports.
const TAIL_LINES: usize = 20;

/// [`Write`] sink forwarding each complete line to `tracing`.
///
/// Bytes are buffered until a newline arrives; the line (minus any trailing
/// `\r`) is then emitted as an `info` event tagged with the tool name. A
/// trailing partial line is emitted on [`flush`](Write::flush) or drop.
///
/// The most recent lines are also kept in memory so that a failing tool's
/// last words can be attached to the error that reports it.
#[derive(Debug)]
pub struct ToolLog {
    tool: String,
    pending: Vec<u8>,
    tail: VecDeque<String>,
    emitted: usize,
}

impl ToolLog {
    /// Create a sink for the named tool.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            pending: Vec::new(),
            tail: VecDeque::with_capacity(TAIL_LINES),
            emitted: 0,
        }
    }

    /// The most recent lines, oldest first, joined with newlines.
    #[must_use]
    pub fn tail(&self) -> String {
        self.tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    fn emit(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.strip_suffix('\r').unwrap_or(&text);
        tracing::info!(tool = %self.tool, "{text}");
        if self.tail.len() == TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(text.to_owned());
        self.emitted += 1;
    }
}

impl Write for ToolLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line[..pos]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line);
        }
        Ok(())
    }
}

impl Drop for ToolLog {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
