//! Line framing for the report transport.
//!
//! Codecov report uploads wrap the coverage XML in a line-oriented
//! transport body. Three fixed sentinel lines delimit its sections;
//! everything else is either transport noise or XML payload.

/// Marks the end of the outer transport preamble
pub const NETWORK_MARKER: &[u8] = b"<<<<<< network";

/// Marks the start of the embedded XML body
pub const PATH_MARKER: &[u8] = b"# path=coverage.xml";

/// Marks the end of the embedded XML body
pub const EOF_MARKER: &[u8] = b"<<<<<< EOF";

/// Classification of a single complete line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// `<<<<<< network`
    NetworkMarker,
    /// `# path=coverage.xml`
    PathMarker,
    /// `<<<<<< EOF`
    EofMarker,
    /// Any other line
    Ordinary,
}

/// Classify a complete line (without its `\n` terminator)
pub fn classify(line: &[u8]) -> LineClass {
    if line == NETWORK_MARKER {
        LineClass::NetworkMarker
    } else if line == PATH_MARKER {
        LineClass::PathMarker
    } else if line == EOF_MARKER {
        LineClass::EofMarker
    } else {
        LineClass::Ordinary
    }
}

/// Splits an incoming byte stream into `\n`-delimited lines.
///
/// Chunks arrive with arbitrary boundaries; a partial trailing line is
/// buffered until its terminator shows up in a later chunk. `finish`
/// drains whatever unterminated tail remains when the stream closes.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every line completed by it, in order,
    /// each without its terminator.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let mut line = std::mem::take(&mut self.pending);
            line.extend_from_slice(&rest[..pos]);
            lines.push(line);
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);
        lines
    }

    /// Drain the unterminated trailing line, if any
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
