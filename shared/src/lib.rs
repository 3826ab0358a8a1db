pub const DEFAULT_PORT: u16 = 1234;
pub const NAME_PREFIX: &str = "NAME::";
pub const TEXT_PREFIX: &str = "TXT::";
pub const LINE_TERMINATOR: u8 = b'\n';

/// A single inbound line, classified by its prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `NAME::<name>` binds the sender's display name
    Name(String),
    /// `TXT::<content>` is fanned out to every other session
    Text(String),
    /// Anything else, dropped without a reply
    Unknown,
}

impl Line {
    /// Classifies a line that has already had its `\n` removed.
    ///
    /// The remainder after the prefix is taken verbatim: no trimming,
    /// no validation and no length limit.
    pub fn parse(line: &str) -> Self {
        if let Some(name) = line.strip_prefix(NAME_PREFIX) {
            Line::Name(name.to_string())
        } else if let Some(content) = line.strip_prefix(TEXT_PREFIX) {
            Line::Text(content.to_string())
        } else {
            Line::Unknown
        }
    }
}

/// Builds the outbound line sent to other sessions: `TXT::<name>: <content>\n`
pub fn format_text(name: &str, content: &str) -> String {
    format!("{TEXT_PREFIX}{name}: {content}\n")
}

/// Accumulates raw socket bytes and hands back complete lines.
///
/// Bytes after the last `\n` stay buffered until the terminator arrives
/// in a later read.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to contain no terminator
    searched: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Removes and returns the next complete line without its terminator.
    /// Invalid UTF-8 is replaced with U+FFFD.
    pub fn next_line(&mut self) -> Option<String> {
        let Some(offset) = self.pending[self.searched..]
            .iter()
            .position(|b| *b == LINE_TERMINATOR)
        else {
            self.searched = self.pending.len();
            return None;
        };

        let end = self.searched + offset;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        self.searched = 0;
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    /// Number of buffered bytes not yet part of a complete line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
