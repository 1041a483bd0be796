use std::sync::LazyLock;

use hdr_core::error::{AppError, ErrorKind};
use regex::Regex;

use crate::model::Chunk;

pub const DEFAULT_WINDOW_WORDS: usize = 2000;
pub const DEFAULT_OVERLAP_WORDS: usize = 300;

/// Sliding word-window splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    window: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW_WORDS,
            overlap: DEFAULT_OVERLAP_WORDS,
        }
    }
}

impl Chunker {
    pub fn new(window: usize, overlap: usize) -> Result<Self, AppError> {
        if window == 0 || overlap >= window {
            return Err(AppError::new(
                ErrorKind::InvalidInput,
                "CHUNKER_INVALID",
                "Chunk window must be positive and larger than the overlap",
            )
            .with_details(format!("window={window}; overlap={overlap}")));
        }
        Ok(Self { window, overlap })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into overlapping windows labelled with `source`.
    ///
    /// Sequence numbers advance once per window, so attribution labels
    /// ("Fragment N") stay tied to window position even if a window is skipped.
    pub fn split(&self, text: &str, source: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let total = words.len();

        let mut out = Vec::new();
        let mut start = 0usize;
        let mut sequence: u32 = 0;

        while start < total {
            let mut end = (start + self.window).min(total);

            if end < total {
                // Only an empty token is a safe cut point; normalized words never are,
                // so in practice the window stays full.
                let mut boundary = end;
                while boundary > start && !words[boundary - 1].is_empty() {
                    boundary -= 1;
                }
                if boundary > start {
                    end = boundary;
                }
            }

            let joined = words[start..end].join(" ");
            let trimmed = joined.trim();
            if !trimmed.is_empty() {
                out.push(Chunk::new(source, sequence, trimmed, start, end));
            }
            sequence += 1;

            if end >= total {
                break;
            }
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        out
    }
}

/// Collapse every whitespace run to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Patterns are compile-time constants; a bad one fails the chunking tests, not a user request.
fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("markdown regex {pattern:?} is invalid: {err}"),
    }
}

static HEADING: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^#+\s+"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\*(.+?)\*\*"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| compile(r"\*(.+?)\*"));
static LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"\[(.+?)\]\(.+?\)"));

/// Drop basic markdown syntax (headings, emphasis, links) keeping the visible text.
pub fn strip_markdown(text: &str) -> String {
    let text = HEADING.replace_all(text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    LINK.replace_all(&text, "$1").into_owned()
}
