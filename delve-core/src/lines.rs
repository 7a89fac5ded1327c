//! Line-oriented parsing of oracle replies.
//!
//! Every stage that reads a list out of free text (sub-queries, gaps,
//! rewritten queries, selected titles) goes through [`LineContract`]:
//! comment lines are discarded, a leading bullet or enumeration marker is
//! stripped, blank lines are dropped, and the result is capped.

/// Marker that turns a whole line into a comment.
pub const COMMENT_MARKER: char = '#';

const BULLETS: [&str; 5] = ["- ", "* ", "+ ", "• ", "・"];

/// Result of applying a [`LineContract`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLines {
    pub lines: Vec<String>,
    /// Usable lines dropped by the cap.
    pub truncated: usize,
}

impl ParsedLines {
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// The shared parsing contract for list-shaped oracle output.
#[derive(Debug, Clone, Copy)]
pub struct LineContract {
    max: usize,
}

impl LineContract {
    /// Keep at most `max` lines.
    pub fn capped(max: usize) -> Self {
        Self { max }
    }

    pub fn parse(&self, text: &str) -> ParsedLines {
        let mut lines = Vec::new();
        let mut truncated = 0;
        for line in text.lines().filter_map(clean_line) {
            if lines.len() < self.max {
                lines.push(line.to_string());
            } else {
                truncated += 1;
            }
        }
        ParsedLines { lines, truncated }
    }
}

/// Normalize one raw line, or `None` if it carries nothing usable.
fn clean_line(raw: &str) -> Option<&str> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with(COMMENT_MARKER) {
        return None;
    }
    let line = strip_marker(line);
    if line.is_empty() { None } else { Some(line) }
}

/// Strip one leading bullet (`-`, `*`, `+`, `•`, `・`) or enumeration (`1.`, `2)`).
fn strip_marker(line: &str) -> &str {
    if line == "-" || line == "*" || line == "+" || line == "•" {
        return "";
    }
    for bullet in BULLETS {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim();
        }
    }
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && digits <= 3 {
        let rest = &line[digits..];
        for sep in [". ", ") ", "."] {
            if let Some(rest) = rest.strip_prefix(sep) {
                if sep == "." && !rest.is_empty() && !rest.starts_with(' ') {
                    // "3.5 billion parameters" is content, not an enumeration.
                    continue;
                }
                return rest.trim();
            }
        }
    }
    line
}

/// Whether `sentinel` occurs anywhere in `text` (case-sensitive).
pub fn contains_sentinel(text: &str, sentinel: &str) -> bool {
    text.contains(sentinel)
}
