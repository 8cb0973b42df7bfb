//! Line-indexed view of one file's content.
//!
//! Lines are addressed with 1-based indices, matching the line numbers the
//! parser reports. Rendering an unmodified buffer reproduces the original
//! bytes exactly: carriage returns stay attached to their lines and the
//! presence or absence of a final newline is remembered. A leading byte
//! order mark is kept out of line 1 and written back in front of everything.

const BOM: char = '\u{feff}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
    trailing_newline: bool,
    crlf: bool,
    bom: bool,
}

impl TextBuffer {
    pub fn new(content: &str) -> Self {
        let (content, bom) = match content.strip_prefix(BOM) {
            Some(rest) => (rest, true),
            None => (content, false),
        };
        let (body, trailing_newline) = match content.strip_suffix('\n') {
            Some(body) => (body, true),
            None => (content, false),
        };

        let lines: Vec<String> = if content.is_empty() {
            Vec::new()
        } else {
            body.split('\n').map(str::to_string).collect()
        };

        let crlf = lines.first().is_some_and(|l| l.ends_with('\r'));

        Self {
            lines,
            trailing_newline,
            crlf,
            bom,
        }
    }

    /// Content of line `index` without its line terminator.
    pub fn line(&self, index: usize) -> Option<&str> {
        let raw = self.lines.get(index.checked_sub(1)?)?;
        Some(raw.strip_suffix('\r').unwrap_or(raw))
    }

    /// Iterate `(index, content)` pairs, 1-based.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, raw)| (i + 1, raw.strip_suffix('\r').unwrap_or(raw)))
    }

    /// Insert `text` so that it becomes line `index`, shifting every later
    /// line down by one. `index` may be `len() + 1` to append.
    ///
    /// Returns false without touching the buffer when `index` is out of range.
    pub fn insert_line(&mut self, index: usize, text: &str) -> bool {
        if index == 0 || index > self.lines.len() + 1 {
            return false;
        }
        let mut line = text.to_string();
        if self.crlf {
            line.push('\r');
        }
        self.lines.insert(index - 1, line);
        true
    }

    /// Replace the content of line `index`, keeping its line terminator.
    pub fn replace_line(&mut self, index: usize, text: &str) -> bool {
        let Some(raw) = index.checked_sub(1).and_then(|i| self.lines.get_mut(i)) else {
            return false;
        };
        let had_cr = raw.ends_with('\r');
        *raw = text.to_string();
        if had_cr {
            raw.push('\r');
        }
        true
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push(BOM);
        }
        out.push_str(&self.lines.join("\n"));
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
impl TextBuffer {
    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    /// Number of lines whose content contains `needle`.
    pub(crate) fn count_containing(&self, needle: &str) -> usize {
        self.lines().filter(|(_, l)| l.contains(needle)).count()
    }
}

/// Leading run of spaces and tabs.
pub fn leading_whitespace(s: &str) -> &str {
    let end = s
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(s.len());
    &s[..end]
}
