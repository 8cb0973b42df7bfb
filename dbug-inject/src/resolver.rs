use crate::error::{InjectError, InjectResult};
use crate::locator::DefinitionCandidate;
use crate::text::{leading_whitespace, TextBuffer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertionMode {
    /// Splice into the existing line right after the byte offset of `{`.
    Inline { after_brace: usize },
    /// Insert a brand-new line; `line` becomes its index.
    NewLine,
}

/// Where and how one trace statement goes into the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPlan {
    /// For `Inline`, the line being edited. For `NewLine`, the index the new
    /// line takes (one past the brace line).
    pub line: usize,
    pub mode: InsertionMode,
    /// Marker text with its indentation already applied.
    pub payload: String,
}

/// Work out where `marker` belongs in the body of `candidate`.
///
/// Returns `Ok(None)` when the body already starts with the marker, and
/// `InconsistentCoordinates` when the recorded lines hold no opening brace.
pub fn resolve(
    candidate: &DefinitionCandidate,
    buffer: &TextBuffer,
    marker: &str,
) -> InjectResult<Option<InsertionPlan>> {
    if candidate.is_single_line() {
        resolve_inline(candidate, buffer, marker)
    } else {
        resolve_new_line(candidate, buffer, marker)
    }
}

fn resolve_inline(
    candidate: &DefinitionCandidate,
    buffer: &TextBuffer,
    marker: &str,
) -> InjectResult<Option<InsertionPlan>> {
    let line = candidate.body_start_line;
    let text = buffer
        .line(line)
        .ok_or_else(|| InjectError::inconsistent(line, "line is past the end of the file"))?;

    // The recorded column wins; other braces may precede the body on the line.
    let column = candidate.body_start_column;
    let brace = match text.get(column..column + 1) {
        Some("{") => column,
        _ => text
            .find('{')
            .ok_or_else(|| InjectError::inconsistent(line, "no `{` on single-line body"))?,
    };

    let rest = &text[brace + 1..];
    if rest.contains(marker) {
        return Ok(None);
    }

    Ok(Some(InsertionPlan {
        line,
        mode: InsertionMode::Inline { after_brace: brace + 1 },
        payload: format!("{}{}", leading_whitespace(rest), marker),
    }))
}

fn resolve_new_line(
    candidate: &DefinitionCandidate,
    buffer: &TextBuffer,
    marker: &str,
) -> InjectResult<Option<InsertionPlan>> {
    let start = candidate.body_start_line;
    let brace_line = (start..=candidate.body_end_line)
        .find(|&i| buffer.line(i).is_some_and(|l| l.contains('{')))
        .ok_or_else(|| InjectError::inconsistent(start, "no `{` between body start and end"))?;

    let following = buffer
        .line(brace_line + 1)
        .ok_or_else(|| InjectError::inconsistent(brace_line, "brace line is the last line"))?;
    if following.contains(marker) {
        return Ok(None);
    }

    Ok(Some(InsertionPlan {
        line: brace_line + 1,
        mode: InsertionMode::NewLine,
        payload: format!("{}{}", leading_whitespace(following), marker),
    }))
}
