use crate::error::{InjectError, InjectResult};
use crate::resolver::{InsertionMode, InsertionPlan};
use crate::text::TextBuffer;

/// Apply one plan to `buffer`. Returns whether the buffer changed.
///
/// The marker check runs again right before mutating, against whatever the
/// buffer holds now, so a stale plan can never produce a second marker.
pub fn apply(buffer: &mut TextBuffer, plan: &InsertionPlan, marker: &str) -> InjectResult<bool> {
    match plan.mode {
        InsertionMode::Inline { after_brace } => apply_inline(buffer, plan, after_brace, marker),
        InsertionMode::NewLine => apply_new_line(buffer, plan, marker),
    }
}

fn apply_inline(
    buffer: &mut TextBuffer,
    plan: &InsertionPlan,
    after_brace: usize,
    marker: &str,
) -> InjectResult<bool> {
    let text = buffer
        .line(plan.line)
        .ok_or_else(|| InjectError::inconsistent(plan.line, "line vanished before patching"))?;

    let brace_ok = after_brace > 0 && text.get(after_brace - 1..after_brace) == Some("{");
    if !brace_ok {
        return Err(InjectError::inconsistent(plan.line, "`{` moved before patching"));
    }

    let (prefix, rest) = text.split_at(after_brace);
    if starts_with_marker(rest, marker) {
        return Ok(false);
    }

    let patched = format!("{}{}{}", prefix, plan.payload, rest);
    Ok(buffer.replace_line(plan.line, &patched))
}

fn apply_new_line(buffer: &mut TextBuffer, plan: &InsertionPlan, marker: &str) -> InjectResult<bool> {
    let brace_line = plan.line.saturating_sub(1);
    let has_brace = buffer.line(brace_line).is_some_and(|l| l.contains('{'));
    if !has_brace {
        return Err(InjectError::inconsistent(brace_line, "`{` moved before patching"));
    }

    if buffer.line(plan.line).is_some_and(|l| starts_with_marker(l, marker)) {
        return Ok(false);
    }

    Ok(buffer.insert_line(plan.line, &plan.payload))
}

/// Whether the marker is the first thing in `text`. A marker further along
/// belongs to some other body that shares the line.
fn starts_with_marker(text: &str, marker: &str) -> bool {
    text.trim_start().starts_with(marker.trim())
}
