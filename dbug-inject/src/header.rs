use crate::text::TextBuffer;

/// Directives the header include is placed in front of.
const ANCHOR_DIRECTIVES: &[&str] = &["include", "if", "ifdef", "ifndef"];

/// True for `#include ...`, `#if ...`, `#ifdef ...` and `#ifndef ...`,
/// allowing whitespace around the `#`.
pub fn is_anchor_directive(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix('#') else {
        return false;
    };
    let rest = rest.trim_start();
    let word_end = rest
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    ANCHOR_DIRECTIVES.contains(&&rest[..word_end])
}

/// The quoted or bracketed target of an `#include`, delimiters kept.
fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("include")?.trim_start();
    let close = match rest.chars().next()? {
        '"' => '"',
        '<' => '>',
        _ => return None,
    };
    let end = rest[1..].find(close)? + 2;
    Some(&rest[..end])
}

/// Directive text without comments, with runs of whitespace collapsed.
fn normalized(line: &str) -> String {
    let code = line.split("//").next().unwrap_or(line);
    let code = code.split("/*").next().unwrap_or(code);
    let joined = code.split_whitespace().collect::<Vec<_>>().join(" ");
    match joined.strip_prefix("# ") {
        Some(rest) => format!("#{}", rest),
        None => joined,
    }
}

/// Whether `line` already provides `header_line`. Includes compare by target,
/// other directives by their normalized text.
pub fn provides_header(line: &str, header_line: &str) -> bool {
    match (include_target(line), include_target(header_line)) {
        (Some(have), Some(want)) => have == want,
        _ => normalized(line) == normalized(header_line),
    }
}

/// Insert `header_line` once, in front of the first include or conditional
/// directive, or at the top of the file when there is none.
///
/// Re-scans the buffer from scratch, so it must run after all body patches.
/// Returns false if the line was already present.
pub fn inject_header(buffer: &mut TextBuffer, header_line: &str) -> bool {
    if buffer.lines().any(|(_, l)| provides_header(l, header_line)) {
        return false;
    }

    let at = buffer
        .lines()
        .find(|(_, l)| is_anchor_directive(l))
        .map(|(i, _)| i)
        .unwrap_or(1);

    buffer.insert_line(at, header_line)
}
