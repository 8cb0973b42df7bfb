//! Per-file engine: plan every insertion first, then apply the plans in order
//! to a private copy of the text.

use tracing::{debug, warn};

use crate::header::inject_header;
use crate::locator::{locate, DefinitionCandidate};
use crate::patcher;
use crate::resolver::{resolve, InsertionPlan};
use crate::syntax::{FileId, SourceUnit};
use crate::text::TextBuffer;

/// A resolved insertion together with the definition it belongs to.
#[derive(Debug, Clone)]
pub struct PlannedInsertion {
    pub candidate: DefinitionCandidate,
    pub plan: InsertionPlan,
}

#[derive(Debug, Clone, Default)]
pub struct PlanSet {
    /// In patch order: highest line first.
    pub insertions: Vec<PlannedInsertion>,
    pub already_instrumented: usize,
    pub inconsistent: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub instrumented: usize,
    pub already_instrumented: usize,
    pub inconsistent: usize,
    pub header_added: bool,
}

/// Outcome of instrumenting one file's text.
#[derive(Debug, Clone)]
pub struct Instrumented {
    pub report: FileReport,
    /// Rewritten content, or `None` when nothing changed and the file must be
    /// left byte-identical.
    pub output: Option<String>,
}

/// Resolve every qualifying definition in `unit` against `buffer`.
///
/// Plans are built against the unpatched buffer. That is sound because the
/// locator's order puts every pending definition above every earlier edit.
pub fn plan<U: SourceUnit>(unit: &U, file: &FileId, buffer: &TextBuffer, marker: &str) -> PlanSet {
    let mut set = PlanSet::default();

    for candidate in locate(unit, file) {
        match resolve(&candidate, buffer, marker) {
            Ok(Some(plan)) => set.insertions.push(PlannedInsertion { candidate, plan }),
            Ok(None) => set.already_instrumented += 1,
            Err(e) => {
                debug!(name = candidate.name.as_deref().unwrap_or("?"), error = %e, "skipping definition");
                set.inconsistent += 1;
            }
        }
    }

    // Same-line siblings keep locator order; only the line matters for shifts.
    set.insertions.sort_by(|a, b| b.plan.line.cmp(&a.plan.line));
    set
}

/// Run the whole per-file pipeline on `source`.
pub fn instrument<U: SourceUnit>(
    unit: &U,
    file: &FileId,
    source: &str,
    marker: &str,
    header_line: &str,
) -> Instrumented {
    let original = TextBuffer::new(source);
    let planned = plan(unit, file, &original, marker);

    let mut report = FileReport {
        already_instrumented: planned.already_instrumented,
        inconsistent: planned.inconsistent,
        ..FileReport::default()
    };

    let mut buffer = original.clone();
    for insertion in &planned.insertions {
        match patcher::apply(&mut buffer, &insertion.plan, marker) {
            Ok(true) => report.instrumented += 1,
            Ok(false) => report.already_instrumented += 1,
            Err(e) => {
                warn!(path = %file.path().display(), error = %e, "plan no longer matches text");
                report.inconsistent += 1;
            }
        }
    }

    if report.instrumented == 0 {
        return Instrumented { report, output: None };
    }

    report.header_added = inject_header(&mut buffer, header_line);
    Instrumented {
        report,
        output: Some(buffer.render()),
    }
}
