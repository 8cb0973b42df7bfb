//! Finds the function and method definitions that should be instrumented.
//!
//! Candidates come out in descending line order: every child subtree is
//! walked before its parent, and siblings are walked bottom-up. Patching the
//! candidates in that order means an inserted line only ever shifts text
//! below the definitions still waiting their turn.

use tracing::debug;

use crate::syntax::{FileId, NodeId, NodeKind, SourceRange, SourceUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Function,
    Method,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionCandidate {
    pub kind: DefinitionKind,
    pub name: Option<String>,
    /// False when the definition's tokens mention `constexpr`.
    pub qualifies: bool,
    /// First line of the compound body (the line holding `{`).
    pub body_start_line: usize,
    /// Byte column of the body's `{` on `body_start_line`.
    pub body_start_column: usize,
    /// Last line of the compound body (the line holding `}`).
    pub body_end_line: usize,
    pub declared_in: Option<FileId>,
}

impl DefinitionCandidate {
    pub fn is_single_line(&self) -> bool {
        self.body_start_line == self.body_end_line
    }
}

/// Lexical check: any token spelled `constexpr` anywhere in the definition.
pub fn is_constexpr<U: SourceUnit>(unit: &U, node: NodeId) -> bool {
    unit.tokens(node).iter().any(|t| *t == "constexpr")
}

/// Location of the first compound-statement child, if the node has a body.
pub fn body_range<U: SourceUnit>(unit: &U, node: NodeId) -> Option<&SourceRange> {
    unit.children(node)
        .iter()
        .find(|&&child| unit.kind(child) == &NodeKind::CompoundStatement)
        .map(|&body| unit.location(body))
}

/// Every definition in `unit` that belongs to `file`, qualifying or not,
/// in patch-safe order. Definitions without a compound body are left out.
pub fn definitions<U: SourceUnit>(unit: &U, file: &FileId) -> Vec<DefinitionCandidate> {
    let mut found = Vec::new();
    visit(unit, unit.root_node(), file, &mut found);
    found
}

/// The candidates that actually need a trace statement.
pub fn locate<U: SourceUnit>(unit: &U, file: &FileId) -> Vec<DefinitionCandidate> {
    definitions(unit, file)
        .into_iter()
        .filter(|c| {
            if !c.qualifies {
                debug!(name = c.name.as_deref().unwrap_or("?"), line = c.body_start_line, "skipping constexpr definition");
            }
            c.qualifies
        })
        .collect()
}

fn visit<U: SourceUnit>(unit: &U, node: NodeId, file: &FileId, out: &mut Vec<DefinitionCandidate>) {
    // Nodes pulled in from other files are pruned with their whole subtree.
    if let Some(owner) = &unit.location(node).file {
        if owner != file {
            return;
        }
    }

    // Right to left within a line, so column offsets of pending inline
    // insertions stay valid too.
    let mut children: Vec<NodeId> = unit.children(node).to_vec();
    children.sort_by_key(|&child| {
        let range = unit.location(child);
        std::cmp::Reverse((range.start_line, range.start_column))
    });
    for child in children {
        visit(unit, child, file, out);
    }

    let kind = match unit.kind(node) {
        NodeKind::Function => DefinitionKind::Function,
        NodeKind::Method => DefinitionKind::Method,
        _ => return,
    };

    let Some(body) = body_range(unit, node) else {
        return;
    };

    out.push(DefinitionCandidate {
        kind,
        name: unit.name(node).map(str::to_string),
        qualifies: !is_constexpr(unit, node),
        body_start_line: body.start_line,
        body_start_column: body.start_column,
        body_end_line: body.end_line,
        declared_in: unit.location(node).file.clone(),
    });
}
