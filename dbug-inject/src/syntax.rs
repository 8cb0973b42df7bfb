//! Read-only query interface over a parsed translation unit.
//!
//! The engine never depends on a particular C/C++ front end. Anything that can
//! hand back a tree of kinded, located nodes with a token stream satisfies
//! [`SourceUnit`]. [`SyntaxArena`] is the owned tree the bundled front end
//! produces, and is also convenient to build by hand in tests.

use std::path::{Path, PathBuf};

use crate::error::InjectResult;

/// Index of a node inside a [`SourceUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    TranslationUnit,
    /// Free function definition or declaration.
    Function,
    /// Member function, defined in-class or out-of-line (`A::f`).
    Method,
    /// Brace-delimited statement block.
    CompoundStatement,
    /// Any other construct, carrying the front end's own kind name.
    Other(String),
}

/// Identity of a file on disk.
///
/// Two spellings of a path that resolve to the same file compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId(PathBuf);

impl FileId {
    /// Canonicalises `path`, falling back to an absolute spelling when the
    /// file cannot be resolved (e.g. it does not exist yet).
    pub fn of(path: &Path) -> Self {
        match std::fs::canonicalize(path) {
            Ok(canonical) => FileId(canonical),
            Err(_) => {
                let absolute = std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf());
                FileId(absolute)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Where a node sits in the source. Lines are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    /// `None` for nodes with no backing file, such as the unit root.
    pub file: Option<FileId>,
    pub start_line: usize,
    /// Byte offset of the node's first character within `start_line`.
    pub start_column: usize,
    pub end_line: usize,
}

pub trait SourceUnit {
    fn root_node(&self) -> NodeId;
    fn children(&self, node: NodeId) -> &[NodeId];
    fn kind(&self, node: NodeId) -> &NodeKind;
    fn name(&self, node: NodeId) -> Option<&str>;
    fn tokens(&self, node: NodeId) -> Vec<&str>;
    fn location(&self, node: NodeId) -> &SourceRange;
}

/// A front end that turns a file into a [`SourceUnit`].
///
/// `args` are compiler-style arguments (include paths, defines, language
/// standard). Front ends that do not need them may ignore them.
pub trait Frontend: Sync {
    type Unit: SourceUnit;

    fn parse(&self, path: &Path, source: &str, args: &[String]) -> InjectResult<Self::Unit>;
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    name: Option<String>,
    range: SourceRange,
    children: Vec<NodeId>,
    tokens: std::ops::Range<usize>,
}

/// Owned syntax tree. Tokens are stored once, in source order, and each node
/// refers to the contiguous slice it covers.
#[derive(Debug, Clone, Default)]
pub struct SyntaxArena {
    nodes: Vec<NodeData>,
    tokens: Vec<String>,
}

impl SyntaxArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append tokens to the shared stream and return their index range.
    pub fn push_tokens<I, S>(&mut self, tokens: I) -> std::ops::Range<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = self.tokens.len();
        self.tokens.extend(tokens.into_iter().map(Into::into));
        start..self.tokens.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Add a node. The first node added is the root.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        name: Option<String>,
        range: SourceRange,
        tokens: std::ops::Range<usize>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            name,
            range,
            children: Vec::new(),
            tokens,
        });
        id
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
    }

    /// Widen a node's token slice once its descendants have been lexed.
    pub fn set_tokens(&mut self, node: NodeId, tokens: std::ops::Range<usize>) {
        self.nodes[node.0].tokens = tokens;
    }
}

impl SourceUnit for SyntaxArena {
    fn root_node(&self) -> NodeId {
        NodeId(0)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].name.as_deref()
    }

    fn tokens(&self, node: NodeId) -> Vec<&str> {
        self.tokens[self.nodes[node.0].tokens.clone()]
            .iter()
            .map(String::as_str)
            .collect()
    }

    fn location(&self, node: NodeId) -> &SourceRange {
        &self.nodes[node.0].range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_children_and_tokens() {
        let mut arena = SyntaxArena::new();
        let all = arena.push_tokens(["int", "f", "(", ")", "{", "}"]);
        let root = arena.add_node(
            NodeKind::TranslationUnit,
            None,
            SourceRange { file: None, start_line: 1, start_column: 0, end_line: 1 },
            all.clone(),
        );
        let func = arena.add_node(
            NodeKind::Function,
            Some("f".to_string()),
            SourceRange { file: None, start_line: 1, start_column: 0, end_line: 1 },
            all,
        );
        arena.add_child(root, func);

        assert_eq!(arena.root_node(), root);
        assert_eq!(arena.children(root), &[func]);
        assert_eq!(arena.name(func), Some("f"));
        assert_eq!(arena.tokens(func), vec!["int", "f", "(", ")", "{", "}"]);
        assert_eq!(arena.kind(func), &NodeKind::Function);
    }

    #[test]
    fn test_file_id_ignores_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.cc");
        std::fs::write(&file, "int x;\n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let roundabout = dir.path().join("sub").join("..").join("a.cc");
        assert_eq!(FileId::of(&file), FileId::of(&roundabout));
        assert_ne!(FileId::of(&file), FileId::of(&dir.path().join("b.cc")));
    }
}
