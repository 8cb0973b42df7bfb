//! C/C++ front end backed by tree-sitter.
//!
//! The grammar is linked statically, so there is no shared library to locate
//! at startup. tree-sitter sees one file at a time and never expands
//! `#include`, so every node it produces belongs to the file being parsed.

use std::path::Path;

use tracing::{debug, warn};
use tree_sitter::{Node, Parser};

use crate::error::{InjectError, InjectResult};
use crate::syntax::{FileId, Frontend, NodeId, NodeKind, SourceRange, SyntaxArena};

#[derive(Debug, Clone, Default)]
pub struct CppFrontend {
    /// Reject trees that contain syntax errors instead of instrumenting
    /// whatever tree-sitter managed to recover.
    pub strict: bool,
}

impl CppFrontend {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    fn parser(path: &Path) -> InjectResult<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .map_err(|e| InjectError::parse(path, e.to_string()))?;
        Ok(parser)
    }
}

impl Frontend for CppFrontend {
    type Unit = SyntaxArena;

    fn parse(&self, path: &Path, source: &str, args: &[String]) -> InjectResult<SyntaxArena> {
        if !args.is_empty() {
            debug!(path = %path.display(), args = args.len(), "tree-sitter ignores compiler arguments");
        }

        // Columns then line up with the text buffer, which holds the mark aside.
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);

        let mut parser = Self::parser(path)?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| InjectError::parse(path, "parser returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            if self.strict {
                return Err(InjectError::parse(path, "source contains syntax errors"));
            }
            warn!(path = %path.display(), "syntax errors found, instrumenting recovered tree");
        }

        Ok(build_arena(root, source, FileId::of(path)))
    }
}

/// Convert a tree-sitter tree into an owned [`SyntaxArena`].
///
/// Named nodes become arena nodes, comments are dropped, and every other leaf
/// becomes a token. The walk is iterative so deeply nested expressions cannot
/// exhaust the stack.
fn build_arena(root: Node<'_>, source: &str, file: FileId) -> SyntaxArena {
    let mut arena = SyntaxArena::new();
    let mut cursor = root.walk();

    // Arena ids of the enclosing kept nodes.
    let mut ancestors: Vec<NodeId> = Vec::new();
    // Per cursor depth: whether that node was kept, and where its tokens begin.
    let mut frames: Vec<(bool, usize)> = Vec::new();

    'walk: loop {
        let node = cursor.node();
        let token_start = arena.token_count();

        let kept = node.id() == root.id() || (node.is_named() && !node.is_extra());
        if kept {
            let kind = node_kind(node);
            let name = match kind {
                NodeKind::Function | NodeKind::Method => function_name(node, source),
                _ => None,
            };
            let start = node.start_position();
            let range = SourceRange {
                file: (node.id() != root.id()).then(|| file.clone()),
                start_line: start.row + 1,
                start_column: start.column,
                end_line: node.end_position().row + 1,
            };
            let id = arena.add_node(kind, name, range, token_start..token_start);
            if let Some(&parent) = ancestors.last() {
                arena.add_child(parent, id);
            }
            ancestors.push(id);
        }

        if node.child_count() == 0 && node.kind() != "comment" {
            let text = source.get(node.byte_range()).unwrap_or_default();
            if !text.is_empty() {
                arena.push_tokens([text]);
            }
        }

        frames.push((kept, token_start));
        if cursor.goto_first_child() {
            continue;
        }

        loop {
            if let Some((kept, start)) = frames.pop() {
                if kept {
                    if let Some(id) = ancestors.pop() {
                        arena.set_tokens(id, start..arena.token_count());
                    }
                }
            }
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }

    arena
}

fn node_kind(node: Node<'_>) -> NodeKind {
    match node.kind() {
        "translation_unit" => NodeKind::TranslationUnit,
        "compound_statement" => NodeKind::CompoundStatement,
        "function_definition" if is_special_member(node) || is_function_template(node) => {
            NodeKind::Other("function_definition".to_string())
        }
        "function_definition" if is_method(node) => NodeKind::Method,
        "function_definition" => NodeKind::Function,
        other => NodeKind::Other(other.to_string()),
    }
}

/// Constructors, destructors and conversion operators.
///
/// These are the only definitions the grammar accepts without a return type.
fn is_special_member(node: Node<'_>) -> bool {
    if node.child_by_field_name("type").is_none() {
        return true;
    }
    let Some(mut name) = declarator_name(node) else {
        return true;
    };
    loop {
        match name.kind() {
            "destructor_name" | "operator_cast" => return true,
            "qualified_identifier" => match name.child_by_field_name("name") {
                Some(inner) => name = inner,
                None => return false,
            },
            _ => return false,
        }
    }
}

/// A definition introduced by its own `template <...>` header.
///
/// Out-of-line members of a class template (`Box<T>::set`) and explicit
/// specializations (`template <>`) are ordinary functions.
fn is_function_template(node: Node<'_>) -> bool {
    let Some(template) = node.parent().filter(|p| p.kind() == "template_declaration") else {
        return false;
    };
    if template.parent().is_some_and(|p| p.kind() == "template_declaration") {
        return true;
    }
    let specialization = template
        .child_by_field_name("parameters")
        .is_some_and(|params| params.named_child_count() == 0);
    if specialization {
        return false;
    }
    !declarator_name(node).is_some_and(has_template_scope)
}

fn has_template_scope(name: Node<'_>) -> bool {
    let mut current = name;
    while current.kind() == "qualified_identifier" {
        if current
            .child_by_field_name("scope")
            .is_some_and(|scope| scope.kind() == "template_type")
        {
            return true;
        }
        match current.child_by_field_name("name") {
            Some(inner) => current = inner,
            None => break,
        }
    }
    false
}

fn is_method(node: Node<'_>) -> bool {
    let mut parent = node.parent();
    while let Some(p) = parent {
        match p.kind() {
            "field_declaration_list" => return true,
            "template_declaration" => parent = p.parent(),
            _ => break,
        }
    }

    declarator_name(node).is_some_and(|name| name.kind() == "qualified_identifier")
}

/// Follow the `declarator` chain through pointer/reference wrappers down to
/// the `function_declarator`.
fn function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        if current.kind() == "function_declarator" {
            return Some(current);
        }
        // `reference_declarator` wraps its declarator without a field name.
        current = match current.child_by_field_name("declarator") {
            Some(inner) => inner,
            None if current.kind() == "reference_declarator" => current.named_child(0)?,
            None => return None,
        };
    }
}

fn declarator_name(node: Node<'_>) -> Option<Node<'_>> {
    function_declarator(node)?.child_by_field_name("declarator")
}

fn function_name(node: Node<'_>, source: &str) -> Option<String> {
    let name = declarator_name(node)?;
    source.get(name.byte_range()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SourceUnit;

    fn parse(source: &str) -> SyntaxArena {
        CppFrontend::default()
            .parse(Path::new("unit.cc"), source, &[])
            .unwrap()
    }

    fn functions(unit: &SyntaxArena) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![unit.root_node()];
        while let Some(node) = stack.pop() {
            if matches!(unit.kind(node), NodeKind::Function | NodeKind::Method) {
                found.push(node);
            }
            stack.extend(unit.children(node).iter().copied());
        }
        found
    }

    #[test]
    fn test_root_has_no_file() {
        let unit = parse("int f() { return 1; }\n");
        let root = unit.root_node();
        assert_eq!(unit.kind(root), &NodeKind::TranslationUnit);
        assert!(unit.location(root).file.is_none());
    }

    #[test]
    fn test_free_function_lines_and_name() {
        let unit = parse("int f() {\n    return 1;\n}\n");
        let funcs = functions(&unit);
        assert_eq!(funcs.len(), 1);

        let f = funcs[0];
        assert_eq!(unit.kind(f), &NodeKind::Function);
        assert_eq!(unit.name(f), Some("f"));
        assert_eq!(unit.location(f).start_line, 1);
        assert_eq!(unit.location(f).end_line, 3);
        assert!(unit.location(f).file.is_some());

        let body = unit
            .children(f)
            .iter()
            .copied()
            .find(|&c| unit.kind(c) == &NodeKind::CompoundStatement)
            .unwrap();
        assert_eq!(unit.location(body).start_line, 1);
        assert_eq!(unit.location(body).end_line, 3);
    }

    #[test]
    fn test_methods_are_classified() {
        let source = "class A {\n  void g() {}\n};\nvoid A::h() {}\nvoid free_fn() {}\n";
        let unit = parse(source);
        let mut kinds: Vec<(String, NodeKind)> = functions(&unit)
            .into_iter()
            .map(|n| (unit.name(n).unwrap_or("").to_string(), unit.kind(n).clone()))
            .collect();
        kinds.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            kinds,
            vec![
                ("A::h".to_string(), NodeKind::Method),
                ("free_fn".to_string(), NodeKind::Function),
                ("g".to_string(), NodeKind::Method),
            ]
        );
    }

    /// Start line and kind of every `function_definition`, whatever it was classified as.
    fn definitions(unit: &SyntaxArena) -> Vec<(usize, NodeKind)> {
        let mut found = Vec::new();
        let mut stack = vec![unit.root_node()];
        while let Some(node) = stack.pop() {
            let kind = unit.kind(node);
            let definition = match kind {
                NodeKind::Function | NodeKind::Method => true,
                NodeKind::Other(name) => name == "function_definition",
                _ => false,
            };
            if definition {
                found.push((unit.location(node).start_line, kind.clone()));
            }
            stack.extend(unit.children(node).iter().copied());
        }
        found.sort_by_key(|(line, _)| *line);
        found
    }

    #[test]
    fn test_special_members_and_templates_are_other() {
        let source = "\
class A {
 public:
  explicit A(int s) : s_(s) {}
  ~A() { s_ = 0; }
  operator bool() const { return s_ != 0; }
  template <class U> U as() const { return U(s_); }
  int get() const { return s_; }
  int s_;
};
A::A() : s_(0) {}
A::~A() {}
template <class T> T* Make() { return new T; }
template <> int* Make<int>() { return nullptr; }
template <class T> struct Box { T get() const { return v; } T v; };
template <class T> void Box<T>::set(T x) { v = x; }
";
        let other = || NodeKind::Other("function_definition".to_string());
        assert_eq!(
            definitions(&parse(source)),
            vec![
                (3, other()),
                (4, other()),
                (5, other()),
                (6, other()),
                (7, NodeKind::Method),
                (10, other()),
                (11, other()),
                (12, other()),
                (13, NodeKind::Function),
                (14, NodeKind::Method),
                (15, NodeKind::Method),
            ]
        );
    }

    #[test]
    fn test_reference_and_pointer_returns_keep_their_name() {
        let unit = parse("int& first(int* v) { return v[0]; }\nconst char* name() { return \"x\"; }\n");
        let mut names: Vec<&str> = functions(&unit).into_iter().filter_map(|n| unit.name(n)).collect();
        names.sort();
        assert_eq!(names, vec!["first", "name"]);
    }

    #[test]
    fn test_columns_skip_byte_order_mark() {
        let unit = parse("\u{feff}int f() { return 1; }\n");
        let f = functions(&unit)[0];
        let body = unit
            .children(f)
            .iter()
            .copied()
            .find(|&c| unit.kind(c) == &NodeKind::CompoundStatement)
            .unwrap();
        assert_eq!(unit.location(f).start_column, 0);
        assert_eq!(unit.location(body).start_column, 8);
    }

    #[test]
    fn test_tokens_cover_signature_and_body() {
        let unit = parse("constexpr int sq(int x) { return x * x; }\n");
        let f = functions(&unit)[0];
        let tokens = unit.tokens(f);
        assert_eq!(tokens.first(), Some(&"constexpr"));
        assert!(tokens.contains(&"return"));
        assert_eq!(tokens.last(), Some(&"}"));
    }

    #[test]
    fn test_comments_are_not_tokens() {
        let unit = parse("int f() { /* constexpr */ return 1; }\n");
        let f = functions(&unit)[0];
        assert!(!unit.tokens(f).contains(&"constexpr"));
        assert!(!unit.tokens(f).iter().any(|t| t.contains("constexpr")));
    }

    #[test]
    fn test_strict_mode_rejects_syntax_errors() {
        let broken = "int f( { return 1; }\n";
        let strict = CppFrontend::new(true).parse(Path::new("broken.cc"), broken, &[]);
        assert!(matches!(strict, Err(InjectError::Parse { .. })));

        let lenient = CppFrontend::new(false).parse(Path::new("broken.cc"), broken, &[]);
        assert!(lenient.is_ok());
    }
}
