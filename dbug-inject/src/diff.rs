use similar::{ChangeTag, TextDiff};
use std::path::Path;

/// Line counts for the rewrites of a batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffStats {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl DiffStats {
    pub fn add(&mut self, other: &DiffStats) {
        self.files_changed += other.files_changed;
        self.lines_added += other.lines_added;
        self.lines_removed += other.lines_removed;
    }

    pub fn print_summary(&self) {
        println!("\nDiff summary:");
        println!("Files changed: {}", self.files_changed);
        println!("Lines added: {}", self.lines_added);
        println!("Lines removed: {}", self.lines_removed);
    }
}

/// Unified diff of one rewritten file, with its statistics.
///
/// An inline insertion shows up as one removed and one added line; a new-line
/// insertion as a single added line.
pub fn unified_diff(path: &Path, original: &str, modified: &str) -> (String, DiffStats) {
    let diff = TextDiff::from_lines(original, modified);
    let mut stats = DiffStats::default();

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.lines_added += 1,
            ChangeTag::Delete => stats.lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }
    if stats.lines_added > 0 || stats.lines_removed > 0 {
        stats.files_changed = 1;
    }

    let name = path.display().to_string();
    let output = diff
        .unified_diff()
        .context_radius(3)
        .header(&name, &name)
        .to_string();

    (output, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_line_insertion_diff() {
        let original = "int f() {\n    return 1;\n}\n";
        let modified = "int f() {\n    DBUG_TRACE;\n    return 1;\n}\n";

        let (diff, stats) = unified_diff(Path::new("src/f.cc"), original, modified);
        assert!(diff.contains("--- src/f.cc"));
        assert!(diff.contains("+++ src/f.cc"));
        assert!(diff.contains("+    DBUG_TRACE;"));
        assert_eq!(
            stats,
            DiffStats { files_changed: 1, lines_added: 1, lines_removed: 0 }
        );
    }

    #[test]
    fn test_inline_insertion_diff() {
        let original = "int f() { return 1; }\n";
        let modified = "int f() { DBUG_TRACE; return 1; }\n";

        let (_, stats) = unified_diff(Path::new("f.cc"), original, modified);
        assert_eq!(stats.lines_added, 1);
        assert_eq!(stats.lines_removed, 1);
    }

    #[test]
    fn test_identical_content() {
        let (diff, stats) = unified_diff(Path::new("f.cc"), "int x;\n", "int x;\n");
        assert!(!diff.contains("@@"));
        assert_eq!(stats, DiffStats::default());
    }

    #[test]
    fn test_stats_add() {
        let mut total = DiffStats { files_changed: 1, lines_added: 5, lines_removed: 2 };
        total.add(&DiffStats { files_changed: 2, lines_added: 3, lines_removed: 1 });
        assert_eq!(total, DiffStats { files_changed: 3, lines_added: 8, lines_removed: 3 });
    }
}
