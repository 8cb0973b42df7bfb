use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{InjectError, InjectResult};

pub const DEFAULT_MARKER: &str = "DBUG_TRACE;";
pub const DEFAULT_HEADER_LINE: &str = "#include \"dbug.h\"";

/// Everything the engine needs to know about one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Only files under this directory are instrumented in database mode.
    pub root: PathBuf,
    /// Include line added to every instrumented file, e.g. `#include "dbug.h"`.
    pub header_line: String,
    /// Statement inserted at the top of every body. Also the idempotency key.
    pub marker: String,
    /// Glob patterns (or plain substrings) for files that are never touched.
    pub skip_patterns: Vec<String>,
    /// Extensions picked up when walking directories, without the dot.
    pub extensions: Vec<String>,
    pub compile_db: Option<PathBuf>,
    /// Extra parser arguments used for every file in directory mode.
    pub parser_args: Vec<String>,
    /// Worker threads. 1 keeps the sequential order, 0 uses every core.
    pub jobs: usize,
    /// Skip files whose parse tree contains syntax errors.
    pub strict_syntax: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            header_line: DEFAULT_HEADER_LINE.to_string(),
            marker: DEFAULT_MARKER.to_string(),
            skip_patterns: vec![
                "**/dbug.h".to_string(),
                "**/dbug.cc".to_string(),
                "**/*test.cc".to_string(),
                "**/*test?.cc".to_string(),
            ],
            extensions: ["h", "hpp", "cc", "cpp"].iter().map(|s| s.to_string()).collect(),
            compile_db: None,
            parser_args: Vec::new(),
            jobs: 1,
            strict_syntax: false,
        }
    }
}

impl Settings {
    /// Load settings from a JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let ext = path.extension().and_then(|s| s.to_str());
        let settings: Settings = if ext == Some("yaml") || ext == Some("yml") {
            serde_yaml::from_str(&content).context("Failed to parse config YAML")?
        } else {
            // Try JSON first, fall back to YAML if JSON fails
            serde_json::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .context("Failed to parse config (tried both JSON and YAML)")?
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> InjectResult<()> {
        for (what, value) in [("marker", &self.marker), ("header_line", &self.header_line)] {
            if value.trim().is_empty() {
                return Err(InjectError::Config(format!("{} must not be empty", what)));
            }
            if value.contains('\n') || value.contains('\r') {
                return Err(InjectError::Config(format!("{} must be a single line", what)));
            }
        }
        Ok(())
    }

    /// Worker count with `0` resolved to the number of available cores.
    pub fn effective_jobs(&self) -> usize {
        match self.jobs {
            0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            n => n,
        }
    }

    pub fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Whether `path` matches one of the skip patterns.
    ///
    /// Patterns containing glob characters are matched as globs; anything else
    /// is a substring match on the path.
    pub fn is_skipped(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.skip_patterns.iter().any(|pattern| {
            if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
                glob::Pattern::new(pattern)
                    .map(|p| p.matches(&path_str))
                    .unwrap_or(false)
            } else {
                path_str.contains(pattern.as_str())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.marker, "DBUG_TRACE;");
        assert_eq!(settings.header_line, "#include \"dbug.h\"");
        assert_eq!(settings.jobs, 1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_skip_patterns() {
        let settings = Settings::default();
        assert!(settings.is_skipped(Path::new("src/util/dbug.h")));
        assert!(settings.is_skipped(Path::new("src/util/dbug.cc")));
        assert!(settings.is_skipped(Path::new("db/db_test.cc")));
        assert!(settings.is_skipped(Path::new("db/db_tests.cc")));
        assert!(!settings.is_skipped(Path::new("db/db_impl.cc")));
        assert!(!settings.is_skipped(Path::new("db/testing.h")));
    }

    #[test]
    fn test_substring_skip_pattern() {
        let settings = Settings {
            skip_patterns: vec!["third_party/".to_string()],
            ..Settings::default()
        };
        assert!(settings.is_skipped(Path::new("src/third_party/zlib/inflate.cc")));
        assert!(!settings.is_skipped(Path::new("src/table/format.cc")));
    }

    #[test]
    fn test_extensions() {
        let settings = Settings::default();
        assert!(settings.has_extension(Path::new("a/b.cc")));
        assert!(settings.has_extension(Path::new("a/b.hpp")));
        assert!(!settings.has_extension(Path::new("a/b.rs")));
        assert!(!settings.has_extension(Path::new("Makefile")));
    }

    #[test]
    fn test_validate_rejects_multiline_marker() {
        let settings = Settings {
            marker: "A;\nB;".to_string(),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(InjectError::Config(_))));

        let settings = Settings {
            header_line: "  ".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "marker: \"TRACE_FN;\"\njobs: 4").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.marker, "TRACE_FN;");
        assert_eq!(settings.jobs, 4);
        assert_eq!(settings.header_line, DEFAULT_HEADER_LINE);
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r##"{{"header_line": "#include \"trace.h\"", "extensions": ["c"]}}"##).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.header_line, "#include \"trace.h\"");
        assert_eq!(settings.extensions, vec!["c".to_string()]);
        assert_eq!(settings.marker, DEFAULT_MARKER);
    }
}
