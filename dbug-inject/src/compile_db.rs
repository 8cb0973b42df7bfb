//! Compilation database (`compile_commands.json`) loading.
//!
//! Each entry names a source file and the exact compiler invocation used to
//! build it. Only the flags that affect how the file parses are kept.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::InjectError;

/// Flags that take a value, either attached (`-Ifoo`) or as the next argument.
const VALUE_FLAGS: &[&str] = &["-isystem", "-iquote", "-idirafter", "-include", "-I", "-D", "-U", "-x"];
/// Flags whose value is a path relative to the entry's directory.
const PATH_FLAGS: &[&str] = &["-isystem", "-iquote", "-idirafter", "-include", "-I"];

#[derive(Debug, Deserialize)]
struct RawEntry {
    directory: Option<String>,
    file: Option<String>,
    command: Option<String>,
    arguments: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileEntry {
    /// Position in the database, for diagnostics.
    pub index: usize,
    pub directory: PathBuf,
    /// Source file, joined onto `directory` when relative.
    pub file: PathBuf,
    /// Parser arguments after normalisation.
    pub args: Vec<String>,
}

#[derive(Debug, Default)]
pub struct CompileDatabase {
    pub entries: Vec<CompileEntry>,
    /// Entries that could not be used, as `MalformedCompileEntry` errors.
    pub malformed: Vec<InjectError>,
}

impl CompileDatabase {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read compilation database {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&content, base)
            .with_context(|| format!("Failed to parse compilation database {}", path.display()))
    }

    /// Parse database JSON. Relative `directory` values are taken relative to `base`.
    pub fn from_json(content: &str, base: &Path) -> Result<Self> {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(content).context("expected a JSON array of entries")?;

        let mut db = CompileDatabase::default();
        for (index, value) in values.into_iter().enumerate() {
            match parse_entry(index, value, base) {
                Ok(entry) => db.entries.push(entry),
                Err(e) => db.malformed.push(e),
            }
        }
        debug!(entries = db.entries.len(), malformed = db.malformed.len(), "loaded compilation database");
        Ok(db)
    }
}

fn malformed(index: usize, reason: impl Into<String>) -> InjectError {
    InjectError::MalformedCompileEntry {
        index,
        reason: reason.into(),
    }
}

fn parse_entry(index: usize, value: serde_json::Value, base: &Path) -> Result<CompileEntry, InjectError> {
    let raw: RawEntry = serde_json::from_value(value).map_err(|e| malformed(index, e.to_string()))?;

    let directory = raw.directory.ok_or_else(|| malformed(index, "missing `directory`"))?;
    let file = raw.file.ok_or_else(|| malformed(index, "missing `file`"))?;

    let argv = match (raw.arguments, raw.command) {
        (Some(arguments), _) => arguments,
        (None, Some(command)) => shlex::split(&command)
            .ok_or_else(|| malformed(index, "`command` has unbalanced quotes"))?,
        (None, None) => return Err(malformed(index, "neither `arguments` nor `command` present")),
    };

    let directory = base.join(directory);
    let file = directory.join(file);
    let args = normalize_arguments(&argv, &directory);

    Ok(CompileEntry {
        index,
        directory,
        file,
        args,
    })
}

/// Reduce a compiler invocation to the arguments a parser needs.
///
/// Drops the compiler itself, `-c`, `-o <out>`, positional inputs and every
/// flag outside the include/define/language set. Relative include paths are
/// made absolute against `directory`.
pub fn normalize_arguments(argv: &[String], directory: &Path) -> Vec<String> {
    let mut args = Vec::new();
    let mut iter = argv.iter().skip(1);

    while let Some(arg) = iter.next() {
        if arg == "-o" {
            iter.next();
            continue;
        }
        if arg.starts_with("-std=") {
            args.push(arg.clone());
            continue;
        }

        let Some(flag) = VALUE_FLAGS.iter().find(|f| arg.starts_with(**f)) else {
            continue;
        };

        let value = if arg.len() > flag.len() {
            arg[flag.len()..].to_string()
        } else {
            match iter.next() {
                Some(v) => v.clone(),
                None => continue,
            }
        };

        let value = if PATH_FLAGS.contains(flag) {
            directory.join(&value).to_string_lossy().into_owned()
        } else {
            value
        };

        args.push(flag.to_string());
        args.push(value);
    }

    args
}
