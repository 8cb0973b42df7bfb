//! Drives the per-file pipeline over a batch of files.
//!
//! Every file is independent: a failure in one is logged and counted, and the
//! batch moves on. A file is either rewritten in full or not touched at all.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::compile_db::CompileDatabase;
use crate::config::Settings;
use crate::error::{InjectError, InjectResult};
use crate::instrument::{instrument, plan, FileReport};
use crate::locator::DefinitionCandidate;
use crate::syntax::{FileId, Frontend};
use crate::text::TextBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Apply,
    DryRun,
}

/// One file to process and the parser arguments for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub path: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug)]
pub enum FileOutcome {
    /// Rewritten on disk, or would be in a dry run.
    Instrumented {
        report: FileReport,
        original: String,
        rewritten: String,
    },
    /// Nothing to insert; the file was not written.
    Unchanged(FileReport),
    Failed(InjectError),
}

#[derive(Debug)]
pub struct FileResult {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub modified: usize,
    pub unchanged: usize,
    /// Excluded before processing: outside the root, skip pattern, duplicate.
    pub skipped: usize,
    pub malformed_entries: usize,
    pub read_failures: usize,
    pub parse_failures: usize,
    pub write_failures: usize,
    pub functions_instrumented: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        self.processed += 1;
        match outcome {
            FileOutcome::Instrumented { report, .. } => {
                self.modified += 1;
                self.functions_instrumented += report.instrumented;
            }
            FileOutcome::Unchanged(_) => self.unchanged += 1,
            FileOutcome::Failed(InjectError::Write { .. }) => self.write_failures += 1,
            FileOutcome::Failed(InjectError::Read { .. }) => self.read_failures += 1,
            FileOutcome::Failed(_) => self.parse_failures += 1,
        }
    }

    /// A file that could not be written back fails the whole run.
    pub fn has_write_failures(&self) -> bool {
        self.write_failures > 0
    }

    pub fn print_summary(&self, mode: WriteMode) {
        println!("\nSummary:");
        let verb = match mode {
            WriteMode::Apply => "Modified",
            WriteMode::DryRun => "Would modify",
        };
        println!("Files processed: {}", self.processed);
        println!("{}: {} ({} functions)", verb, self.modified, self.functions_instrumented);
        println!("Unchanged: {}", self.unchanged);
        println!("Skipped: {}", self.skipped);
        if self.malformed_entries > 0 {
            println!("Malformed database entries: {}", self.malformed_entries);
        }
        let failed = self.read_failures + self.parse_failures + self.write_failures;
        if failed > 0 {
            println!(
                "Failed: {} (read {}, parse {}, write {})",
                failed, self.read_failures, self.parse_failures, self.write_failures
            );
        }
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<FileResult>,
    pub summary: BatchSummary,
}

pub struct Orchestrator<'a, F: Frontend> {
    frontend: &'a F,
    settings: &'a Settings,
    mode: WriteMode,
}

impl<'a, F: Frontend> Orchestrator<'a, F> {
    pub fn new(frontend: &'a F, settings: &'a Settings, mode: WriteMode) -> Self {
        Self {
            frontend,
            settings,
            mode,
        }
    }

    /// Jobs for directory mode: every file gets the configured parser arguments.
    pub fn jobs_from_paths(&self, files: Vec<PathBuf>) -> Vec<Job> {
        files
            .into_iter()
            .map(|path| Job {
                path,
                args: self.settings.parser_args.clone(),
            })
            .collect()
    }

    /// Jobs for database mode.
    ///
    /// Entries are kept when their canonical path lies under the configured
    /// root and no skip pattern matches. A file listed several times is only
    /// processed for its first entry.
    pub fn jobs_from_database(&self, db: &CompileDatabase, summary: &mut BatchSummary) -> Result<Vec<Job>> {
        let root = std::fs::canonicalize(&self.settings.root)
            .with_context(|| format!("Failed to resolve root {}", self.settings.root.display()))?;

        for err in &db.malformed {
            warn!("{}", err);
        }
        summary.malformed_entries += db.malformed.len();

        let mut seen = HashSet::new();
        let mut jobs = Vec::new();

        for entry in &db.entries {
            let path = match std::fs::canonicalize(&entry.file) {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %entry.file.display(), error = %e, "database entry names a missing file");
                    summary.skipped += 1;
                    continue;
                }
            };

            if !path.starts_with(&root) {
                debug!(path = %path.display(), "outside root");
                summary.skipped += 1;
                continue;
            }
            if self.settings.is_skipped(&path) {
                debug!(path = %path.display(), "matches skip pattern");
                summary.skipped += 1;
                continue;
            }
            if !seen.insert(path.clone()) {
                debug!(path = %path.display(), index = entry.index, "already queued by an earlier entry");
                summary.skipped += 1;
                continue;
            }

            jobs.push(Job {
                path,
                args: entry.args.clone(),
            });
        }

        Ok(jobs)
    }

    /// Instrument one file and, in apply mode, write it back.
    pub fn process_file(&self, path: &Path, args: &[String]) -> FileOutcome {
        info!(path = %path.display(), "processing");

        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(source) => {
                return FileOutcome::Failed(InjectError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let unit = match self.frontend.parse(path, &source, args) {
            Ok(unit) => unit,
            Err(e) => return FileOutcome::Failed(e),
        };

        let result = instrument(
            &unit,
            &FileId::of(path),
            &source,
            &self.settings.marker,
            &self.settings.header_line,
        );

        let Some(rewritten) = result.output else {
            return FileOutcome::Unchanged(result.report);
        };

        if self.mode == WriteMode::Apply {
            if let Err(source) = std::fs::write(path, &rewritten) {
                return FileOutcome::Failed(InjectError::Write {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        debug!(
            path = %path.display(),
            functions = result.report.instrumented,
            header = result.report.header_added,
            "instrumented"
        );
        FileOutcome::Instrumented {
            report: result.report,
            original: source,
            rewritten,
        }
    }

    /// Qualifying definitions in `path` that do not start with the marker yet.
    pub fn pending(&self, path: &Path, args: &[String]) -> InjectResult<Vec<DefinitionCandidate>> {
        let source = std::fs::read_to_string(path).map_err(|source| InjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let unit = self.frontend.parse(path, &source, args)?;
        let buffer = TextBuffer::new(&source);
        let planned = plan(&unit, &FileId::of(path), &buffer, &self.settings.marker);
        Ok(planned.insertions.into_iter().map(|p| p.candidate).collect())
    }

    /// Process every job, sequentially or on a worker pool, and summarise.
    ///
    /// Results come back in job order either way.
    pub fn run(&self, jobs: Vec<Job>, mut summary: BatchSummary) -> BatchReport {
        let workers = self.settings.effective_jobs();

        let results: Vec<FileResult> = if workers <= 1 || jobs.len() <= 1 {
            jobs.iter().map(|job| self.process_job(job)).collect()
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(|| jobs.par_iter().map(|job| self.process_job(job)).collect()),
                Err(e) => {
                    warn!(error = %e, "failed to start worker pool, running sequentially");
                    jobs.iter().map(|job| self.process_job(job)).collect()
                }
            }
        };

        for result in &results {
            summary.record(&result.outcome);
        }

        BatchReport { results, summary }
    }

    fn process_job(&self, job: &Job) -> FileResult {
        let outcome = self.process_file(&job.path, &job.args);
        if let FileOutcome::Failed(e) = &outcome {
            if e.is_write_failure() {
                error!(path = %job.path.display(), error = %e, "write failed");
            } else {
                warn!(path = %job.path.display(), error = %e, "file skipped");
            }
        }
        FileResult {
            path: job.path.clone(),
            outcome,
        }
    }
}
