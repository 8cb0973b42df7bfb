use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use dbug_inject::compile_db::CompileDatabase;
use dbug_inject::discovery::collect_source_files;
use dbug_inject::orchestrator::{BatchReport, BatchSummary, FileOutcome, Orchestrator, WriteMode};
use dbug_inject::{init_tracing, unified_diff, CppFrontend, DiffStats, Settings};

#[derive(Parser)]
#[command(name = "dbug-inject")]
#[command(about = "Insert a trace statement at the top of every C/C++ function body", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Statement to insert, e.g. "DBUG_TRACE;"
    #[arg(long, global = true)]
    marker: Option<String>,

    /// Include line added to instrumented files, e.g. '#include "dbug.h"'
    #[arg(long, global = true)]
    header: Option<String>,

    /// Skip paths matching these patterns (can be used multiple times)
    #[arg(long, global = true, num_args = 0..)]
    exclude: Vec<String>,

    /// Worker threads (0 = one per core)
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    /// Skip files that do not parse cleanly
    #[arg(long, global = true)]
    strict: bool,

    /// Output format: "default" or "diff"
    #[arg(long, default_value = "default", global = true)]
    format: String,

    /// Show diff statistics after the run
    #[arg(long, global = true)]
    summary: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instrument files and directories (supports glob patterns)
    Run {
        #[arg(num_args = 1.., default_value = ".")]
        paths: Vec<PathBuf>,

        /// Write changes (default is dry-run)
        #[arg(long)]
        apply: bool,
    },

    /// Instrument every file listed in a compilation database
    Compdb {
        /// Path to compile_commands.json (defaults to `compile_db` from the settings)
        database: Option<PathBuf>,

        /// Only files under this directory are touched
        #[arg(long)]
        root: Option<PathBuf>,

        /// Write changes (default is dry-run)
        #[arg(long)]
        apply: bool,
    },

    /// List function definitions that are not instrumented yet
    Check {
        #[arg(num_args = 1.., default_value = ".")]
        paths: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if let Some(marker) = &cli.marker {
        settings.marker = marker.clone();
    }
    if let Some(header) = &cli.header {
        settings.header_line = header.clone();
    }
    if let Some(jobs) = cli.jobs {
        settings.jobs = jobs;
    }
    if cli.strict {
        settings.strict_syntax = true;
    }
    settings.skip_patterns.extend(cli.exclude.iter().cloned());

    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = load_settings(&cli)?;

    match &cli.command {
        Commands::Run { paths, apply } => {
            let frontend = CppFrontend::new(settings.strict_syntax);
            let mode = write_mode(*apply);
            let orch = Orchestrator::new(&frontend, &settings, mode);

            let files = collect_source_files(paths, &settings)?;
            let report = orch.run(orch.jobs_from_paths(files), BatchSummary::default());
            Ok(print_report(&report, mode, &cli.format, cli.summary))
        }

        Commands::Compdb { database, root, apply } => {
            if let Some(root) = root {
                settings.root = root.clone();
            }
            let db_path = database
                .clone()
                .or_else(|| settings.compile_db.clone())
                .context("No compilation database given")?;
            let db = CompileDatabase::load(&db_path)?;

            let frontend = CppFrontend::new(settings.strict_syntax);
            let mode = write_mode(*apply);
            let orch = Orchestrator::new(&frontend, &settings, mode);

            let mut summary = BatchSummary::default();
            let jobs = orch.jobs_from_database(&db, &mut summary)?;
            let report = orch.run(jobs, summary);
            Ok(print_report(&report, mode, &cli.format, cli.summary))
        }

        Commands::Check { paths } => {
            let frontend = CppFrontend::new(settings.strict_syntax);
            let orch = Orchestrator::new(&frontend, &settings, WriteMode::DryRun);

            let mut pending_total = 0;
            for file in collect_source_files(paths, &settings)? {
                match orch.pending(&file, &settings.parser_args) {
                    Ok(pending) => {
                        for candidate in &pending {
                            println!(
                                "{}:{}: {}",
                                file.display(),
                                candidate.body_start_line,
                                candidate.name.as_deref().unwrap_or("<anonymous>")
                            );
                        }
                        pending_total += pending.len();
                    }
                    Err(e) => eprintln!("⚠ {}", e),
                }
            }

            if pending_total > 0 {
                println!("\n{} definitions not instrumented", pending_total);
                Ok(ExitCode::from(1))
            } else {
                println!("All definitions instrumented");
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn write_mode(apply: bool) -> WriteMode {
    if apply {
        WriteMode::Apply
    } else {
        WriteMode::DryRun
    }
}

/// Print per-file results and the batch summary. Write failures make the run fail.
fn print_report(report: &BatchReport, mode: WriteMode, format: &str, show_summary: bool) -> ExitCode {
    let mut total_stats = DiffStats::default();

    for result in &report.results {
        match &result.outcome {
            FileOutcome::Instrumented {
                report: file_report,
                original,
                rewritten,
            } => {
                if format == "diff" || show_summary {
                    let (diff, stats) = unified_diff(&result.path, original, rewritten);
                    if format == "diff" {
                        print!("{}", diff);
                    }
                    total_stats.add(&stats);
                }
                if format != "diff" {
                    let verb = match mode {
                        WriteMode::Apply => "✓ Modified",
                        WriteMode::DryRun => "Would modify",
                    };
                    println!(
                        "{}: {} ({} functions)",
                        verb,
                        result.path.display(),
                        file_report.instrumented
                    );
                }
            }
            FileOutcome::Unchanged(_) => {}
            FileOutcome::Failed(e) => eprintln!("⚠ {}", e),
        }
    }

    if show_summary {
        total_stats.print_summary();
    }
    report.summary.print_summary(mode);

    if mode == WriteMode::DryRun && report.summary.modified > 0 {
        println!("\nRun with --apply to write changes");
    }

    if report.summary.has_write_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
