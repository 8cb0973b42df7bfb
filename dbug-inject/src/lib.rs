//! Inserts a tracing statement at the top of every eligible C/C++ function
//! body, plus the include line that declares it.

pub mod compile_db;
pub mod config;
pub mod cpp;
pub mod diff;
pub mod discovery;
pub mod error;
pub mod header;
pub mod instrument;
pub mod locator;
pub mod orchestrator;
pub mod patcher;
pub mod resolver;
pub mod syntax;
pub mod text;


pub use compile_db::{CompileDatabase, CompileEntry};
pub use config::Settings;
pub use cpp::CppFrontend;
pub use diff::{unified_diff, DiffStats};
pub use error::{InjectError, InjectResult};
pub use instrument::{instrument, plan, FileReport, Instrumented};
pub use orchestrator::{BatchReport, BatchSummary, FileOutcome, Job, Orchestrator, WriteMode};
pub use syntax::{FileId, Frontend, SourceUnit};
pub use text::TextBuffer;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise this crate logs at `info`, or `debug`
/// when `verbose` is on.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("dbug_inject={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
