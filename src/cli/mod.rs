//! Command-line surface: argument parsing, interrupts and the end-of-run
//! summary.

pub mod signals;
pub mod summary;

use clap::Parser;

/// The binary takes no options; configuration comes from `.azc-fixer/`
/// and `AZC_FIXER_*` environment variables.
#[derive(Debug, Parser)]
#[command(name = "azc-fixer")]
#[command(
    about = "Repair AZC analyzer violations in client.tsp with a remote AI worker",
    long_about = None
)]
#[command(version)]
pub struct Cli {}

pub use signals::{INTERRUPTED_EXIT_CODE, watch_interrupts};
pub use summary::{exit_code, render_outcome};
