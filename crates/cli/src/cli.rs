use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Scheduled workbook refresher.
///
/// Opens each configured workbook, refreshes its external connections,
/// waits, saves and closes it. Runs once on demand or as a daemon firing
/// at up to three daily `HH:MM` slots.
#[derive(Parser, Debug)]
#[command(name = "refresher", about = "Scheduled workbook refresher")]
pub struct CliArgs {
    /// JSON document list (overrides DOCUMENTS_FILE)
    #[arg(long, global = true)]
    pub documents: Option<PathBuf>,

    /// Seconds to wait after starting a refresh (overrides REFRESH_WAIT_SECS)
    #[arg(long, global = true)]
    pub wait_secs: Option<u64>,

    /// Per-document timeout in seconds (overrides REFRESH_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Refresh every enabled document once. Ctrl+C stops after the current step.
    Run {
        /// Print the run result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Run the daily scheduler until Ctrl+C.
    Daemon {
        /// Comma separated HH:MM slots (overrides the document file and SCHEDULE_TIMES)
        #[arg(long, value_delimiter = ',')]
        times: Vec<String>,

        /// Start even when auto refresh is disabled in the document file
        #[arg(long)]
        force: bool,
    },
    /// Show the configured slots and the next run time.
    Next {
        /// Comma separated HH:MM slots (overrides the document file and SCHEDULE_TIMES)
        #[arg(long, value_delimiter = ',')]
        times: Vec<String>,
    },
    /// Validate HH:MM candidates the way the scheduler would.
    CheckTimes {
        #[arg(required = true)]
        times: Vec<String>,
    },
}
