use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use refresher_engine::{JobStatus, RefreshObserver, RefreshRunResult};
use tracing::debug;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const SUCCESS: Color = Color::Green;
    const SKIPPED: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

fn status_color(status: JobStatus) -> Color {
    match status {
        JobStatus::Success => Colors::SUCCESS,
        JobStatus::Skipped => Colors::SKIPPED,
        JobStatus::Error => Colors::ERROR,
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Success => "ok",
        JobStatus::Skipped => "skipped",
        JobStatus::Error => "error",
    }
}

/// Prints per-document progress and the wait countdown in quarter steps.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    last_quarter: AtomicU8,
}

impl ProgressPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    fn print(&self, color: Color, text: String) {
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, SetForegroundColor(color), Print(text), ResetColor) {
            debug!(error = %e, "progress output failed");
        }
    }
}

impl RefreshObserver for ProgressPrinter {
    fn document_started(&self, index: usize, total: usize, path: &Path) {
        self.last_quarter.store(0, Ordering::SeqCst);
        self.print(
            Colors::HEADER,
            format!("[{}/{}] {}\n", index, total, path.display()),
        );
    }

    fn document_finished(&self, _index: usize, _total: usize, _path: &Path, status: JobStatus) {
        self.print(status_color(status), format!("      {}\n", status_label(status)));
    }

    fn wait_tick(&self, percent: u8, remaining: &str) {
        let quarter = percent / 25;
        if quarter > self.last_quarter.swap(quarter, Ordering::SeqCst) {
            self.print(
                Colors::DIM,
                format!("      waiting {:>3}% ({} left)\n", percent, remaining),
            );
        }
    }
}

/// Print the per-document outcomes and the batch totals.
pub fn print_summary(result: &RefreshRunResult) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, Print("\n"))?;
    for job in &result.jobs {
        let rows = match job.rows_added {
            Some(added) => format!(" ({:+} rows)", added),
            None => String::new(),
        };
        execute!(
            stdout,
            SetForegroundColor(status_color(job.status)),
            Print(format!("{:>8} ", status_label(job.status))),
            ResetColor,
            Print(format!("{}{}\n", job.message, rows)),
        )?;
    }

    let mut totals = format!(
        "{} succeeded, {} failed",
        result.succeeded, result.failed
    );
    if result.skipped > 0 {
        totals.push_str(&format!(", {} skipped", result.skipped));
    }
    if result.cancelled {
        totals.push_str(&format!(", {} not started (stopped)", result.not_started()));
    }
    execute!(
        stdout,
        SetForegroundColor(Colors::HEADER),
        Print(format!("{} in {:.1}s\n", totals, result.elapsed_seconds)),
        ResetColor,
    )?;
    stdout.flush()?;
    Ok(())
}
