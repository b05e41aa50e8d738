//! Batch progress line with CI fallback

use super::context::UiContext;
use crate::orchestration::{BatchStatus, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Whole seconds, e.g. "1m05s"
fn format_secs(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// One-line summary of a running batch
///
/// `3/10 copies (30.00%), 1.5 KB mem (12.00%), 0/1/0 disk (50.00%); 2s + ~4s ~= 6s`
pub fn status_line(status: &BatchStatus) -> String {
    let mut line = format!(
        "{}/{} copies ({:.2}%), {} mem ({:.2}%), {}/{}/{} disk ({:.2}%)",
        status.done,
        status.total,
        status.percent_done(),
        format_bytes(status.memory_used),
        status.memory_percent(),
        status.disk.stats,
        status.disk.reads,
        status.disk.writes,
        status.disk_percent(),
    );

    match status.estimated_total() {
        Some(total) => {
            let pending = total.saturating_sub(status.elapsed);
            line.push_str(&format!(
                "; {} + ~{} ~= {}",
                format_secs(status.elapsed),
                format_secs(pending),
                format_secs(total)
            ));
        }
        None => line.push_str(&format!("; {}", format_secs(status.elapsed))),
    }

    line
}

/// Progress display for a copy batch
///
/// Shows an indicatif bar in interactive mode and prints plain status
/// lines otherwise.
pub struct BatchProgress {
    bar: Option<ProgressBar>,
    enabled: bool,
}

impl BatchProgress {
    pub fn new(ctx: &UiContext, enabled: bool) -> Self {
        let bar = if enabled && ctx.use_fancy_output() {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {spinner:.cyan} {bar:20.cyan/dim} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                    .progress_chars("━╸─"),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        } else {
            None
        };
        Self { bar, enabled }
    }
}

impl ProgressReporter for BatchProgress {
    fn update(&mut self, status: &BatchStatus) {
        if let Some(ref bar) = self.bar {
            bar.set_length(status.total as u64);
            bar.set_position(status.done as u64);
            bar.set_message(status_line(status));
        } else if self.enabled {
            println!("  {}", status_line(status));
        }
    }

    fn finish(&mut self, status: &BatchStatus) {
        if let Some(bar) = self.bar.take() {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
        if self.enabled {
            println!("  {}", status_line(status));
        }
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
