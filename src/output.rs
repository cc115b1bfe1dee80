//! Run summary formatting for the terminal

use std::time::Duration;

use crate::cli::VerbosityLevel;
use crate::engine::RunSummary;

/// Simple output formatter for human-readable results
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stderr),
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        match self.verbosity {
            VerbosityLevel::Quiet => {
                if summary.sources_failed > 0 {
                    output.push_str(&format!("Failed sources: {}\n", summary.sources_failed));
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                output.push_str("Sourcing Summary:\n");
                output.push_str(&format!("  Sources: {}\n", summary.sources_usable));
                output.push_str(&format!(
                    "  {} {}\n",
                    self.colorize("Loaded:", "32"),
                    summary.sources_loaded
                ));
                if summary.sources_failed > 0 {
                    output.push_str(&format!(
                        "  {} {}\n",
                        self.colorize("Failed:", "31"),
                        summary.sources_failed
                    ));
                }
                output.push_str(&format!("  Records: {}\n", summary.records));
                output.push_str(&format!("  Nodes created: {}\n", summary.nodes_created));
                if summary.has_warnings() {
                    output.push_str(&format!(
                        "  {} {}\n",
                        self.colorize("Warnings:", "33"),
                        summary.warnings.len()
                    ));
                }
                output.push_str(&format!(
                    "  Duration: {}\n",
                    format_duration(summary.total_duration)
                ));

                if self.verbosity == VerbosityLevel::Verbose {
                    output.push_str(&self.format_timings(summary));
                    for warning in &summary.warnings {
                        output.push_str(&format!("  ! {}\n", warning));
                    }
                }
            }
        }

        output
    }

    fn format_timings(&self, summary: &RunSummary) -> String {
        format!(
            "\nTimings:\n  Loading: {}\n  Converting: {}\n",
            format_duration(summary.loading_duration),
            format_duration(summary.converting_duration)
        )
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
