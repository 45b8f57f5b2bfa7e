//! Status reporting for the terminal and for scripts.

use crate::error::ShrinkError;
use crate::policy::CompressionResult;
use crate::profile::EncodingAttempt;
use crate::swap::RollbackOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Something the core wants the user to know about.
#[derive(Debug)]
pub enum StatusEvent<'a> {
    AttemptStarted {
        attempt: &'a EncodingAttempt,
        /// Most attempts this run may make.
        limit: usize,
    },
    AttemptFinished(&'a CompressionResult),
    Escalating {
        result: &'a CompressionResult,
        threshold_mb: f64,
        next: &'a EncodingAttempt,
    },
    /// Output came out the same size as the input.
    Unchanged { single_attempt: bool },
    Interrupted(&'a RollbackOutcome),
    Failed(&'a ShrinkError),
}

pub trait Reporter {
    fn event(&mut self, event: &StatusEvent<'_>);

    fn finish(&mut self, summary: &Summary) -> anyhow::Result<()>;
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Bytes.
    pub final_size: u64,
    /// Bytes.
    pub original_size: u64,
    pub percentage_reduction: f64,
    pub file_path: PathBuf,
    #[serde(rename = "time")]
    pub elapsed_ms: u64,
    #[serde(rename = "try")]
    pub attempts: usize,
    #[serde(skip)]
    pub original_mb: f64,
    #[serde(skip)]
    pub final_mb: f64,
    #[serde(skip)]
    pub backup_path: PathBuf,
}

impl Summary {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Whole-percent reduction from `original` to `compressed`.
pub fn percentage_reduction(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (100.0 - 100.0 * compressed as f64 / original as f64).round()
}

fn attempt_message(attempt: &EncodingAttempt, limit: usize) -> String {
    format!(
        "Compressing (attempt {}/{}, crf {})",
        attempt.index + 1,
        limit,
        attempt.crf
    )
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{} seconds", secs)
    } else {
        format!("{} min {} s", secs / 60, secs % 60)
    }
}

/// Human output with a spinner while quiet attempts run.
pub struct TerminalReporter {
    spinner_enabled: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalReporter {
    pub fn new(spinner_enabled: bool) -> Self {
        Self {
            spinner_enabled,
            spinner: None,
        }
    }

    fn start_spinner(&mut self, message: String) {
        if !self.spinner_enabled {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn line(&self, text: impl AsRef<str>) {
        match &self.spinner {
            Some(spinner) => spinner.println(text.as_ref()),
            None => eprintln!("{}", text.as_ref()),
        }
    }
}

impl Reporter for TerminalReporter {
    fn event(&mut self, event: &StatusEvent<'_>) {
        match event {
            StatusEvent::AttemptStarted { attempt, limit } => {
                self.start_spinner(attempt_message(attempt, *limit))
            }
            StatusEvent::AttemptFinished(_) => self.stop_spinner(),
            StatusEvent::Escalating {
                result,
                threshold_mb,
                next,
            } => self.line(format!(
                "{:.2} MB is above the {:.2} MB target, retrying with crf {}",
                result.size_mb, threshold_mb, next.crf
            )),
            StatusEvent::Unchanged { single_attempt } => {
                self.stop_spinner();
                if *single_attempt {
                    self.line("The file is probably already compressed; try again without --one-try.");
                } else {
                    self.line("The file has probably been compressed several times and cannot shrink further.");
                }
            }
            StatusEvent::Interrupted(outcome) => {
                self.stop_spinner();
                self.line("Interrupted, stopping...");
                match outcome {
                    RollbackOutcome::Removed(path) => {
                        self.line(format!("Removed {}", path.display()))
                    }
                    RollbackOutcome::NothingToRemove => {}
                    RollbackOutcome::Failed(path, e) => {
                        self.line(format!("Could not remove {}: {}", path.display(), e))
                    }
                }
            }
            StatusEvent::Failed(err) => {
                self.stop_spinner();
                self.line(format!("Error: {}", err));
                if let ShrinkError::SourceMissing { .. } = err {
                    self.line("Check that the file exists; quote paths that contain spaces.");
                }
            }
        }
    }

    fn finish(&mut self, summary: &Summary) -> anyhow::Result<()> {
        self.stop_spinner();
        println!(
            "Final size: {:.2} MB -> {:.2} MB (-{}%)",
            summary.original_mb, summary.final_mb, summary.percentage_reduction
        );
        println!("Your video is here: {}", summary.file_path.display());
        println!("Original kept at: {}", summary.backup_path.display());
        println!("Elapsed: {}", format_elapsed(summary.elapsed()));
        println!("Attempts: {}", summary.attempts);
        Ok(())
    }
}

/// Prints nothing but the final JSON summary on stdout.
#[derive(Debug, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn event(&mut self, event: &StatusEvent<'_>) {
        match event {
            StatusEvent::Failed(err) => eprintln!("{}", err),
            StatusEvent::Interrupted(RollbackOutcome::Failed(path, e)) => {
                eprintln!("interrupted; could not remove {}: {}", path.display(), e)
            }
            StatusEvent::Interrupted(_) => eprintln!("interrupted"),
            _ => {}
        }
    }

    fn finish(&mut self, summary: &Summary) -> anyhow::Result<()> {
        let json = serde_json::to_string(summary)?;
        println!("{}", json);
        Ok(())
    }
}
