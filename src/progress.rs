//! Progress reporting for comparison runs

use crate::compare::Stage;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Receives stage transitions from the comparator
pub trait StageObserver {
    /// A new control/target pair is about to be compared
    fn on_start(&self, _label: &str) {}

    fn on_stage(&self, stage: Stage);

    fn on_finish(&self, _passed: bool) {}
}

/// Spinner-based progress reporter
#[derive(Debug)]
pub struct ProgressReporter {
    pub spinner: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Create a reporter with a live spinner
    pub fn new_for_comparison() -> Self {
        Self {
            spinner: Some(create_spinner("Starting comparison...")),
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self { spinner: None }
    }
}

impl StageObserver for ProgressReporter {
    fn on_start(&self, label: &str) {
        if let Some(pb) = &self.spinner {
            pb.set_prefix(label.to_string());
        }
    }

    fn on_stage(&self, stage: Stage) {
        if let Some(pb) = &self.spinner {
            pb.set_message(stage.description());
        }
    }

    fn on_finish(&self, passed: bool) {
        if let Some(pb) = &self.spinner {
            let marker = if passed { "✅" } else { "❌" };
            pb.println(format!("{} {}", marker, pb.prefix()));
            pb.set_message("");
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
