//! Terminal progress bar for batch runs

use crate::{
    services::{BatchProgressUpdate, ProcessingStage, ProgressReporter, ProgressUpdate},
    types::ProcessingTimings,
};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Batch reporter drawing an indicatif bar on stderr
///
/// Only batch-level updates move the bar; per-stage updates of single
/// images are ignored so the bar stays readable with several workers.
pub struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    /// Bar over `total` items; hidden when there is only one
    #[must_use]
    pub fn new(total: usize) -> Self {
        let bar = if total > 1 {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }

    /// Finish the bar, leaving a one-line result
    pub fn finish(&self, succeeded: usize, failed: usize) {
        self.bar
            .finish_with_message(format!("Completed! Stylized: {succeeded}, Failed: {failed}"));
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .suspend(|| log::error!("❌ Error during {}: {}", stage.description(), error));
    }

    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        self.bar.set_position(update.items_completed as u64);
        self.bar.set_message(update.current_item_name);
    }
}
