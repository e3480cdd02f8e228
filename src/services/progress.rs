//! Progress reporting service
//!
//! This module separates progress reporting concerns from the processing
//! logic, allowing different frontends to implement their own progress handling.

use crate::types::ProcessingTimings;
use instant::Instant;

/// Progress stages during stylization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Initializing backend and loading model
    Initialization,
    /// Loading and decoding input image
    ImageLoading,
    /// Resizing and normalizing into the network layout
    Preprocessing,
    /// Running the style network
    Inference,
    /// Denormalizing and resizing back to the original size
    Postprocessing,
    /// Encoding to the output format
    Encoding,
    /// Saving result to file
    FileSaving,
    /// Processing completed
    Completed,

    // Batch processing stages
    /// Initializing batch processing
    BatchInitialization,
    /// Processing individual item in batch
    BatchItemProcessing,
    /// Finalizing batch processing
    BatchFinalization,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Initialization => "Initializing model and backend",
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Preprocessing => "Preparing image tensor",
            ProcessingStage::Inference => "Running style network",
            ProcessingStage::Postprocessing => "Restoring stylized image",
            ProcessingStage::Encoding => "Encoding output",
            ProcessingStage::FileSaving => "Saving result",
            ProcessingStage::Completed => "Processing completed",

            ProcessingStage::BatchInitialization => "Initializing batch processing",
            ProcessingStage::BatchItemProcessing => "Processing batch item",
            ProcessingStage::BatchFinalization => "Finalizing batch processing",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Initialization => 5,
            ProcessingStage::ImageLoading => 10,
            ProcessingStage::Preprocessing => 20,
            ProcessingStage::Inference => 75,
            ProcessingStage::Postprocessing => 90,
            ProcessingStage::Encoding => 95,
            ProcessingStage::FileSaving => 99,
            ProcessingStage::Completed => 100,

            ProcessingStage::BatchInitialization => 5,
            ProcessingStage::BatchItemProcessing => 50,
            ProcessingStage::BatchFinalization => 98,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }

    /// Create a progress update with custom description
    #[must_use]
    pub fn with_description(
        stage: ProcessingStage,
        description: String,
        start_time: Instant,
    ) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Progress of a running batch after one item finished
#[derive(Debug, Clone)]
pub struct BatchProgressUpdate {
    /// Items finished so far, successful or not
    pub items_completed: usize,
    /// Total number of items in the batch
    pub items_total: usize,
    /// Items that failed so far
    pub items_failed: usize,
    /// Name of the item that just finished
    pub current_item_name: String,
    /// Elapsed time since the batch started (milliseconds)
    pub elapsed_ms: u64,
}

impl BatchProgressUpdate {
    /// Items per second so far
    #[must_use]
    pub fn processing_rate(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.items_completed as f64 / (self.elapsed_ms as f64 / 1000.0)
    }

    /// Estimated seconds remaining, once at least one item has finished
    #[must_use]
    pub fn eta_seconds(&self) -> Option<u64> {
        let rate = self.processing_rate();
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.items_total.saturating_sub(self.items_completed);
        Some((remaining as f64 / rate).ceil() as u64)
    }
}

/// Trait for reporting progress during stylization
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: ProcessingTimings);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);

    /// Report that one batch item finished
    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        drop(update);
    }
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Console progress reporter that logs progress
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to show detailed progress information
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        log::info!("✅ Stylization completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  📊 Detailed timings:");
            log::info!("    • Image decode: {}ms", timings.image_decode_ms);
            log::info!("    • Preprocessing: {}ms", timings.preprocessing_ms);
            log::info!("    • Inference: {}ms", timings.inference_ms);
            log::info!("    • Postprocessing: {}ms", timings.postprocessing_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }

    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        log::info!(
            "📁 {}/{} done ({} failed): {}",
            update.items_completed,
            update.items_total,
            update.items_failed,
            update.current_item_name
        );
        if self.verbose {
            if let Some(eta) = update.eta_seconds() {
                log::info!(
                    "⏱️  {:.2} items/sec, ~{}s remaining",
                    update.processing_rate(),
                    eta
                );
            }
        }
    }
}

/// Progress tracker that manages timing and progress reporting
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Create a progress tracker with no-op reporter
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Box::new(NoOpProgressReporter))
    }

    /// Create a progress tracker with console reporter
    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Box::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage.clone());
        let update = ProgressUpdate::new(stage, self.start_time);
        self.reporter.report_progress(update);
    }

    /// Report progress with custom description
    pub fn report_stage_with_description(&mut self, stage: ProcessingStage, description: String) {
        self.current_stage = Some(stage.clone());
        let update = ProgressUpdate::with_description(stage, description, self.start_time);
        self.reporter.report_progress(update);
    }

    /// Report completion with final timings
    pub fn report_completion(&self, timings: ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error at the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self
            .current_stage
            .clone()
            .unwrap_or(ProcessingStage::Initialization);
        self.reporter.report_error(stage, error);
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get the current processing stage
    #[must_use]
    pub fn current_stage(&self) -> Option<&ProcessingStage> {
        self.current_stage.as_ref()
    }
}
