//! Bounded-concurrency batch stylization
//!
//! A batch loads the weights once and starts `concurrency` workers on
//! blocking threads. Each worker owns a `StylizeProcessor` (and therefore its
//! own backend session) built over the shared weights buffer, and pulls jobs
//! from a common queue until it is empty. A failing item is recorded and the
//! worker moves on; the batch always runs to completion.

use crate::{
    config::OutputFormat,
    error::{ErrorKind, Result, StylizeError},
    models::ModelWeights,
    processor::{BackendFactory, DefaultBackendFactory, ProcessorConfig, StylizeProcessor},
    services::{BatchProgressUpdate, ImageIOService, ProgressReporter},
    types::ProcessingTimings,
};
use instant::Instant;
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info_span, instrument};

/// One input file and where its result goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl BatchJob {
    #[must_use]
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input: P, output: Q) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Map inputs to `output_dir/<stem>.<ext>`, keeping input order
    ///
    /// Inputs sharing a stem get `_2`, `_3`, ... suffixes so no two jobs
    /// write the same file.
    #[must_use]
    pub fn plan(inputs: &[PathBuf], output_dir: &Path, format: OutputFormat) -> Vec<Self> {
        let mut seen: HashMap<String, usize> = HashMap::new();

        inputs
            .iter()
            .map(|input| {
                let stem = input
                    .file_stem()
                    .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
                let count = seen.entry(stem.clone()).or_insert(0);
                *count += 1;
                let file_name = if *count == 1 {
                    format!("{stem}.{}", format.extension())
                } else {
                    format!("{stem}_{count}.{}", format.extension())
                };
                Self::new(input.clone(), output_dir.join(file_name))
            })
            .collect()
    }
}

/// A stylized and written item
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemSuccess {
    pub input: PathBuf,
    pub output: PathBuf,
    pub dimensions: (u32, u32),
    pub timings: ProcessingTimings,
}

/// An item that produced no output
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemFailure {
    pub input: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

impl BatchItemFailure {
    fn from_error(input: PathBuf, error: &StylizeError) -> Self {
        Self {
            input,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Partial result of a batch: every job lands in exactly one list
///
/// Both lists keep the order the jobs were submitted in.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<BatchItemSuccess>,
    pub failed: Vec<BatchItemFailure>,
    pub elapsed_ms: u64,
}

impl BatchOutcome {
    /// Whether every job succeeded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of jobs in the batch
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Write the outcome as pretty-printed JSON
    ///
    /// # Errors
    /// - Serialization or file system failures
    pub fn write_report<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| StylizeError::internal(format!("Failed to serialize batch report: {e}")))?;
        ImageIOService::write_atomic(path, &json)
    }
}

type JobQueue = Arc<Mutex<VecDeque<(usize, BatchJob)>>>;
type ItemResult = std::result::Result<BatchItemSuccess, BatchItemFailure>;

/// Shared state handed to every worker
struct WorkerContext {
    queue: JobQueue,
    results: Arc<Mutex<Vec<(usize, ItemResult)>>>,
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    total: usize,
    started: Instant,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl WorkerContext {
    fn next_job(&self) -> Result<Option<(usize, BatchJob)>> {
        Ok(self
            .queue
            .lock()
            .map_err(|_| StylizeError::internal("Batch queue lock poisoned"))?
            .pop_front())
    }

    fn record(&self, index: usize, result: ItemResult) -> Result<()> {
        let name = match &result {
            Ok(success) => success.input.display().to_string(),
            Err(failure) => failure.input.display().to_string(),
        };
        if result.is_err() {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        self.results
            .lock()
            .map_err(|_| StylizeError::internal("Batch result lock poisoned"))?
            .push((index, result));

        if let Some(reporter) = &self.reporter {
            reporter.report_batch_progress(BatchProgressUpdate {
                items_completed: completed,
                items_total: self.total,
                items_failed: self.failed.load(Ordering::SeqCst),
                current_item_name: name,
                elapsed_ms: self.started.elapsed().as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Runs batches of stylization jobs on a bounded worker pool
pub struct BatchProcessor {
    config: ProcessorConfig,
    backend_factory: Arc<dyn BackendFactory>,
    concurrency: usize,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl BatchProcessor {
    /// Create a batch processor using the backends compiled into this build
    ///
    /// A `concurrency` of zero is treated as one.
    #[must_use]
    pub fn new(config: ProcessorConfig, concurrency: usize) -> Self {
        Self::with_factory(config, concurrency, Arc::new(DefaultBackendFactory))
    }

    #[must_use]
    pub fn with_factory(
        config: ProcessorConfig,
        concurrency: usize,
        backend_factory: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            config,
            backend_factory,
            concurrency: concurrency.max(1),
            reporter: None,
        }
    }

    /// Receive a progress update after every finished item
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Load the configured weights and run the batch
    ///
    /// # Errors
    /// - `ModelLoad` when the weights file cannot be read; no job runs
    pub async fn run(&self, jobs: Vec<BatchJob>) -> Result<BatchOutcome> {
        if jobs.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let weights = ModelWeights::load(&self.config.weights_path)?;
        Ok(self.run_with_weights(weights, jobs).await)
    }

    /// Run the batch over weights already in memory
    ///
    /// Never fails as a whole: worker start-up failures are recorded
    /// against the jobs no worker could take.
    #[instrument(name = "batch_processing", skip_all, fields(jobs = jobs.len(), workers = tracing::field::Empty))]
    pub async fn run_with_weights(&self, weights: ModelWeights, jobs: Vec<BatchJob>) -> BatchOutcome {
        let started = Instant::now();
        let total = jobs.len();
        let workers = self.concurrency.min(total).max(1);
        tracing::Span::current().record("workers", workers);

        log::info!(
            "🚀 Stylizing {} image(s) with {} worker(s) using {}",
            total,
            workers,
            weights.name()
        );

        let context = Arc::new(WorkerContext {
            queue: Arc::new(Mutex::new(jobs.into_iter().enumerate().collect())),
            results: Arc::new(Mutex::new(Vec::with_capacity(total))),
            completed: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            total,
            started,
            reporter: self.reporter.clone(),
        });

        let worker_config = self.worker_config(workers, available_cores());
        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let context = Arc::clone(&context);
                let config = worker_config.clone();
                let factory = Arc::clone(&self.backend_factory);
                let weights = weights.clone();
                tokio::task::spawn_blocking(move || {
                    Self::worker_loop(worker_id, &context, config, factory, weights)
                })
            })
            .collect();

        let mut startup_errors = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => startup_errors.push(e),
                Err(join_error) => {
                    log::error!("❌ Batch worker panicked: {join_error}");
                    startup_errors.push(StylizeError::internal(format!(
                        "Batch worker panicked: {join_error}"
                    )));
                },
            }
        }

        // Jobs left in the queue had no worker able to run them
        let leftover: Vec<(usize, BatchJob)> = context
            .queue
            .lock()
            .map(|mut queue| queue.drain(..).collect())
            .unwrap_or_default();
        if !leftover.is_empty() {
            let (kind, message) = startup_errors.first().map_or_else(
                || (ErrorKind::Internal, "No batch worker could start".to_string()),
                |e| (e.kind(), e.to_string()),
            );
            for (index, job) in leftover {
                let failure = BatchItemFailure {
                    input: job.input,
                    kind,
                    message: message.clone(),
                };
                if let Err(e) = context.record(index, Err(failure)) {
                    log::error!("❌ {e}");
                }
            }
        }

        let mut results = context
            .results
            .lock()
            .map(|mut results| std::mem::take(&mut *results))
            .unwrap_or_default();
        results.sort_by_key(|(index, _)| *index);

        let mut outcome = BatchOutcome::default();
        for (_, result) in results {
            match result {
                Ok(success) => outcome.succeeded.push(success),
                Err(failure) => outcome.failed.push(failure),
            }
        }
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;

        log::info!(
            "🏁 Batch finished in {:.2}s: {} succeeded, {} failed",
            outcome.elapsed_ms as f64 / 1000.0,
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        outcome
    }

    /// Per-worker configuration
    ///
    /// Auto-detected thread counts (zero) are split across workers so the
    /// sessions together stay within the machine's cores. Explicit counts
    /// are kept as given.
    fn worker_config(&self, workers: usize, cores: usize) -> ProcessorConfig {
        let mut config = self.config.clone();
        if workers > 1 {
            let share = (cores / workers).max(1);
            if config.intra_threads == 0 {
                config.intra_threads = share;
            }
            if config.inter_threads == 0 {
                config.inter_threads = (share / 4).max(1);
            }
        }
        config
    }

    /// Drain the queue on one blocking thread
    ///
    /// Returns an error only when the worker could not start; item
    /// failures, backend panics included, are recorded and skipped.
    fn worker_loop(
        worker_id: usize,
        context: &WorkerContext,
        config: ProcessorConfig,
        factory: Arc<dyn BackendFactory>,
        weights: ModelWeights,
    ) -> Result<()> {
        let mut processor = StylizeProcessor::with_weights(config, factory, weights)?;
        if let Err(e) = processor.initialize() {
            log::error!("❌ Worker {worker_id} failed to start: {e}");
            return Err(e);
        }

        while let Some((index, job)) = context.next_job()? {
            let _span = info_span!("file_processing", worker = worker_id, input = %job.input.display())
                .entered();

            let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                processor.process_file_to_path(&job.input, &job.output)
            }))
            .unwrap_or_else(|payload| {
                Err(StylizeError::inference(format!(
                    "Backend panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

            let result = match attempt {
                Ok(stylized) => Ok(BatchItemSuccess {
                    dimensions: stylized.dimensions(),
                    timings: stylized.metadata.timings,
                    input: job.input,
                    output: job.output,
                }),
                Err(e) => {
                    log::warn!("⚠️ Skipping {}: {e}", job.input.display());
                    Err(BatchItemFailure::from_error(job.input, &e))
                },
            };
            context.record(index, result)?;
        }

        Ok(())
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(8)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
