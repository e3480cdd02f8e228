//! Services separating I/O, encoding and progress reporting from processing

pub mod format;
pub mod io;
pub mod progress;
pub mod scratch;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{
    BatchProgressUpdate, ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use scratch::ScratchSpace;
