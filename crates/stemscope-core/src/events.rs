//! Engine events
//!
//! Workers never touch interactive-thread state; they emit these immutable
//! values over a channel and the interactive layer applies them at its own
//! pace.

use std::path::PathBuf;
use std::sync::Arc;

use crate::compose::CompositeImage;

/// Events emitted by the render and upload workers
#[derive(Debug, Clone)]
pub enum RenderEvent {
    /// A file's render has begun
    FileStarted {
        path: PathBuf,
        /// Zero-based position in the batch
        index: usize,
        /// Batch size
        total: usize,
    },

    /// A file's composite is ready
    FileCompleted {
        path: PathBuf,
        composite: Arc<CompositeImage>,
    },

    /// A file's render failed; the batch continues
    FileFailed { path: PathBuf, error: String },

    /// The whole batch finished; the engine is idle again
    BatchCompleted { rendered: usize, failed: usize },

    /// The upload finished with a shareable URL
    UploadCompleted { url: String },

    /// The upload failed; the engine is idle again
    UploadFailed { error: String },
}
