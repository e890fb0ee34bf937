//! Engine error taxonomy
//!
//! File-level errors are caught at the per-file boundary of the batch loop
//! and surfaced as events; they never break the batch. Layout errors are
//! recoverable (the pipeline falls back to the degenerate per-channel mode),
//! so they have their own type and only become an `EngineError` when an
//! invariant violation survives past the fallback point.

use std::path::PathBuf;

use thiserror::Error;

use crate::decode::DecodeError;
use crate::export::ExportError;
use crate::extract::ExtractError;
use crate::render::RenderError;

/// Errors resolving or partitioning a track layout (recoverable)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The declared drums channel count matches no known scheme
    #[error("unrecognized drums channel scheme: {0} channels")]
    UnrecognizedDrumsSchema(u8),

    /// The layout needs more channels than the arranged index list provides
    #[error("layout needs {needed} channels but only {available} are arranged")]
    ChannelCountMismatch { needed: usize, available: usize },
}

/// Top-level engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unrecognized file type or undecryptable payload, with the
    /// extraction collaborator's diagnostic log
    #[error("cannot process '{}':\n{}", path.display(), log.join("\n"))]
    InputFormat { path: PathBuf, log: Vec<String> },

    /// The decode collaborator refused to open or split a stream
    #[error("stream initialization failed: {0}")]
    StreamInit(String),

    /// The waveform render collaborator failed mid-track
    #[error("waveform rendering failed: {0}")]
    Render(#[from] RenderError),

    /// Screenshot/encode/upload failure; never retried automatically
    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    /// A render or upload operation is already running
    #[error("another operation is in progress, wait for it to finish")]
    Busy,

    /// Export or upload requested with no composite available
    #[error("nothing to save")]
    NothingLoaded,
}

impl From<ExtractError> for EngineError {
    fn from(err: ExtractError) -> Self {
        EngineError::InputFormat {
            path: err.path().to_path_buf(),
            log: err.diagnostic_log(),
        }
    }
}

impl From<DecodeError> for EngineError {
    fn from(err: DecodeError) -> Self {
        EngineError::StreamInit(err.to_string())
    }
}

impl From<LayoutError> for EngineError {
    // A layout error that survives past the degenerate fallback is an
    // engine-internal invariant violation, handled uniformly as a
    // stream-init-class failure.
    fn from(err: LayoutError) -> Self {
        EngineError::StreamInit(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_error_display() {
        let err = LayoutError::ChannelCountMismatch {
            needed: 10,
            available: 8,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("8"));
    }

    #[test]
    fn test_input_format_carries_log() {
        let err = EngineError::InputFormat {
            path: PathBuf::from("song.bin"),
            log: vec!["not a supported container".into(), "magic: 0x00".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("song.bin"));
        assert!(msg.contains("magic: 0x00"));
    }
}
