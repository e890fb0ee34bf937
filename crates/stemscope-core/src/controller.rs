//! Batch and concurrency controller
//!
//! Sequences the render pipeline over queued input files and runs the
//! independent upload path. One authoritative `EngineState` gates both: a
//! new render or upload request is rejected (never queued) while either
//! worker is active, and UI toggles that would start a render are rejected
//! the same way so the caller can revert the toggle's visual state.
//!
//! Workers communicate exclusively through `RenderEvent` values; they never
//! touch interactive-thread state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::arrange::{CanonicalArranger, ChannelArranger};
use crate::compose::CompositeImage;
use crate::config::ViewConfig;
use crate::error::EngineError;
use crate::events::RenderEvent;
use crate::export::{self, UploadConfig, Uploader};
use crate::extract::{FileExtractor, PayloadExtractor};
use crate::pipeline;
use crate::render::{PeakRenderer, WaveformRenderer};

/// The engine's single authoritative operation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Rendering,
    Uploading,
}

struct RenderRequest {
    paths: Vec<PathBuf>,
    view: ViewConfig,
}

struct UploadRequest {
    jpeg: Vec<u8>,
    config: UploadConfig,
}

/// The analyzer engine exposed to the interactive shell
pub struct Analyzer {
    state: Arc<Mutex<EngineState>>,
    view: ViewConfig,
    inputs: Vec<PathBuf>,
    current: Arc<Mutex<Option<Arc<CompositeImage>>>>,
    render_tx: Sender<RenderRequest>,
    upload_tx: Sender<UploadRequest>,
    event_rx: Receiver<RenderEvent>,
    _render_handle: JoinHandle<()>,
    _upload_handle: JoinHandle<()>,
}

impl Analyzer {
    /// Create an analyzer with the default collaborators
    pub fn new(view: ViewConfig) -> Self {
        Self::with_collaborators(
            view,
            Arc::new(FileExtractor),
            Arc::new(CanonicalArranger),
            Arc::new(PeakRenderer),
        )
    }

    /// Create an analyzer with custom collaborator implementations
    pub fn with_collaborators(
        view: ViewConfig,
        extractor: Arc<dyn PayloadExtractor>,
        arranger: Arc<dyn ChannelArranger>,
        renderer: Arc<dyn WaveformRenderer>,
    ) -> Self {
        let state = Arc::new(Mutex::new(EngineState::Idle));
        let current = Arc::new(Mutex::new(None));
        let (render_tx, render_rx) = unbounded::<RenderRequest>();
        let (upload_tx, upload_rx) = unbounded::<UploadRequest>();
        let (event_tx, event_rx) = unbounded::<RenderEvent>();

        let render_handle = {
            let state = state.clone();
            let current = current.clone();
            let event_tx = event_tx.clone();
            thread::Builder::new()
                .name("render-worker".to_string())
                .spawn(move || {
                    render_worker(
                        render_rx, state, current, event_tx, extractor, arranger, renderer,
                    );
                })
                .expect("Failed to spawn render worker thread")
        };

        let upload_handle = {
            let state = state.clone();
            thread::Builder::new()
                .name("upload-worker".to_string())
                .spawn(move || {
                    upload_worker(upload_rx, state, event_tx);
                })
                .expect("Failed to spawn upload worker thread")
        };

        Self {
            state,
            view,
            inputs: Vec::new(),
            current,
            render_tx,
            upload_tx,
            event_rx,
            _render_handle: render_handle,
            _upload_handle: upload_handle,
        }
    }

    /// Current engine state
    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap()
    }

    /// True while a render or upload is running
    pub fn is_busy(&self) -> bool {
        self.state() != EngineState::Idle
    }

    /// Get a receiver for worker events.
    ///
    /// Each event is delivered to exactly one receiver; keep a single
    /// receiver per consumer.
    pub fn events(&self) -> Receiver<RenderEvent> {
        self.event_rx.clone()
    }

    /// The current view options
    pub fn view(&self) -> &ViewConfig {
        &self.view
    }

    /// The most recent composite, if any
    pub fn current_composite(&self) -> Option<Arc<CompositeImage>> {
        self.current.lock().unwrap().clone()
    }

    /// Transition Idle -> `next`, rejecting re-entrant triggers
    fn begin(&self, next: EngineState) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        if *state != EngineState::Idle {
            return Err(EngineError::Busy);
        }
        *state = next;
        Ok(())
    }

    fn dispatch_render(&self, paths: Vec<PathBuf>) -> Result<(), EngineError> {
        self.begin(EngineState::Rendering)?;
        if let Err(e) = self.render_tx.send(RenderRequest {
            paths,
            view: self.view.clone(),
        }) {
            log::error!("render worker disconnected: {}", e);
            *self.state.lock().unwrap() = EngineState::Idle;
            return Err(EngineError::StreamInit("render worker disconnected".into()));
        }
        Ok(())
    }

    /// Queue a batch of input files for rendering.
    ///
    /// Files are processed in the given order; per-file failures are
    /// reported as events and the batch continues. Rejected while busy.
    pub fn load_inputs(&mut self, paths: Vec<PathBuf>) -> Result<(), EngineError> {
        if paths.is_empty() {
            return Ok(());
        }
        self.dispatch_render(paths.clone())?;
        self.inputs = paths;
        Ok(())
    }

    /// Re-run the pipeline on the remembered inputs, if any
    fn retrigger(&self) -> Result<(), EngineError> {
        if self.inputs.is_empty() {
            return Ok(());
        }
        self.dispatch_render(self.inputs.clone())
    }

    /// Toggle the legend strip. Re-renders the current inputs.
    pub fn set_legend_visible(&mut self, visible: bool) -> Result<(), EngineError> {
        if self.is_busy() {
            return Err(EngineError::Busy);
        }
        self.view.show_legend = visible;
        self.retrigger()
    }

    /// Toggle band outlines. Re-renders the current inputs.
    pub fn set_outline(&mut self, outline: bool) -> Result<(), EngineError> {
        if self.is_busy() {
            return Err(EngineError::Busy);
        }
        self.view.outline = outline;
        self.retrigger()
    }

    /// Toggle high-quality peak scanning. Re-renders the current inputs.
    pub fn set_high_quality(&mut self, high_quality: bool) -> Result<(), EngineError> {
        if self.is_busy() {
            return Err(EngineError::Busy);
        }
        self.view.high_quality = high_quality;
        self.retrigger()
    }

    /// Toggle track label visibility.
    ///
    /// Labels are overlay data on the composite, so this never re-renders
    /// bitmaps; it only flips the view flag consumers honor.
    pub fn set_track_labels(&mut self, visible: bool) -> Result<(), EngineError> {
        if self.is_busy() {
            return Err(EngineError::Busy);
        }
        self.view.track_labels = visible;
        Ok(())
    }

    /// Resize the canvas. Re-renders the current inputs.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        if self.is_busy() {
            return Err(EngineError::Busy);
        }
        self.view.canvas_width = width;
        self.view.canvas_height = height;
        self.retrigger()
    }

    /// Save the current composite to `path` (.png keeps alpha, anything
    /// else encodes JPEG). Usable only while idle.
    pub fn export_composite(&self, path: &std::path::Path) -> Result<(), EngineError> {
        if self.is_busy() {
            return Err(EngineError::Busy);
        }
        let composite = self
            .current_composite()
            .ok_or(EngineError::NothingLoaded)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("png") => export::save_png(&composite, path)?,
            _ => export::save_jpeg(&composite, path)?,
        }
        Ok(())
    }

    /// Upload the current composite to the configured sharing service.
    ///
    /// Runs on the upload worker; the URL arrives as an `UploadCompleted`
    /// event. Usable only while idle.
    pub fn upload_composite(&self) -> Result<(), EngineError> {
        let composite = self
            .current_composite()
            .ok_or(EngineError::NothingLoaded)?;
        let jpeg = export::encode_jpeg(&composite)?;

        self.begin(EngineState::Uploading)?;
        if let Err(e) = self.upload_tx.send(UploadRequest {
            jpeg,
            config: self.view.upload.clone(),
        }) {
            log::error!("upload worker disconnected: {}", e);
            *self.state.lock().unwrap() = EngineState::Idle;
            return Err(EngineError::StreamInit("upload worker disconnected".into()));
        }
        Ok(())
    }
}

fn render_worker(
    rx: Receiver<RenderRequest>,
    state: Arc<Mutex<EngineState>>,
    current: Arc<Mutex<Option<Arc<CompositeImage>>>>,
    event_tx: Sender<RenderEvent>,
    extractor: Arc<dyn PayloadExtractor>,
    arranger: Arc<dyn ChannelArranger>,
    renderer: Arc<dyn WaveformRenderer>,
) {
    log::info!("render worker started");

    while let Ok(request) = rx.recv() {
        let total = request.paths.len();
        let mut rendered = 0usize;
        let mut failed = 0usize;

        for (index, path) in request.paths.iter().enumerate() {
            let _ = event_tx.send(RenderEvent::FileStarted {
                path: path.clone(),
                index,
                total,
            });

            match pipeline::render_file(path, &*extractor, &*arranger, &*renderer, &request.view)
            {
                Ok(composite) => {
                    let composite = Arc::new(composite);

                    // Multi-file batches persist every composite along the
                    // way; only the last one stays visible.
                    if total > 1 {
                        let out = export::default_export_path(path);
                        if let Err(e) = export::save_jpeg(&composite, &out) {
                            log::warn!("failed to persist batch composite: {}", e);
                        }
                    }

                    *current.lock().unwrap() = Some(composite.clone());
                    rendered += 1;
                    let _ = event_tx.send(RenderEvent::FileCompleted {
                        path: path.clone(),
                        composite,
                    });
                }
                Err(e) => {
                    log::error!("render failed for {:?}: {}", path, e);
                    // Never leave a stale composite visible after a failure
                    *current.lock().unwrap() = None;
                    failed += 1;
                    let _ = event_tx.send(RenderEvent::FileFailed {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        *state.lock().unwrap() = EngineState::Idle;
        let _ = event_tx.send(RenderEvent::BatchCompleted { rendered, failed });
    }

    log::info!("render worker exiting");
}

fn upload_worker(
    rx: Receiver<UploadRequest>,
    state: Arc<Mutex<EngineState>>,
    event_tx: Sender<RenderEvent>,
) {
    log::info!("upload worker started");

    while let Ok(request) = rx.recv() {
        let result = Uploader::new(request.config).upload(&request.jpeg);
        *state.lock().unwrap() = EngineState::Idle;
        let event = match result {
            Ok(url) => RenderEvent::UploadCompleted { url },
            Err(e) => {
                log::error!("upload failed: {}", e);
                RenderEvent::UploadFailed {
                    error: e.to_string(),
                }
            }
        };
        let _ = event_tx.send(event);
    }

    log::info!("upload worker exiting");
}
