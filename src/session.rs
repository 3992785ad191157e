use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::capture::CaptureSource;
use crate::error::PipelineError;
use crate::gallery::Gallery;
use crate::processing::pipeline::{PhotoPipeline, ProcessedPhoto};
use crate::processing::retro::Seed;
use crate::settings::CameraSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Capturing,
    Previewing,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturePhase::Idle => write!(f, "idle"),
            CapturePhase::Capturing => write!(f, "capturing"),
            CapturePhase::Previewing => write!(f, "previewing"),
        }
    }
}

#[derive(Debug)]
enum CaptureState {
    Idle,
    Capturing { started: Instant },
    Previewing(ProcessedPhoto),
}

#[derive(Debug)]
pub enum SessionError {
    /// A capture was requested while the session was not idle.
    Busy(CapturePhase),
    NotPreviewing(CapturePhase),
    NotCapturing,
    TimedOut(Duration),
    Capture(String),
    Pipeline(PipelineError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Busy(phase) => write!(f, "capture rejected: session is {phase}"),
            SessionError::NotPreviewing(phase) => {
                write!(f, "no photo to preview: session is {phase}")
            }
            SessionError::NotCapturing => write!(f, "no capture in flight"),
            SessionError::TimedOut(after) => {
                write!(f, "capture timed out after {:.1}s", after.as_secs_f32())
            }
            SessionError::Capture(msg) => write!(f, "capture failed: {msg}"),
            SessionError::Pipeline(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<PipelineError> for SessionError {
    fn from(err: PipelineError) -> Self {
        SessionError::Pipeline(err)
    }
}

struct WorkerResult {
    generation: u64,
    result: Result<ProcessedPhoto, PipelineError>,
}

/// Idle → Capturing → Previewing → Idle, with at most one capture in flight.
///
/// Processing runs on a worker thread. A capture that outlives its timeout
/// is abandoned: the session returns to Idle and the late result is dropped.
pub struct CaptureSession {
    pipeline: Arc<PhotoPipeline>,
    state: CaptureState,
    generation: u64,
    tx: mpsc::Sender<WorkerResult>,
    rx: mpsc::Receiver<WorkerResult>,
}

impl CaptureSession {
    pub fn new(pipeline: PhotoPipeline) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            pipeline: Arc::new(pipeline),
            state: CaptureState::Idle,
            generation: 0,
            tx,
            rx,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        match self.state {
            CaptureState::Idle => CapturePhase::Idle,
            CaptureState::Capturing { .. } => CapturePhase::Capturing,
            CaptureState::Previewing(_) => CapturePhase::Previewing,
        }
    }

    pub fn preview(&self) -> Option<&ProcessedPhoto> {
        match &self.state {
            CaptureState::Previewing(photo) => Some(photo),
            _ => None,
        }
    }

    /// Grabs a frame and starts processing it in the background.
    pub fn begin_capture(
        &mut self,
        source: &mut dyn CaptureSource,
        settings: CameraSettings,
        seed: Seed,
    ) -> Result<(), SessionError> {
        self.drain();
        if !matches!(self.state, CaptureState::Idle) {
            tracing::debug!(phase = %self.phase(), "ignoring capture request");
            return Err(SessionError::Busy(self.phase()));
        }

        let raw = source
            .capture()
            .map_err(|e| SessionError::Capture(format!("{e:#}")))?;
        tracing::info!(
            path = %raw.path.display(),
            width = raw.width,
            height = raw.height,
            "capture started"
        );

        self.generation += 1;
        self.state = CaptureState::Capturing {
            started: Instant::now(),
        };

        let generation = self.generation;
        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let result = pipeline.process_photo(&raw.path, &settings, seed);
            let _ = tx.send(WorkerResult { generation, result });
        });
        Ok(())
    }

    /// Applies any finished result without blocking.
    pub fn poll(&mut self) -> Option<Result<(), SessionError>> {
        while let Ok(msg) = self.rx.try_recv() {
            if let Some(outcome) = self.accept(msg) {
                return Some(outcome);
            }
        }
        None
    }

    /// Blocks until the in-flight capture finishes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Result<&ProcessedPhoto, SessionError> {
        match self.phase() {
            CapturePhase::Idle => return Err(SessionError::NotCapturing),
            CapturePhase::Previewing => {
                return self
                    .preview()
                    .ok_or(SessionError::NotPreviewing(CapturePhase::Idle));
            }
            CapturePhase::Capturing => {}
        }
        let CaptureState::Capturing { started } = self.state else {
            return Err(SessionError::NotCapturing);
        };

        let deadline = started + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(msg) => {
                    if let Some(outcome) = self.accept(msg) {
                        outcome?;
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    tracing::warn!(timeout = ?timeout, "capture timed out; abandoning it");
                    self.generation += 1;
                    self.state = CaptureState::Idle;
                    return Err(SessionError::TimedOut(timeout));
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    self.state = CaptureState::Idle;
                    return Err(SessionError::NotCapturing);
                }
            }
        }

        self.preview()
            .ok_or(SessionError::NotPreviewing(CapturePhase::Idle))
    }

    /// Saves the previewed photo. A failed save keeps the preview for retry.
    pub fn save(&mut self, gallery: &Gallery) -> Result<PathBuf, SessionError> {
        let CaptureState::Previewing(photo) = &self.state else {
            return Err(SessionError::NotPreviewing(self.phase()));
        };
        let saved = gallery.save_photo_to_gallery(&photo.artifact)?;
        remove_artifact(&photo.artifact.path);
        self.state = CaptureState::Idle;
        Ok(saved)
    }

    /// Drops the previewed photo and returns to Idle.
    pub fn discard(&mut self) -> Result<(), SessionError> {
        let CaptureState::Previewing(photo) = &self.state else {
            return Err(SessionError::NotPreviewing(self.phase()));
        };
        remove_artifact(&photo.artifact.path);
        self.state = CaptureState::Idle;
        Ok(())
    }

    fn drain(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            if let Some(Err(e)) = self.accept(msg) {
                tracing::warn!(error = %e, "capture failed");
            }
        }
    }

    /// Returns `None` for results of abandoned captures.
    fn accept(&mut self, msg: WorkerResult) -> Option<Result<(), SessionError>> {
        let current = msg.generation == self.generation
            && matches!(self.state, CaptureState::Capturing { .. });
        if !current {
            if let Ok(photo) = msg.result {
                tracing::debug!(path = %photo.artifact.path.display(), "dropping stale capture");
                remove_artifact(&photo.artifact.path);
            }
            return None;
        }

        match msg.result {
            Ok(photo) => {
                self.state = CaptureState::Previewing(photo);
                Some(Ok(()))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to process photo");
                self.state = CaptureState::Idle;
                Some(Err(SessionError::Pipeline(e)))
            }
        }
    }
}

fn remove_artifact(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove photo");
    }
}
