use std::fmt;

/// User-facing message for a failed gallery save.
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save photo. Please try again.";

/// Failures of the photo pipeline and gallery sink.
///
/// `EffectEngine` never escapes `process_photo`; the orchestrator turns it
/// into a fallback to the resized image.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    Decode(String),
    Resize(String),
    EffectEngine(String),
    Encode(String),
    Save(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Decode(msg) => write!(f, "decode error: {msg}"),
            PipelineError::Resize(msg) => write!(f, "resize error: {msg}"),
            PipelineError::EffectEngine(msg) => write!(f, "effect engine error: {msg}"),
            PipelineError::Encode(msg) => write!(f, "encode error: {msg}"),
            PipelineError::Save(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}
