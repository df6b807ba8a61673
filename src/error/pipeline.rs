// Pipeline error types and constants

use crate::error::{AudioError, ErrorCode};
use log::error;
use std::fmt;

/// Pipeline error code constants
///
/// Error code range: 2001-2007
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Wrapped audio read/write error
    pub const AUDIO: i32 = 2001;

    /// Extracted feature frame count differs from the window length
    pub const SHAPE_MISMATCH: i32 = 2002;

    /// Compression utility failed or exited non-zero
    pub const EXTERNAL_TOOL: i32 = 2003;

    /// Missing path, invalid parameter or malformed class mapping
    pub const CONFIGURATION: i32 = 2004;

    /// Filesystem error outside audio decoding
    pub const IO: i32 = 2005;

    /// Dataset container could not be built, written or read
    pub const DATASET: i32 = 2006;

    /// A worker task panicked
    pub const WORKER_PANICKED: i32 = 2007;
}

/// Log a pipeline error with structured context
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the augmentation and extraction pipeline
///
/// Extraction recovers `Audio` and `ShapeMismatch` per file; every other
/// variant aborts the phase that raised it.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Audio decoding or encoding failed
    Audio(AudioError),

    /// Feature tensor has the wrong number of frames
    ShapeMismatch {
        file: String,
        expected: usize,
        actual: usize,
    },

    /// External compression utility failed
    ExternalTool {
        program: String,
        status: Option<i32>,
        details: String,
    },

    /// Invalid configuration detected before work was dispatched
    Configuration { reason: String },

    /// Filesystem error
    Io { path: String, reason: String },

    /// Dataset container error
    Dataset { reason: String },

    /// Worker task panicked or was cancelled
    WorkerPanicked { details: String },
}

impl PipelineError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        PipelineError::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn dataset(reason: impl fmt::Display) -> Self {
        PipelineError::Dataset {
            reason: reason.to_string(),
        }
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::Audio(_) => PipelineErrorCodes::AUDIO,
            PipelineError::ShapeMismatch { .. } => PipelineErrorCodes::SHAPE_MISMATCH,
            PipelineError::ExternalTool { .. } => PipelineErrorCodes::EXTERNAL_TOOL,
            PipelineError::Configuration { .. } => PipelineErrorCodes::CONFIGURATION,
            PipelineError::Io { .. } => PipelineErrorCodes::IO,
            PipelineError::Dataset { .. } => PipelineErrorCodes::DATASET,
            PipelineError::WorkerPanicked { .. } => PipelineErrorCodes::WORKER_PANICKED,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::Audio(err) => err.message(),
            PipelineError::ShapeMismatch {
                file,
                expected,
                actual,
            } => format!(
                "Failed to extract features for {}: expected {} frames, got {}",
                file, expected, actual
            ),
            PipelineError::ExternalTool {
                program,
                status,
                details,
            } => match status {
                Some(code) => format!("{} exited with status {}: {}", program, code, details),
                None => format!("{} failed: {}", program, details),
            },
            PipelineError::Configuration { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            PipelineError::Io { path, reason } => {
                format!("I/O error on {}: {}", path, reason)
            }
            PipelineError::Dataset { reason } => format!("Dataset error: {}", reason),
            PipelineError::WorkerPanicked { details } => {
                format!("Augmentation worker failed: {}", details)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Audio(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AudioError> for PipelineError {
    fn from(err: AudioError) -> Self {
        PipelineError::Audio(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io {
            path: String::new(),
            reason: err.to_string(),
        }
    }
}
