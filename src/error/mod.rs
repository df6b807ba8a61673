// Error types for the keyword dataset pipeline
//
// This module defines custom error types for audio I/O and pipeline operations,
// providing structured error handling with stable numeric error codes.

mod audio;
mod pipeline;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting from the
/// library and the command line driver.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Result alias used across the pipeline
pub type PipelineResult<T> = Result<T, PipelineError>;
