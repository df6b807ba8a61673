// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::Path;

/// Audio error code constants
///
/// Error code range: 1001-1004
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// File could not be opened or decoded
    pub const READ_FAILED: i32 = 1001;

    /// File decoded but uses a sample layout we cannot convert
    pub const UNSUPPORTED_FORMAT: i32 = 1002;

    /// Output file could not be created or finalized
    pub const WRITE_FAILED: i32 = 1003;

    /// Sample rate conversion failed
    pub const RESAMPLE_FAILED: i32 = 1004;
}

/// Log an audio error with structured context
///
/// The caller decides whether the error is fatal; this only records it.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioIo, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover decoding, encoding and resampling of WAV files.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// File could not be opened or decoded
    ReadFailed { path: String, reason: String },

    /// Sample layout is not supported
    UnsupportedFormat { path: String, details: String },

    /// Output file could not be written
    WriteFailed { path: String, reason: String },

    /// Resampler construction or processing failed
    ResampleFailed { reason: String },
}

impl AudioError {
    pub(crate) fn read_failed(path: &Path, reason: impl fmt::Display) -> Self {
        AudioError::ReadFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write_failed(path: &Path, reason: impl fmt::Display) -> Self {
        AudioError::WriteFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::ReadFailed { .. } => AudioErrorCodes::READ_FAILED,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::WriteFailed { .. } => AudioErrorCodes::WRITE_FAILED,
            AudioError::ResampleFailed { .. } => AudioErrorCodes::RESAMPLE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::ReadFailed { path, reason } => {
                format!("Failed to read audio from \"{}\": {}", path, reason)
            }
            AudioError::UnsupportedFormat { path, details } => {
                format!("Unsupported audio format in \"{}\": {}", path, details)
            }
            AudioError::WriteFailed { path, reason } => {
                format!("Failed to write audio to \"{}\": {}", path, reason)
            }
            AudioError::ResampleFailed { reason } => {
                format!("Resampling failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::ReadFailed {
                path: "a.wav".to_string(),
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::READ_FAILED
        );
        assert_eq!(
            AudioError::UnsupportedFormat {
                path: "a.wav".to_string(),
                details: "test".to_string()
            }
            .code(),
            AudioErrorCodes::UNSUPPORTED_FORMAT
        );
        assert_eq!(
            AudioError::WriteFailed {
                path: "a.wav".to_string(),
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::WRITE_FAILED
        );
        assert_eq!(
            AudioError::ResampleFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::RESAMPLE_FAILED
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::read_failed(Path::new("/tmp/x.wav"), "truncated header");
        assert_eq!(
            err.message(),
            "Failed to read audio from \"/tmp/x.wav\": truncated header"
        );

        let err = AudioError::write_failed(Path::new("/tmp/y.wav"), "disk full");
        assert!(err.message().contains("disk full"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::ResampleFailed {
            reason: "ratio".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
