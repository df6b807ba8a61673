// Audio module - WAV decoding/encoding and sample rate conversion

pub mod io;
pub mod resample;

// Re-export commonly used types for convenience
pub use io::{fit_length, list_wav_files, read_audio_file, write_wav, TargetLength, Waveform};
pub use resample::resample;
