// Keyword dataset preparation
// Augments labelled keyword recordings and extracts stacked log-mel features

// Module declarations
pub mod analysis;
pub mod audio;
pub mod augment;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod progress;

// Re-exports for convenience
pub use augment::{AugmentOptions, AugmentReport, Augmenter};
pub use config::PipelineConfig;
pub use dataset::{ClassMap, ExtractionReport};
pub use error::{AudioError, ErrorCode, PipelineError, PipelineResult};
pub use pipeline::{
    preprocess, preprocess_denoise, DatasetPaths, PreprocessReport, PreprocessRequest,
};
