// Analysis module - spectral feature extraction for keyword examples
//
// The extraction phase decodes each augmented waveform and turns it into a
// fixed-shape tensor here; see `features` for the individual stages.

pub mod features;

pub use features::{FeatureExtractor, FeatureShape, FeatureTensor};
