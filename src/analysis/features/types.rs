// Types module - Data structures for extracted features
//
// A feature tensor holds one example: frames on the first axis, mel bands on
// the second and the stacked channels (log-mel, delta, delta-delta) on the
// third.

use ndarray::Array3;

/// Number of stacked channels per frame
pub const FEATURE_CHANNELS: usize = 3;

/// Reference-relative floor applied by the decibel conversion
pub const TOP_DB: f32 = 80.0;

/// Smallest power considered by the decibel conversion
pub const AMIN: f32 = 1e-10;

/// Features of one example, shaped `(frames, num_mels, FEATURE_CHANNELS)`
pub type FeatureTensor = Array3<f32>;

/// Expected tensor shape for a given frame count and band count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureShape {
    pub frames: usize,
    pub mels: usize,
    pub channels: usize,
}

impl FeatureShape {
    pub fn new(frames: usize, mels: usize) -> Self {
        Self {
            frames,
            mels,
            channels: FEATURE_CHANNELS,
        }
    }

    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.frames, self.mels, self.channels)
    }

    /// Number of scalar values in one example
    pub fn len(&self) -> usize {
        self.frames * self.mels * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn matches(&self, tensor: &FeatureTensor) -> bool {
        tensor.dim() == self.as_tuple()
    }
}
