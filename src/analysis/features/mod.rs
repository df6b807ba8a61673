// FeatureExtractor - log-mel front end for keyword spotting examples
//
// Each example is a fixed-length waveform turned into a stack of three
// per-frame representations: the scaled log-mel spectrogram and its first
// and second temporal derivatives.
//
// Module organization:
// - types: Tensor alias, shape helper and scaling constants
// - fft: STFT with a periodic Hann window
// - mel: Slaney filterbank and power-to-decibel conversion
// - delta: Savitzky-Golay derivatives along the frame axis
// - mod.rs: Coordinator (FeatureExtractor)
//
// Pipeline per example:
// 1. Power STFT without centering (fft_length window, hop_length hop)
// 2. Mel projection, fmin 0 Hz, fmax at Nyquist
// 3. Decibels relative to the example maximum, floored 80 dB below it
// 4. First window_length frames, scaled by 1/80 and offset by 0.5
// 5. Width-5 deltas of order 1 and 2 over the scaled log-mel

mod delta;
mod fft;
mod mel;
mod types;

pub use delta::delta;
pub use fft::{hann_window, FftProcessor};
pub use mel::{apply_filter_bank, hz_to_mel, mel_filter_bank, mel_to_hz, power_to_db};
pub use types::{FeatureShape, FeatureTensor, AMIN, FEATURE_CHANNELS, TOP_DB};

use crate::config::{DataConfig, FrameGeometry};
use crate::error::{PipelineError, PipelineResult};

/// FeatureExtractor coordinates the log-mel and delta computation
///
/// Built once per extraction run; the FFT plan and the filterbank are shared
/// by every example.
pub struct FeatureExtractor {
    fft_processor: FftProcessor,
    mel_bank: Vec<Vec<f32>>,
    hop_length: usize,
    delta_width: usize,
    geometry: FrameGeometry,
    shape: FeatureShape,
}

impl FeatureExtractor {
    /// Create a new FeatureExtractor
    ///
    /// # Arguments
    /// * `data` - Spectral parameters
    /// * `geometry` - Frame geometry derived from the keyword duration
    ///
    /// # Errors
    /// Configuration error if the parameters are invalid or the window holds
    /// fewer frames than the delta filter needs.
    pub fn new(data: &DataConfig, geometry: FrameGeometry) -> PipelineResult<Self> {
        data.validate()?;
        if geometry.window_length < data.delta_width {
            return Err(PipelineError::config(format!(
                "window of {} frames is shorter than the delta width {}",
                geometry.window_length, data.delta_width
            )));
        }

        let nyquist = data.sample_rate as f64 / 2.0;
        Ok(Self {
            fft_processor: FftProcessor::new(data.fft_length),
            mel_bank: mel_filter_bank(
                data.num_mels,
                data.fft_length,
                data.sample_rate,
                0.0,
                nyquist,
            ),
            hop_length: data.hop_length,
            delta_width: data.delta_width,
            geometry,
            shape: FeatureShape::new(geometry.window_length, data.num_mels),
        })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Shape every well-formed example produces
    pub fn shape(&self) -> FeatureShape {
        self.shape
    }

    /// Scaled log-mel spectrogram, `[frame][band]`
    ///
    /// Values lie in `[-0.5, 0.5]`; at most `window_length` frames are kept.
    pub fn log_mel(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let power = self.fft_processor.power_spectrogram(samples, self.hop_length);
        let mel = apply_filter_bank(&power, &self.mel_bank);
        power_to_db(&mel, AMIN, TOP_DB)
            .into_iter()
            .take(self.geometry.window_length)
            .map(|frame| frame.into_iter().map(|db| db / TOP_DB + 0.5).collect())
            .collect()
    }

    /// Full feature tensor for one waveform
    ///
    /// The frame axis reflects what the input yields; callers compare the
    /// result against [`shape`](Self::shape) to reject malformed examples.
    pub fn extract(&self, samples: &[f32]) -> FeatureTensor {
        let mel = self.log_mel(samples);
        let first = delta(&mel, self.delta_width, 1);
        let second = delta(&mel, self.delta_width, 2);

        let frames = mel.len();
        let bands = self.shape.mels;
        let mut features = FeatureTensor::zeros((frames, bands, FEATURE_CHANNELS));
        for (t, ((m, d1), d2)) in mel.iter().zip(&first).zip(&second).enumerate() {
            for band in 0..bands {
                features[[t, band, 0]] = m[band];
                features[[t, band, 1]] = d1[band];
                features[[t, band, 2]] = d2[band];
            }
        }

        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FeatureExtractor {
        let data = DataConfig::default();
        let geometry = data.geometry(1000.0).unwrap();
        FeatureExtractor::new(&data, geometry).unwrap()
    }

    fn chirp(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 16_000.0;
                0.5 * (2.0 * std::f32::consts::PI * (200.0 + 1500.0 * t) * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_extract_shape_for_one_second() {
        let extractor = extractor();
        let features = extractor.extract(&chirp(16_000));
        assert_eq!(features.dim(), (79, 40, 3));
        assert!(extractor.shape().matches(&features));
    }

    #[test]
    fn test_log_mel_range() {
        let extractor = extractor();
        let mel = extractor.log_mel(&chirp(16_000));
        assert_eq!(mel.len(), 79);
        let values: Vec<f32> = mel.into_iter().flatten().collect();
        assert!(values.iter().all(|&v| (-0.5 - 1e-6..=0.5 + 1e-6).contains(&v)));
        // the loudest bin is the reference
        let peak = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!((peak - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_silence_is_constant_with_zero_deltas() {
        let extractor = extractor();
        let features = extractor.extract(&vec![0.0; 16_000]);
        for t in 0..79 {
            for band in 0..40 {
                assert!((features[[t, band, 0]] - 0.5).abs() < 1e-6);
                assert!(features[[t, band, 1]].abs() < 1e-6);
                assert!(features[[t, band, 2]].abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_short_input_yields_fewer_frames() {
        let extractor = extractor();
        let features = extractor.extract(&chirp(8_000));
        assert_eq!(features.dim().0, 39);
        assert!(!extractor.shape().matches(&features));
    }

    #[test]
    fn test_window_shorter_than_delta_rejected() {
        let data = DataConfig::default();
        let geometry = data.geometry_for_window(800, 3);
        assert!(FeatureExtractor::new(&data, geometry).is_err());
    }
}
