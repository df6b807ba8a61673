//! Configuration management for the preprocessing pipeline
//!
//! This module provides runtime configuration loading from JSON files so the
//! augmentation catalog and spectral parameters can be adjusted without
//! recompilation. Every section falls back to its defaults when omitted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ErrorCode, PipelineError, PipelineResult};

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub augment: AugmentConfig,
    pub drc: DrcConfig,
}

/// Sample rate and spectral parameters shared by augmentation and extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Target sample rate in Hz; every file is resampled to it
    pub sample_rate: u32,
    /// STFT window length in samples
    pub fft_length: usize,
    /// STFT hop length in samples
    pub hop_length: usize,
    /// Number of mel bands
    pub num_mels: usize,
    /// Channels stacked per frame (mel, delta1, delta2)
    pub num_features: usize,
    /// Frame width of the delta filters (odd)
    pub delta_width: usize,
    /// When set, each shifted waveform is mixed with this many distinct
    /// noise files drawn without replacement instead of every noise file.
    /// Zero behaves like unset.
    pub num_noise_augmentations: Option<usize>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            fft_length: 400,
            hop_length: 200,
            num_mels: 40,
            num_features: 3,
            delta_width: 5,
            num_noise_augmentations: None,
        }
    }
}

/// Frame-aligned lengths derived from the keyword duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Keyword length in samples
    pub keyword_length: usize,
    /// Number of spectrogram frames per example
    pub window_length: usize,
    /// Exact sample count fed to the STFT
    pub num_samples: usize,
}

impl DataConfig {
    /// Keyword length in samples for a duration in milliseconds
    pub fn keyword_length(&self, keyword_duration_ms: f64) -> usize {
        (keyword_duration_ms * self.sample_rate as f64 / 1000.0) as usize
    }

    /// Derive the window length and exact sample count for a keyword duration
    ///
    /// `window_length = floor((keyword_length - fft_length + hop_length) / hop_length)`
    /// and `num_samples = hop_length * window_length + (fft_length - hop_length)`.
    pub fn geometry(&self, keyword_duration_ms: f64) -> PipelineResult<FrameGeometry> {
        self.validate()?;
        let keyword_length = self.keyword_length(keyword_duration_ms);
        let span = keyword_length as i64 - self.fft_length as i64 + self.hop_length as i64;
        if span < self.hop_length as i64 {
            return Err(PipelineError::config(format!(
                "keyword duration {}ms ({} samples) is shorter than one FFT window of {} samples",
                keyword_duration_ms, keyword_length, self.fft_length
            )));
        }
        let window_length = (span / self.hop_length as i64) as usize;
        Ok(self.geometry_for_window(keyword_length, window_length))
    }

    /// Geometry for an explicit window length
    pub fn geometry_for_window(
        &self,
        keyword_length: usize,
        window_length: usize,
    ) -> FrameGeometry {
        FrameGeometry {
            keyword_length,
            window_length,
            num_samples: self.hop_length * window_length + (self.fft_length - self.hop_length),
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.sample_rate == 0 {
            return Err(PipelineError::config("sample_rate must be greater than zero"));
        }
        if self.hop_length == 0 || self.fft_length == 0 {
            return Err(PipelineError::config(
                "fft_length and hop_length must be greater than zero",
            ));
        }
        if self.hop_length > self.fft_length {
            return Err(PipelineError::config(format!(
                "hop_length {} exceeds fft_length {}",
                self.hop_length, self.fft_length
            )));
        }
        if self.num_mels == 0 {
            return Err(PipelineError::config("num_mels must be greater than zero"));
        }
        if self.num_features != 3 {
            return Err(PipelineError::config(format!(
                "num_features must be 3 (mel, delta1, delta2), got {}",
                self.num_features
            )));
        }
        if self.delta_width < 3 || self.delta_width % 2 == 0 {
            return Err(PipelineError::config(format!(
                "delta_width must be odd and at least 3, got {}",
                self.delta_width
            )));
        }
        Ok(())
    }
}

/// Interpolation weight range for background noise mixing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseGain {
    pub min: f32,
    pub max: f32,
}

impl Default for NoiseGain {
    fn default() -> Self {
        Self { min: 0.1, max: 0.4 }
    }
}

/// Augmentation catalog and orchestration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Leading samples dropped per shift variant; 0 keeps the waveform as is
    pub time_shift_steps: Vec<usize>,
    /// Time stretch rates (pitch preserved)
    pub time_stretch_rates: Vec<f32>,
    /// Coarse pitch shift steps in semitones
    pub pitch_shift_steps: Vec<f32>,
    /// Fine pitch shift steps in semitones, applied after the coarse ones
    pub pitch_shift_steps_fine: Vec<f32>,
    pub noise_gain: NoiseGain,
    /// Classes kept as originals only in validation mode
    pub skip_classes: Vec<String>,
    /// Label given to chunks cut from noise files
    pub noise_label: String,
    /// Seed for noise offsets and weights; drawn from entropy when absent
    pub seed: Option<u64>,
    /// Worker pool size; defaults to available parallelism
    pub num_workers: Option<usize>,
    pub show_progress: bool,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            time_shift_steps: vec![0, 400],
            time_stretch_rates: vec![0.95, 1.05, 1.10, 1.07, 1.15],
            pitch_shift_steps: vec![-2.0, -1.0, 1.0, 2.0],
            pitch_shift_steps_fine: vec![-3.5, -2.5, 2.5, 3.5],
            noise_gain: NoiseGain::default(),
            skip_classes: vec!["unknownkeywords".to_string()],
            noise_label: "unknownkeywords-noise".to_string(),
            seed: None,
            num_workers: None,
            show_progress: true,
        }
    }
}

impl AugmentConfig {
    /// Coarse then fine pitch steps, in dispatch order
    pub fn all_pitch_steps(&self) -> Vec<f32> {
        self.pitch_shift_steps
            .iter()
            .chain(self.pitch_shift_steps_fine.iter())
            .copied()
            .collect()
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if let Some(rate) = self
            .time_stretch_rates
            .iter()
            .find(|rate| !rate.is_finite() || **rate <= 0.0)
        {
            return Err(PipelineError::config(format!(
                "time stretch rate must be positive, got {}",
                rate
            )));
        }
        if let Some(step) = self.all_pitch_steps().iter().find(|step| !step.is_finite()) {
            return Err(PipelineError::config(format!(
                "pitch shift step must be finite, got {}",
                step
            )));
        }
        let gain = self.noise_gain;
        if !(0.0..=1.0).contains(&gain.min)
            || !(0.0..=1.0).contains(&gain.max)
            || gain.min > gain.max
        {
            return Err(PipelineError::config(format!(
                "noise gain range [{}, {}] must satisfy 0 <= min <= max <= 1",
                gain.min, gain.max
            )));
        }
        if self.noise_label.split('-').next().unwrap_or("").is_empty() {
            return Err(PipelineError::config(
                "noise_label must start with a class name",
            ));
        }
        if self.num_workers == Some(0) {
            return Err(PipelineError::config("num_workers must be at least 1"));
        }
        Ok(())
    }
}

/// A compressor preset: either a catalog name or raw `compand` arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DrcPresetSpec {
    Named(String),
    Args(Vec<String>),
}

/// Dynamic range compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrcConfig {
    /// Compression utility invoked per task
    pub program: String,
    /// Active presets; empty disables compression variants
    pub presets: Vec<DrcPresetSpec>,
}

impl Default for DrcConfig {
    fn default() -> Self {
        Self {
            program: "sox".to_string(),
            presets: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    ///
    /// Missing sections use their defaults; unreadable or malformed files
    /// are configuration errors.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            PipelineError::config(format!("failed to read config {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|err| {
            PipelineError::config(format!("failed to parse config {}: {}", path.display(), err))
        })?;
        log::info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is unusable
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("[Config] {}. Using defaults.", err.message());
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        self.data.validate()?;
        self.augment.validate()?;
        crate::augment::drc::resolve_presets(&self.drc.presets)?;
        Ok(())
    }
}
