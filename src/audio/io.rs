//! WAV file adapter used by both pipeline phases.
//!
//! Every file is decoded to `f32`, averaged down to mono and resampled to the
//! pipeline rate. Callers may ask for an exact length, in which case short
//! inputs gain trailing silence and long inputs keep their head.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::audio::resample::resample;
use crate::error::AudioError;

/// Mono waveform at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Requested output length for [`read_audio_file`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetLength {
    /// Length in seconds at the target rate
    Duration(f64),
    /// Exact number of samples
    Samples(usize),
}

impl TargetLength {
    fn total_samples(self, target_rate: u32) -> usize {
        match self {
            TargetLength::Duration(secs) => (target_rate as f64 * secs) as usize,
            TargetLength::Samples(samples) => samples,
        }
    }
}

/// Read a WAV file as mono at `target_rate`, optionally padded or clipped
pub fn read_audio_file(
    path: &Path,
    target_rate: u32,
    target: Option<TargetLength>,
) -> Result<Waveform, AudioError> {
    let (interleaved, sample_rate, channels) = decode_wav(path)?;
    let mono = downmix(interleaved, channels);
    let samples = if sample_rate == target_rate {
        mono
    } else {
        resample(&mono, sample_rate as f64, target_rate as f64)?
    };

    let samples = match target {
        Some(target) => fit_length(samples, target.total_samples(target_rate)),
        None => samples,
    };

    Ok(Waveform::new(samples, target_rate))
}

/// Pad with trailing zeros or drop the tail so exactly `total_samples` remain
pub fn fit_length(mut samples: Vec<f32>, total_samples: usize) -> Vec<f32> {
    samples.resize(total_samples, 0.0);
    samples
}

/// Write mono 32-bit float PCM
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|err| AudioError::write_failed(path, err))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|err| AudioError::write_failed(path, err))?;
    }
    writer
        .finalize()
        .map_err(|err| AudioError::write_failed(path, err))
}

/// `*.wav` files directly inside `dir`, sorted by path
pub fn list_wav_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "wav") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32, u16), AudioError> {
    let mut reader =
        hound::WavReader::open(path).map_err(|err| AudioError::read_failed(path, err))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::UnsupportedFormat {
            path: path.display().to_string(),
            details: "zero channels".to_string(),
        });
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| AudioError::read_failed(path, err)))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            match spec.bits_per_sample {
                8 => reader
                    .samples::<i8>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / scale)
                            .map_err(|err| AudioError::read_failed(path, err))
                    })
                    .collect::<Result<Vec<f32>, _>>()?,
                16 => reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / scale)
                            .map_err(|err| AudioError::read_failed(path, err))
                    })
                    .collect::<Result<Vec<f32>, _>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / scale)
                            .map_err(|err| AudioError::read_failed(path, err))
                    })
                    .collect::<Result<Vec<f32>, _>>()?,
                bits => {
                    return Err(AudioError::UnsupportedFormat {
                        path: path.display().to_string(),
                        details: format!("bits_per_sample={}", bits),
                    })
                }
            }
        }
    };

    Ok((samples, spec.sample_rate, spec.channels))
}

fn downmix(interleaved: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }

    interleaved
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_int_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[Vec<i16>]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &sample in frame {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_fit_length_pads_and_clips() {
        assert_eq!(fit_length(vec![1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(fit_length(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
    }

    #[test]
    fn test_fit_length_is_idempotent_on_exact_length() {
        let samples: Vec<f32> = (0..600).map(|i| (i as f32 * 0.01).sin()).collect();
        let once = fit_length(samples.clone(), 600);
        assert_eq!(once, samples);
        assert_eq!(fit_length(once.clone(), 600), once);
    }

    #[test]
    fn test_write_then_read_exact_length_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..16_000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin())
            .collect();
        write_wav(&path, &samples, 16_000).unwrap();

        let waveform =
            read_audio_file(&path, 16_000, Some(TargetLength::Samples(samples.len()))).unwrap();
        assert_eq!(waveform.sample_rate, 16_000);
        assert_eq!(waveform.samples, samples);
    }

    #[test]
    fn test_stereo_is_averaged_to_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_int_wav(
            &path,
            2,
            16_000,
            &[vec![16_384, 0], vec![-16_384, -16_384], vec![0, 8_192]],
        );

        let waveform = read_audio_file(&path, 16_000, None).unwrap();
        assert_eq!(waveform.len(), 3);
        assert!((waveform.samples[0] - 0.25).abs() < 1e-6);
        assert!((waveform.samples[1] + 0.5).abs() < 1e-6);
        assert!((waveform.samples[2] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_duration_target_pads_with_silence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, &[0.1, 0.2, 0.3], 16_000).unwrap();

        let waveform =
            read_audio_file(&path, 16_000, Some(TargetLength::Duration(0.001))).unwrap();
        assert_eq!(waveform.len(), 16);
        assert_eq!(&waveform.samples[..3], &[0.1, 0.2, 0.3]);
        assert!(waveform.samples[3..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_resamples_to_target_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("8k.wav");
        let samples: Vec<f32> = (0..8_000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 200.0 * i as f32 / 8_000.0).sin())
            .collect();
        write_wav(&path, &samples, 8_000).unwrap();

        let waveform = read_audio_file(&path, 16_000, None).unwrap();
        assert_eq!(waveform.sample_rate, 16_000);
        assert_eq!(waveform.len(), 16_000);
    }

    #[test]
    fn test_garbage_file_is_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"not a wav file").unwrap();

        let err = read_audio_file(&path, 16_000, None).unwrap_err();
        assert!(matches!(err, AudioError::ReadFailed { .. }));
    }

    #[test]
    fn test_list_wav_files_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["b.wav", "a.wav", "notes.txt", "c.WAV"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let files = list_wav_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
    }

    #[test]
    fn test_empty_data_chunk_decodes_to_empty_waveform() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &[], 16_000).unwrap();

        let waveform = read_audio_file(&path, 16_000, None).unwrap();
        assert!(waveform.is_empty());
    }
}
