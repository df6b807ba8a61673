//! Waveform-to-waveform augmentation transforms.
//!
//! All transforms are pure: they take samples (and a random source where
//! noise is involved) and return new samples at the same sample rate.

use rand::Rng;
use rustfft::num_complex::Complex;

use crate::analysis::features::FftProcessor;
use crate::audio::{fit_length, resample};
use crate::config::NoiseGain;
use crate::error::AudioError;

/// Phase vocoder frame length
pub const STRETCH_FFT_SIZE: usize = 2048;

/// Phase vocoder hop length
pub const STRETCH_HOP: usize = STRETCH_FFT_SIZE / 4;

/// Drop the first `shift` samples
///
/// A shift at or beyond the end yields an empty waveform.
pub fn time_shift(samples: &[f32], shift: usize) -> Vec<f32> {
    samples.get(shift..).unwrap_or(&[]).to_vec()
}

/// Stretch by `rate` without changing pitch
///
/// `rate > 1` speeds up; the output has `round(len / rate)` samples.
pub fn time_stretch(samples: &[f32], rate: f32) -> Vec<f32> {
    if samples.is_empty() || rate <= 0.0 {
        return Vec::new();
    }
    let target_len = (samples.len() as f64 / rate as f64).round() as usize;

    let fft = FftProcessor::new(STRETCH_FFT_SIZE);
    let padded = pad_center(samples, STRETCH_FFT_SIZE / 2);
    let spectra = fft.stft(&padded, STRETCH_HOP);
    let stretched = phase_vocoder(&spectra, rate, STRETCH_HOP, STRETCH_FFT_SIZE);

    overlap_add(&fft, &stretched, STRETCH_HOP, target_len)
}

/// Shift pitch by `steps` semitones, keeping the length
pub fn pitch_shift(samples: &[f32], sample_rate: u32, steps: f32) -> Result<Vec<f32>, AudioError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    let rate = 2f32.powf(-steps / 12.0);
    let stretched = time_stretch(samples, rate);
    let shifted = resample(&stretched, sample_rate as f64 / rate as f64, sample_rate as f64)?;
    Ok(fit_length(shifted, samples.len()))
}

/// Scale to unit peak; silence is returned unchanged
pub fn normalize_peak(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::MIN_POSITIVE {
        return samples.to_vec();
    }
    samples.iter().map(|s| s / peak).collect()
}

/// Mix a wrapped excerpt of `noise` into `signal`
///
/// The excerpt starts at a random offset and tiles the noise until it covers
/// the signal. Both are peak-normalised, then combined as
/// `(1 - w) * signal + w * noise` with `w` drawn from the gain range.
pub fn mix_background_noise<R: Rng + ?Sized>(
    signal: &[f32],
    noise: &[f32],
    gain: NoiseGain,
    rng: &mut R,
) -> Vec<f32> {
    let weight = if gain.min < gain.max {
        rng.gen_range(gain.min..gain.max)
    } else {
        gain.min
    };
    let signal = normalize_peak(signal);
    if noise.is_empty() {
        return signal.iter().map(|s| (1.0 - weight) * s).collect();
    }

    let start = rng.gen_range(0..noise.len());
    let excerpt: Vec<f32> = (0..signal.len())
        .map(|i| noise[(start + i) % noise.len()])
        .collect();
    let excerpt = normalize_peak(&excerpt);

    signal
        .iter()
        .zip(excerpt.iter())
        .map(|(s, n)| (1.0 - weight) * s + weight * n)
        .collect()
}

/// Pad both ends by `pad` samples, reflecting when the signal is long enough
fn pad_center(samples: &[f32], pad: usize) -> Vec<f32> {
    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    if samples.len() > pad {
        padded.extend((1..=pad).rev().map(|i| samples[i]));
        padded.extend_from_slice(samples);
        let last = samples.len() - 1;
        padded.extend((1..=pad).map(|i| samples[last - i]));
    } else {
        padded.resize(pad, 0.0);
        padded.extend_from_slice(samples);
        padded.resize(samples.len() + 2 * pad, 0.0);
    }
    padded
}

/// Resample STFT frames in time by `rate`, keeping phase coherent per bin
fn phase_vocoder(
    spectra: &[Vec<Complex<f32>>],
    rate: f32,
    hop: usize,
    fft_size: usize,
) -> Vec<Vec<Complex<f32>>> {
    let Some(first) = spectra.first() else {
        return Vec::new();
    };
    let num_bins = first.len();
    let zero_frame = vec![Complex::new(0.0f32, 0.0); num_bins];
    let frame_at = |index: usize| spectra.get(index).unwrap_or(&zero_frame);

    let tau = 2.0 * std::f64::consts::PI;
    let phase_advance: Vec<f64> = (0..num_bins)
        .map(|k| tau * k as f64 * hop as f64 / fft_size as f64)
        .collect();
    // accumulated in f64 and kept in [0, 2π) so long inputs do not drift
    let mut phase: Vec<f64> = first.iter().map(|c| c.arg() as f64).collect();

    let num_steps = (spectra.len() as f64 / rate as f64).ceil() as usize;
    let mut output = Vec::with_capacity(num_steps);
    for t in 0..num_steps {
        let step = t as f64 * rate as f64;
        if step >= spectra.len() as f64 {
            break;
        }
        let left = step.floor() as usize;
        let alpha = (step - left as f64) as f32;
        let current = frame_at(left);
        let next = frame_at(left + 1);

        let mut frame = Vec::with_capacity(num_bins);
        for k in 0..num_bins {
            let magnitude = (1.0 - alpha) * current[k].norm() + alpha * next[k].norm();
            frame.push(Complex::from_polar(magnitude, phase[k] as f32));

            let mut delta = next[k].arg() as f64 - current[k].arg() as f64 - phase_advance[k];
            delta -= tau * (delta / tau).round();
            phase[k] = (phase[k] + phase_advance[k] + delta).rem_euclid(tau);
        }
        output.push(frame);
    }

    output
}

/// Inverse STFT by windowed overlap-add, trimmed to the centered signal
fn overlap_add(
    fft: &FftProcessor,
    spectra: &[Vec<Complex<f32>>],
    hop: usize,
    length: usize,
) -> Vec<f32> {
    let fft_size = fft.fft_size();
    let window = fft.window();
    let total = fft_size + hop * spectra.len().saturating_sub(1);
    let mut signal = vec![0.0f32; total];
    let mut window_sum = vec![0.0f32; total];

    for (t, spectrum) in spectra.iter().enumerate() {
        let frame = fft.inverse_frame(spectrum);
        let offset = t * hop;
        for n in 0..fft_size {
            signal[offset + n] += window[n] * frame[n];
            window_sum[offset + n] += window[n] * window[n];
        }
    }

    for (sample, norm) in signal.iter_mut().zip(window_sum.iter()) {
        if *norm > f32::MIN_POSITIVE {
            *sample /= norm;
        }
    }

    let start = (fft_size / 2).min(signal.len());
    fit_length(signal[start..].to_vec(), length)
}
