//! Band-limited sample rate conversion.
//!
//! Whole-buffer wrapper around rubato's sinc resampler. The input is fed in
//! fixed chunks, followed by silence until the filter delay has been flushed,
//! so the output is aligned with the input and has exactly
//! `ceil(len * to_rate / from_rate)` samples.

use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};

use crate::error::AudioError;

const CHUNK_SIZE: usize = 1024;
const SINC_LEN: usize = 128;

/// Resample `input` from `from_rate` to `to_rate`
pub fn resample(input: &[f32], from_rate: f64, to_rate: f64) -> Result<Vec<f32>, AudioError> {
    if !from_rate.is_finite() || !to_rate.is_finite() || from_rate <= 0.0 || to_rate <= 0.0 {
        return Err(AudioError::ResampleFailed {
            reason: format!("invalid rates {} -> {}", from_rate, to_rate),
        });
    }
    if input.is_empty() || from_rate == to_rate {
        return Ok(input.to_vec());
    }

    let ratio = to_rate / from_rate;
    let expected = (input.len() as f64 * to_rate / from_rate).ceil() as usize;
    let delay = ((SINC_LEN / 2) as f64 * ratio).round() as usize;

    let params = InterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: InterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    //           ratio,  drift, params, chunk_size, channels
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1).map_err(
        |err| AudioError::ResampleFailed {
            reason: format!("failed to construct sinc resampler: {err:?}"),
        },
    )?;

    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);
    let mut segment = vec![0.0f32; CHUNK_SIZE];
    let mut offset = 0usize;
    let max_chunks = input.len() / CHUNK_SIZE + SINC_LEN / CHUNK_SIZE + 8;
    let mut chunks = 0usize;

    while output.len() < expected + delay {
        if chunks >= max_chunks {
            return Err(AudioError::ResampleFailed {
                reason: "resampler made no progress".to_string(),
            });
        }
        segment.fill(0.0);
        if offset < input.len() {
            let end = (offset + CHUNK_SIZE).min(input.len());
            segment[..end - offset].copy_from_slice(&input[offset..end]);
            offset = end;
        }
        let produced = resampler
            .process(std::slice::from_ref(&segment), None)
            .map_err(|err| AudioError::ResampleFailed {
                reason: format!("resampler process failed: {err:?}"),
            })?;
        output.extend_from_slice(&produced[0]);
        chunks += 1;
    }

    Ok(output[delay..delay + expected].to_vec())
}
