// Mel module - Slaney-style mel filterbank and decibel scaling
//
// The filterbank uses the Slaney mel scale (linear below 1 kHz, logarithmic
// above) with area-normalised triangular filters, so each band integrates
// to a constant energy regardless of its width.

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Convert frequency in Hz to the Slaney mel scale
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert a Slaney mel value back to Hz
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Build the mel filterbank, `[num_mels][fft_size / 2 + 1]`
pub fn mel_filter_bank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: u32,
    fmin: f64,
    fmax: f64,
) -> Vec<Vec<f32>> {
    let num_bins = fft_size / 2 + 1;
    let fft_freqs: Vec<f64> = (0..num_bins)
        .map(|k| k as f64 * sample_rate as f64 / fft_size as f64)
        .collect();

    let min_mel = hz_to_mel(fmin);
    let max_mel = hz_to_mel(fmax);
    let mel_points: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (num_mels + 1) as f64))
        .collect();

    (0..num_mels)
        .map(|m| {
            let lower_width = mel_points[m + 1] - mel_points[m];
            let upper_width = mel_points[m + 2] - mel_points[m + 1];
            let enorm = 2.0 / (mel_points[m + 2] - mel_points[m]);
            fft_freqs
                .iter()
                .map(|&freq| {
                    let lower = (freq - mel_points[m]) / lower_width;
                    let upper = (mel_points[m + 2] - freq) / upper_width;
                    (lower.min(upper).max(0.0) * enorm) as f32
                })
                .collect()
        })
        .collect()
}

/// Project a power spectrogram `[frame][bin]` onto the filterbank
pub fn apply_filter_bank(power: &[Vec<f32>], bank: &[Vec<f32>]) -> Vec<Vec<f32>> {
    power
        .iter()
        .map(|frame| {
            bank.iter()
                .map(|filter| filter.iter().zip(frame.iter()).map(|(w, p)| w * p).sum())
                .collect()
        })
        .collect()
}

/// Convert power to decibels relative to the spectrogram maximum
///
/// `10 log10(max(amin, S)) - 10 log10(max(amin, max(S)))`, floored at
/// `top_db` below the peak.
pub fn power_to_db(spectrogram: &[Vec<f32>], amin: f32, top_db: f32) -> Vec<Vec<f32>> {
    let reference = spectrogram
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(0.0f32, f32::max);
    let ref_db = 10.0 * reference.max(amin).log10();

    let db: Vec<Vec<f32>> = spectrogram
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&value| 10.0 * value.max(amin).log10() - ref_db)
                .collect()
        })
        .collect();

    let peak = db
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - top_db;
    db.into_iter()
        .map(|frame| frame.into_iter().map(|value| value.max(floor)).collect())
        .collect()
}
