// FFT module - short-time Fourier transform with a periodic Hann window
//
// Forward transforms produce the non-negative frequency half of each frame;
// the inverse rebuilds the conjugate-symmetric spectrum before transforming
// back. Used by the log-mel front end and by the phase vocoder.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// FFT processor for fixed-size frames
pub struct FftProcessor {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Periodic Hann window (pre-computed)
    window: Vec<f32>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `fft_size` - Frame length in samples (any size, not only powers of two)
    pub fn new(fft_size: usize) -> Self {
        let window = hann_window(fft_size);
        let mut planner = FftPlanner::new();

        Self {
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
            fft_size,
            window,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Number of bins in a one-sided spectrum
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Number of frames produced by [`stft`](Self::stft) without centering
    pub fn num_frames(&self, signal_len: usize, hop: usize) -> usize {
        if signal_len < self.fft_size || hop == 0 {
            0
        } else {
            1 + (signal_len - self.fft_size) / hop
        }
    }

    /// One-sided spectrum of a single windowed frame
    ///
    /// Frames shorter than `fft_size` are zero-padded.
    pub fn frame_spectrum(&self, frame: &[f32]) -> Vec<Complex<f32>> {
        let mut buffer: Vec<Complex<f32>> = Vec::with_capacity(self.fft_size);
        for (i, &sample) in frame.iter().take(self.fft_size).enumerate() {
            buffer.push(Complex::new(sample * self.window[i], 0.0));
        }
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.forward.process(&mut buffer);
        buffer.truncate(self.num_bins());
        buffer
    }

    /// Short-time Fourier transform of `signal` without centering
    ///
    /// Returns `[frame][bin]`.
    pub fn stft(&self, signal: &[f32], hop: usize) -> Vec<Vec<Complex<f32>>> {
        (0..self.num_frames(signal.len(), hop))
            .map(|frame| {
                let start = frame * hop;
                self.frame_spectrum(&signal[start..start + self.fft_size])
            })
            .collect()
    }

    /// Power spectrogram `|X|^2`, `[frame][bin]`
    pub fn power_spectrogram(&self, signal: &[f32], hop: usize) -> Vec<Vec<f32>> {
        self.stft(signal, hop)
            .into_iter()
            .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
            .collect()
    }

    /// Inverse of a one-sided spectrum, returning `fft_size` real samples
    ///
    /// The result is scaled by `1 / fft_size` and is not windowed.
    pub fn inverse_frame(&self, half: &[Complex<f32>]) -> Vec<f32> {
        let n = self.fft_size;
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];
        for (k, value) in half.iter().take(self.num_bins()).enumerate() {
            buffer[k] = *value;
        }
        for k in 1..n.div_ceil(2) {
            buffer[n - k] = buffer[k].conj();
        }
        // DC and Nyquist bins of a real signal carry no imaginary part
        buffer[0].im = 0.0;
        if n % 2 == 0 {
            buffer[n / 2].im = 0.0;
        }

        self.inverse.process(&mut buffer);
        let scale = 1.0 / n as f32;
        buffer.iter().map(|c| c.re * scale).collect()
    }
}

/// Periodic Hann window, `0.5 - 0.5 cos(2πi / n)`
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * ((2.0 * std::f32::consts::PI * i as f32) / size as f32).cos())
        .collect()
}
