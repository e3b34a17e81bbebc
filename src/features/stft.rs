//! Short-time Fourier transform (centered, Hann-windowed magnitude frames)

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::{FeatureError, Result};

/// Magnitude spectrogram: one row of `n_fft / 2 + 1` bins per frame
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    pub n_bins: usize,
}

impl Spectrogram {
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }
}

/// Planned forward transform of a fixed size
pub struct Stft {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    n_fft: usize,
    hop_length: usize,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(n_fft);
        Self {
            fft,
            window: hann_window(n_fft),
            n_fft,
            hop_length,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for `len` samples
    ///
    /// The signal is padded by `n_fft / 2` zeros on both sides, so every
    /// non-empty signal yields at least one frame.
    pub fn n_frames(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Magnitude spectrogram of `samples`
    pub fn magnitudes(&self, samples: &[f32]) -> Result<Spectrogram> {
        let pad = self.n_fft / 2;
        let n_frames = self.n_frames(samples.len());

        let mut input = self.fft.make_input_vec();
        let mut output: Vec<Complex<f32>> = self.fft.make_output_vec();
        let mut frames = Vec::with_capacity(n_frames);

        for frame in 0..n_frames {
            let start = frame * self.hop_length;
            for (i, slot) in input.iter_mut().enumerate() {
                // Index into the zero-padded signal
                let padded = start + i;
                *slot = if padded >= pad && padded - pad < samples.len() {
                    samples[padded - pad] * self.window[i]
                } else {
                    0.0
                };
            }

            self.fft
                .process(&mut input, &mut output)
                .map_err(|e| FeatureError::Fft(e.to_string()))?;

            frames.push(output.iter().map(|c| c.norm()).collect());
        }

        Ok(Spectrogram {
            frames,
            n_bins: self.n_bins(),
        })
    }
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / size as f64).cos() as f32
        })
        .collect()
}
