//! Chroma filter bank: spectral energy folded onto twelve pitch classes

/// Octave weighting center (in octaves above A0/16)
const CENTER_OCTAVE: f64 = 5.0;
/// Gaussian width of the octave weighting
const OCTAVE_WIDTH: f64 = 2.0;
/// A4 tuning reference in Hz
const A440: f64 = 440.0;

/// Maps a magnitude spectrum onto `n_chroma` pitch classes starting at C
pub struct ChromaBank {
    /// `n_chroma` rows of `n_fft / 2 + 1` weights
    weights: Vec<Vec<f32>>,
}

impl ChromaBank {
    pub fn new(sample_rate: u32, n_fft: usize, n_chroma: usize) -> Self {
        let sr = sample_rate as f64;
        let n_chroma_f = n_chroma as f64;
        let n_bins = n_fft / 2 + 1;

        // Fractional chroma bin of every FFT bin; DC borrows a value 1.5 octaves below bin 1
        let mut frq: Vec<f64> = (1..n_fft)
            .map(|i| n_chroma_f * (i as f64 * sr / n_fft as f64 / (A440 / 16.0)).log2())
            .collect();
        frq.insert(0, frq[0] - 1.5 * n_chroma_f);

        let mut binwidth: Vec<f64> = frq.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
        binwidth.push(1.0);

        // Gaussian bumps around each pitch class, wrapped into [-n/2, n/2)
        let n_half = (n_chroma_f / 2.0).round();
        let mut table = vec![vec![0.0f64; n_fft]; n_chroma];
        for (col, (&f, &width)) in frq.iter().zip(&binwidth).enumerate() {
            for (c, row) in table.iter_mut().enumerate() {
                let d = (f - c as f64 + n_half + 10.0 * n_chroma_f).rem_euclid(n_chroma_f) - n_half;
                row[col] = (-0.5 * (2.0 * d / width).powi(2)).exp();
            }
        }

        // Unit L2 norm per column, then octave weighting
        for col in 0..n_fft {
            let norm = table.iter().map(|row| row[col] * row[col]).sum::<f64>().sqrt();
            let octave = (-0.5 * ((frq[col] / n_chroma_f - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
            for row in table.iter_mut() {
                if norm > f64::MIN_POSITIVE {
                    row[col] /= norm;
                }
                row[col] *= octave;
            }
        }

        // Rows start at A; rotate so row 0 is C
        let shift = 3 * n_chroma / 12;
        let weights = (0..n_chroma)
            .map(|c| {
                table[(c + shift) % n_chroma][..n_bins]
                    .iter()
                    .map(|&w| w as f32)
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn n_chroma(&self) -> usize {
        self.weights.len()
    }

    /// Chroma of one magnitude frame, scaled so the strongest class is 1
    pub fn apply(&self, magnitudes: &[f32], out: &mut [f32]) {
        for (value, row) in out.iter_mut().zip(&self.weights) {
            *value = row.iter().zip(magnitudes).map(|(w, m)| w * m).sum();
        }

        let peak = out.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        if peak > f32::MIN_POSITIVE {
            out.iter_mut().for_each(|v| *v /= peak);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape() {
        let bank = ChromaBank::new(22050, 2048, 12);
        assert_eq!(bank.n_chroma(), 12);
        assert!(bank.weights.iter().all(|row| row.len() == 1025));
    }

    #[test]
    fn test_a440_maps_to_a() {
        let sr = 22050;
        let n_fft = 2048;
        let bank = ChromaBank::new(sr, n_fft, 12);

        let mut magnitudes = vec![0.0f32; n_fft / 2 + 1];
        let bin = (440.0 * n_fft as f64 / sr as f64).round() as usize;
        magnitudes[bin] = 1.0;

        let mut chroma = vec![0.0f32; 12];
        bank.apply(&magnitudes, &mut chroma);

        let peak = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        // C C# D D# E F F# G G# A
        assert_eq!(peak, 9);
        assert_eq!(chroma[9], 1.0);
    }

    #[test]
    fn test_silent_frame_stays_zero() {
        let bank = ChromaBank::new(16000, 512, 12);
        let mut chroma = vec![1.0f32; 12];
        bank.apply(&[0.0; 257], &mut chroma);
        assert!(chroma.iter().all(|&v| v == 0.0));
    }
}
