//! Mel filter bank (Slaney scale, area-normalized triangles)

/// Convert Hz to mels on the Slaney scale (linear below 1 kHz, log above)
pub fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    let logstep = (6.4f64).ln() / 27.0;

    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

/// Inverse of [`hz_to_mel`]
pub fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    let logstep = (6.4f64).ln() / 27.0;

    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (logstep * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// One triangular filter, stored as its non-zero span
struct MelFilter {
    start: usize,
    weights: Vec<f32>,
}

/// Maps a power spectrum onto `n_mels` bands between 0 Hz and Nyquist
pub struct MelBank {
    filters: Vec<MelFilter>,
}

impl MelBank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let sr = sample_rate as f64;
        let n_bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..n_bins).map(|k| k as f64 * sr / n_fft as f64).collect();

        // n_mels + 2 edges evenly spaced in mel
        let mel_max = hz_to_mel(sr / 2.0);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();

        let filters = (0..n_mels)
            .map(|m| {
                let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
                let norm = 2.0 / (upper - lower);

                let full: Vec<f32> = fft_freqs
                    .iter()
                    .map(|&f| {
                        let rising = (f - lower) / (center - lower);
                        let falling = (upper - f) / (upper - center);
                        (rising.min(falling).max(0.0) * norm) as f32
                    })
                    .collect();

                let start = full.iter().position(|&w| w > 0.0).unwrap_or(0);
                let end = full
                    .iter()
                    .rposition(|&w| w > 0.0)
                    .map(|i| i + 1)
                    .unwrap_or(start);
                MelFilter {
                    start,
                    weights: full[start..end].to_vec(),
                }
            })
            .collect();

        Self { filters }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    /// Band energies of one power spectrum frame, written into `out`
    pub fn apply(&self, power: &[f32], out: &mut [f32]) {
        for (band, filter) in out.iter_mut().zip(&self.filters) {
            *band = filter
                .weights
                .iter()
                .zip(&power[filter.start..])
                .map(|(w, p)| w * p)
                .sum();
        }
    }
}
