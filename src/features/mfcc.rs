//! Cepstral coefficients from log-mel energies

/// Power floor before taking the log
const AMIN: f32 = 1e-10;

/// Convert power to decibels in place, clipped to `top_db` below the peak
///
/// The peak is taken over the whole slice, so callers pass the complete
/// utterance rather than one frame at a time.
pub fn power_to_db(values: &mut [f32], top_db: Option<f32>) {
    for v in values.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10();
    }

    if let Some(top_db) = top_db {
        let floor = values.iter().fold(f32::NEG_INFINITY, |acc, &v| acc.max(v)) - top_db;
        for v in values.iter_mut() {
            *v = v.max(floor);
        }
    }
}

/// Orthonormal type-II DCT, truncated to the first `n_out` coefficients
pub struct Dct {
    basis: Vec<Vec<f32>>,
}

impl Dct {
    pub fn new(n_in: usize, n_out: usize) -> Self {
        let n = n_in as f64;
        let basis = (0..n_out)
            .map(|k| {
                let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
                (0..n_in)
                    .map(|i| {
                        let angle = std::f64::consts::PI / n * (i as f64 + 0.5) * k as f64;
                        (angle.cos() * scale) as f32
                    })
                    .collect()
            })
            .collect();

        Self { basis }
    }

    pub fn n_out(&self) -> usize {
        self.basis.len()
    }

    pub fn apply(&self, input: &[f32], out: &mut [f32]) {
        for (coef, row) in out.iter_mut().zip(&self.basis) {
            *coef = row.iter().zip(input).map(|(b, x)| b * x).sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_to_db() {
        let mut values = [1.0, 10.0, 100.0, 0.0];
        power_to_db(&mut values, None);
        for (got, want) in values.iter().zip([0.0, 10.0, 20.0, -100.0]) {
            assert!((got - want).abs() < 1e-4);
        }
    }

    #[test]
    fn test_top_db_clip() {
        let mut values = [1.0, 1e-3, 1e-12];
        power_to_db(&mut values, Some(20.0));
        assert_eq!(values[0], 0.0);
        assert!((values[1] + 20.0).abs() < 1e-4);
        assert!((values[2] + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_dct_of_constant() {
        let dct = Dct::new(8, 4);
        let mut out = [0.0f32; 4];
        dct.apply(&[1.0; 8], &mut out);

        // All energy in the first coefficient: sqrt(N) for an orthonormal basis
        assert!((out[0] - 8f32.sqrt()).abs() < 1e-5);
        assert!(out[1..].iter().all(|c| c.abs() < 1e-5));
    }

    #[test]
    fn test_dct_rows_orthonormal() {
        let dct = Dct::new(16, 16);
        for a in 0..16 {
            for b in 0..16 {
                let dot: f32 = dct.basis[a].iter().zip(&dct.basis[b]).map(|(x, y)| x * y).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-5, "rows {a},{b}: {dot}");
            }
        }
    }
}
