//! Fixed-length acoustic descriptors from a waveform
//!
//! Every descriptor is computed frame by frame over a centered STFT and then
//! averaged over time, so the output length depends only on the
//! configuration, never on the clip length.
//!
//! Layout of the vector:
//!
//! - [`FeatureVariant::Mfcc`]: `n_mfcc` cepstral means
//! - [`FeatureVariant::Extended`]: `n_mfcc` cepstral means, then `n_chroma`
//!   chroma means, then `n_mels` mel power means

pub mod chroma;
pub mod mel;
pub mod mfcc;
pub mod stft;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::Waveform;
use crate::config::{FeatureConfig, FeatureVariant};
use crate::error::{ConfigError, FeatureError, Result};
use chroma::ChromaBank;
use mel::MelBank;
use mfcc::{power_to_db, Dct};
use stft::Stft;

/// Time-averaged descriptors of one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Turns waveforms at one sample rate into feature vectors
///
/// Filter banks and the FFT plan are built once; `extract` is then pure and
/// can be called from several threads at once.
pub struct FeatureExtractor {
    config: FeatureConfig,
    sample_rate: u32,
    stft: Stft,
    mel: MelBank,
    dct: Dct,
    chroma: Option<ChromaBank>,
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ConfigError::invalid("audio.sample_rate", 0).into());
        }
        if config.n_fft < 2 || config.n_fft % 2 != 0 {
            return Err(ConfigError::invalid("features.n_fft", config.n_fft).into());
        }
        if config.hop_length == 0 {
            return Err(ConfigError::invalid("features.hop_length", 0).into());
        }
        if config.n_mfcc == 0 || config.n_mfcc > config.n_mels {
            return Err(ConfigError::invalid("features.n_mfcc", config.n_mfcc).into());
        }

        let chroma = match config.variant {
            FeatureVariant::Mfcc => None,
            FeatureVariant::Extended => {
                Some(ChromaBank::new(sample_rate, config.n_fft, config.n_chroma))
            }
        };

        debug!(
            "Feature extractor: {} @ {} Hz, n_fft {}, hop {}, dimension {}",
            config.variant,
            sample_rate,
            config.n_fft,
            config.hop_length,
            config.dimension()
        );

        Ok(Self {
            config: config.clone(),
            sample_rate,
            stft: Stft::new(config.n_fft, config.hop_length),
            mel: MelBank::new(sample_rate, config.n_fft, config.n_mels),
            dct: Dct::new(config.n_mels, config.n_mfcc),
            chroma,
        })
    }

    /// Length of every vector this extractor returns
    pub fn dimension(&self) -> usize {
        self.config.dimension()
    }

    pub fn variant(&self) -> FeatureVariant {
        self.config.variant
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Compute the feature vector of `waveform`
    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureVector> {
        if waveform.sample_rate() != self.sample_rate {
            return Err(FeatureError::SampleRateMismatch {
                expected: self.sample_rate,
                actual: waveform.sample_rate(),
            }
            .into());
        }

        let spectrogram = self.stft.magnitudes(waveform.samples())?;
        let n_frames = spectrogram.n_frames();
        let n_mels = self.mel.n_mels();

        // Mel power for every frame, row-major
        let mut mel_power = vec![0.0f32; n_frames * n_mels];
        let mut power = vec![0.0f32; spectrogram.n_bins];
        for (frame, out) in spectrogram.frames.iter().zip(mel_power.chunks_mut(n_mels)) {
            for (p, m) in power.iter_mut().zip(frame) {
                *p = m * m;
            }
            self.mel.apply(&power, out);
        }

        let mut values = Vec::with_capacity(self.dimension());

        let mut log_mel = mel_power.clone();
        power_to_db(&mut log_mel, self.config.top_db);
        let mut coefs = vec![0.0f32; self.dct.n_out()];
        let mut mfcc_sum = vec![0.0f64; self.dct.n_out()];
        for frame in log_mel.chunks(n_mels) {
            self.dct.apply(frame, &mut coefs);
            accumulate(&mut mfcc_sum, &coefs);
        }
        values.extend(mean(&mfcc_sum, n_frames));

        if let Some(chroma) = &self.chroma {
            let mut classes = vec![0.0f32; chroma.n_chroma()];
            let mut chroma_sum = vec![0.0f64; chroma.n_chroma()];
            for frame in &spectrogram.frames {
                chroma.apply(frame, &mut classes);
                accumulate(&mut chroma_sum, &classes);
            }
            values.extend(mean(&chroma_sum, n_frames));

            let mut mel_sum = vec![0.0f64; n_mels];
            for frame in mel_power.chunks(n_mels) {
                accumulate(&mut mel_sum, frame);
            }
            values.extend(mean(&mel_sum, n_frames));
        }

        debug!(
            "Extracted {} features from {} frames ({:.2}s)",
            values.len(),
            n_frames,
            waveform.duration()
        );

        Ok(FeatureVector(values))
    }
}

fn accumulate(sum: &mut [f64], frame: &[f32]) {
    for (s, &v) in sum.iter_mut().zip(frame) {
        *s += v as f64;
    }
}

fn mean(sum: &[f64], count: usize) -> impl Iterator<Item = f32> + '_ {
    let count = count.max(1) as f64;
    sum.iter().map(move |s| (s / count) as f32)
}
