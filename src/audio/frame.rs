//! Audio frames and finished waveforms

use std::path::Path;

use tracing::info;

use crate::error::{AudioError, Result};

/// Audio sample type alias
pub type AudioSample = f32;

/// One block of mono samples as delivered by an input stream
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Box<[AudioSample]>,
}

impl AudioFrame {
    pub fn new(samples: Vec<AudioSample>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }

    pub fn samples(&self) -> &[AudioSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<Vec<AudioSample>> for AudioFrame {
    fn from(samples: Vec<AudioSample>) -> Self {
        Self::new(samples)
    }
}

/// A non-empty mono signal at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<AudioSample>,
    sample_rate: u32,
}

impl Waveform {
    /// Wrap samples; an empty signal is an [`AudioError::EmptyRecording`]
    pub fn new(samples: Vec<AudioSample>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(AudioError::EmptyRecording.into());
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[AudioSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<AudioSample> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for the `len`/`is_empty` pair
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Save as 16-bit PCM mono WAV
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path.as_ref(), spec)
            .map_err(|e| AudioError::WavWrite(e.to_string()))?;

        for &sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| AudioError::WavWrite(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| AudioError::WavWrite(e.to_string()))?;
        info!("Recording saved to: {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerError;

    #[test]
    fn test_empty_waveform_rejected() {
        let result = Waveform::new(Vec::new(), 22050);
        assert!(matches!(
            result,
            Err(SerError::Audio(AudioError::EmptyRecording))
        ));
    }

    #[test]
    fn test_duration() {
        let waveform = Waveform::new(vec![0.0; 11025], 22050).unwrap();
        assert!((waveform.duration() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_write_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let waveform = Waveform::new(vec![0.5, -0.5, 1.5, 0.0], 8000).unwrap();
        waveform.write_wav(&path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![16383, -16383, i16::MAX, 0]);
    }
}
