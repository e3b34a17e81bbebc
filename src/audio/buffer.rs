//! Frame accumulation for a single recording session

use super::frame::{AudioFrame, Waveform};
use crate::error::{AudioError, Result};

/// Ordered list of captured frames, flattened into a waveform once recording ends
///
/// Owned by the thread that drives the recording; the input callback never
/// touches it.
pub struct SampleBuffer {
    frames: Vec<AudioFrame>,
    total_samples: usize,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create an empty buffer for audio at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Vec::new(),
            total_samples: 0,
            sample_rate,
        }
    }

    /// Pre-size for the expected number of frames
    pub fn with_capacity(sample_rate: u32, frames: usize) -> Self {
        Self {
            frames: Vec::with_capacity(frames),
            total_samples: 0,
            sample_rate,
        }
    }

    /// Append a frame
    pub fn append(&mut self, frame: AudioFrame) {
        self.total_samples += frame.len();
        self.frames.push(frame);
    }

    /// Number of frames appended so far
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Number of samples appended so far
    pub fn len(&self) -> usize {
        self.total_samples
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    /// Buffered audio time (seconds)
    pub fn duration(&self) -> f32 {
        self.total_samples as f32 / self.sample_rate as f32
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Concatenate all frames in arrival order
    pub fn finalize(self) -> Result<Waveform> {
        if self.total_samples == 0 {
            return Err(AudioError::EmptyRecording.into());
        }

        let mut samples = Vec::with_capacity(self.total_samples);
        for frame in &self.frames {
            samples.extend_from_slice(frame.samples());
        }

        Waveform::new(samples, self.sample_rate)
    }
}
