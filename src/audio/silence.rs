//! End-of-speech detection by frame energy

use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type, Q_BUTTERWORTH_F32};
use tracing::trace;

use crate::config::RecordingConfig;
use crate::error::{ConfigError, Result};

/// Loudness class of a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoudness {
    /// Norm at or above the threshold
    Loud,
    /// Norm below the threshold
    Quiet,
}

/// Counts consecutive quiet frames and signals when an utterance has ended
///
/// A frame is quiet when the Euclidean norm of its samples is below
/// `threshold`. The stop signal fires once `required_quiet_frames` quiet
/// frames arrive back to back. With `require_speech` set, the signal is held
/// back until a loud frame has been seen.
pub struct SilenceDetector {
    threshold: f32,
    required_quiet_frames: u32,
    require_speech: bool,
    quiet_frames: u32,
    heard_speech: bool,
    gate: Option<DirectForm1<f32>>,
    scratch: Vec<f32>,
}

impl SilenceDetector {
    /// Build a detector from the recording configuration
    pub fn new(config: &RecordingConfig, sample_rate: u32) -> Result<Self> {
        let mut detector =
            Self::with_threshold(config.silence_threshold, config.required_quiet_frames);
        detector.require_speech = config.require_speech;

        if let Some(cutoff) = config.gate_high_pass_hz {
            let coeffs = Coefficients::<f32>::from_params(
                Type::HighPass,
                sample_rate.hz(),
                cutoff.hz(),
                Q_BUTTERWORTH_F32,
            )
            .map_err(|e| {
                ConfigError::invalid("recording.gate_high_pass_hz", format!("{cutoff} ({e:?})"))
            })?;
            detector.gate = Some(DirectForm1::<f32>::new(coeffs));
        }

        Ok(detector)
    }

    /// Plain energy gate with no speech requirement and no filter
    pub fn with_threshold(threshold: f32, required_quiet_frames: u32) -> Self {
        Self {
            threshold,
            required_quiet_frames: required_quiet_frames.max(1),
            require_speech: false,
            quiet_frames: 0,
            heard_speech: false,
            gate: None,
            scratch: Vec::new(),
        }
    }

    /// Enable or disable the speech-before-stop policy
    pub fn require_speech(mut self, required: bool) -> Self {
        self.require_speech = required;
        self
    }

    /// Feed one frame; returns true when recording should stop
    pub fn observe(&mut self, samples: &[f32]) -> bool {
        match self.loudness(samples) {
            FrameLoudness::Quiet => {
                self.quiet_frames = self.quiet_frames.saturating_add(1);
                trace!("Silence: quiet frame ({} in a row)", self.quiet_frames);
            }
            FrameLoudness::Loud => {
                if self.quiet_frames > 0 {
                    trace!("Silence: loud frame after {} quiet", self.quiet_frames);
                }
                self.quiet_frames = 0;
                self.heard_speech = true;
            }
        }

        if self.require_speech && !self.heard_speech {
            return false;
        }
        self.quiet_frames >= self.required_quiet_frames
    }

    /// Classify a frame against the threshold
    pub fn loudness(&mut self, samples: &[f32]) -> FrameLoudness {
        let norm = match self.gate.as_mut() {
            Some(filter) => {
                self.scratch.clear();
                self.scratch.extend(samples.iter().map(|&s| filter.run(s)));
                frame_norm(&self.scratch)
            }
            None => frame_norm(samples),
        };

        if norm < self.threshold {
            FrameLoudness::Quiet
        } else {
            FrameLoudness::Loud
        }
    }

    /// Consecutive quiet frames since the last loud one
    pub fn quiet_frames(&self) -> u32 {
        self.quiet_frames
    }

    /// Whether any loud frame has been observed this session
    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    /// Forget all session state
    pub fn reset(&mut self) {
        self.quiet_frames = 0;
        self.heard_speech = false;
        if let Some(filter) = self.gate.as_mut() {
            filter.reset_state();
        }
    }
}

/// Euclidean norm (root of the sum of squares) of a frame
pub fn frame_norm(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum::<f32>().sqrt()
}
