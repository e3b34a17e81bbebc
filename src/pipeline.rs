//! Capture → features → classification orchestration
//!
//! Live requests go `Idle → Recording → Extracting → Classifying → Done`,
//! uploads go `Idle → Decoding → Extracting → Classifying → Done`. Any stage
//! can end in `Failed`, which keeps the error that was returned.

use std::path::Path;
use tracing::{debug, info};

use crate::audio::{
    decode_bytes, decode_file, resample_waveform, FrameSource, Recorder, StopFlag, StopReason,
    Waveform,
};
use crate::classifier::{Classifier, EmotionLabel};
use crate::config::Config;
use crate::error::{ClassifierError, Result, SerError};
use crate::features::{FeatureExtractor, FeatureVector};

/// Pipeline stage, used to report where a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Recording,
    Decoding,
    Extracting,
    Classifying,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Recording => write!(f, "recording"),
            Stage::Decoding => write!(f, "decoding"),
            Stage::Extracting => write!(f, "extracting"),
            Stage::Classifying => write!(f, "classifying"),
        }
    }
}

/// Result of one classified utterance
#[derive(Debug, Clone)]
pub struct Classification {
    pub label: EmotionLabel,
    pub features: FeatureVector,
    /// The analysed signal, at the extractor's sample rate
    pub waveform: Waveform,
    /// Set for live recordings
    pub stop_reason: Option<StopReason>,
}

/// Where the last request got to
#[derive(Debug, Clone)]
pub enum PipelineState {
    Idle,
    Recording,
    Decoding,
    Extracting,
    Classifying,
    Done(Classification),
    Failed { stage: Stage, error: SerError },
}

impl PipelineState {
    fn entering(stage: Stage) -> Self {
        match stage {
            Stage::Recording => PipelineState::Recording,
            Stage::Decoding => PipelineState::Decoding,
            Stage::Extracting => PipelineState::Extracting,
            Stage::Classifying => PipelineState::Classifying,
        }
    }
}

/// Turns utterances into emotion labels
pub struct Pipeline<C: Classifier> {
    recorder: Recorder,
    extractor: FeatureExtractor,
    classifier: C,
    state: PipelineState,
}

impl<C: Classifier> Pipeline<C> {
    /// Build a pipeline from configuration and a loaded classifier
    pub fn new(config: &Config, classifier: C) -> Result<Self> {
        let extractor = FeatureExtractor::new(&config.features, config.audio.sample_rate)?;
        Self::from_parts(Recorder::new(config.recording.clone()), extractor, classifier)
    }

    /// Assemble a pipeline; fails if the classifier expects a different vector length
    pub fn from_parts(recorder: Recorder, extractor: FeatureExtractor, classifier: C) -> Result<Self> {
        if classifier.dimension() != extractor.dimension() {
            return Err(ClassifierError::DimensionMismatch {
                expected: classifier.dimension(),
                actual: extractor.dimension(),
            }
            .into());
        }

        debug!(
            "Pipeline ready: {} features @ {} Hz, {} labels",
            extractor.dimension(),
            extractor.sample_rate(),
            classifier.labels().len()
        );

        Ok(Self {
            recorder,
            extractor,
            classifier,
            state: PipelineState::Idle,
        })
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Record one utterance from `source` and classify it
    pub fn classify_live(
        &mut self,
        source: &mut dyn FrameSource,
        stop: &StopFlag,
    ) -> Result<Classification> {
        self.state = PipelineState::Idle;
        let recording = self.run(Stage::Recording, |p| p.recorder.record(source, stop))?;

        debug!(
            "Recorded {:.2}s ({}), {} frames",
            recording.waveform.duration(),
            recording.stop_reason,
            recording.frames
        );

        let mut classification = self.analyse(recording.waveform)?;
        classification.stop_reason = Some(recording.stop_reason);
        self.state = PipelineState::Done(classification.clone());
        Ok(classification)
    }

    /// Decode an audio file and classify it
    pub fn classify_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Classification> {
        self.state = PipelineState::Idle;
        let rate = self.extractor.sample_rate();
        let waveform = self.run(Stage::Decoding, |_| decode_file(path.as_ref(), rate))?;
        self.finish(waveform)
    }

    /// Decode an in-memory upload and classify it; `extension` is a format hint
    pub fn classify_bytes(
        &mut self,
        bytes: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<Classification> {
        self.state = PipelineState::Idle;
        let rate = self.extractor.sample_rate();
        let waveform = self.run(Stage::Decoding, |_| decode_bytes(bytes, extension, rate))?;
        self.finish(waveform)
    }

    /// Classify a finished waveform, resampling it first if needed
    pub fn classify(&mut self, waveform: Waveform) -> Result<Classification> {
        self.state = PipelineState::Idle;
        self.finish(waveform)
    }

    fn finish(&mut self, waveform: Waveform) -> Result<Classification> {
        let classification = self.analyse(waveform)?;
        self.state = PipelineState::Done(classification.clone());
        Ok(classification)
    }

    fn analyse(&mut self, waveform: Waveform) -> Result<Classification> {
        let rate = self.extractor.sample_rate();
        let (waveform, features) = self.run(Stage::Extracting, |p| {
            let waveform = if waveform.sample_rate() == rate {
                waveform
            } else {
                debug!("Resampling {} Hz -> {} Hz", waveform.sample_rate(), rate);
                resample_waveform(waveform, rate)?
            };
            let features = p.extractor.extract(&waveform)?;
            Ok((waveform, features))
        })?;

        let label = self.run(Stage::Classifying, |p| {
            let expected = p.classifier.dimension();
            if features.len() != expected {
                return Err(ClassifierError::DimensionMismatch {
                    expected,
                    actual: features.len(),
                }
                .into());
            }
            p.classifier.predict(&features)
        })?;

        info!("Detected emotion: {}", label);

        Ok(Classification {
            label,
            features,
            waveform,
            stop_reason: None,
        })
    }

    /// Enter `stage`, run `step`, and record a failure in the state
    fn run<T>(&mut self, stage: Stage, step: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.state = PipelineState::entering(stage);
        step(self).map_err(|error| {
            debug!("Pipeline failed while {}: {}", stage, error);
            self.state = PipelineState::Failed {
                stage,
                error: error.clone(),
            };
            error
        })
    }
}
