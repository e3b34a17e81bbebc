//! Speech Emotion Recognition System
//!
//! Captures short spoken utterances (from a microphone or an uploaded file),
//! turns each into a fixed-length acoustic feature vector and classifies the
//! speaker's emotional state with a pretrained model.
//!
//! # Architecture
//!
//! The system is organized into the following modules:
//!
//! - `audio`: Frame sources, silence-triggered recording, decoding, resampling
//! - `features`: STFT, mel, chroma and MFCC descriptors
//! - `classifier`: The `Classifier` trait and a nearest-centroid model
//! - `pipeline`: Recording/decoding → features → label state machine
//! - `dataset`: RAVDESS labelling and feature tables
//! - `output`: Prediction history and output writing
//! - `config`: Configuration structures
//! - `error`: Error types
//!
//! # Example
//!
//! ```no_run
//! use ser_rs::{CentroidModel, Config, CpalSource, Pipeline, StopFlag};
//!
//! // Load configuration and model
//! let config = Config::default();
//! let model = CentroidModel::load(&config.classifier.model_path).unwrap();
//!
//! // Record one utterance from the default microphone and classify it
//! let mut pipeline = Pipeline::new(&config, model).unwrap();
//! let mut source = CpalSource::new(config.audio.clone());
//! let result = pipeline.classify_live(&mut source, &StopFlag::new()).unwrap();
//! println!("Detected emotion: {}", result.label);
//! ```

pub mod audio;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod output;
pub mod pipeline;

// Re-exports for convenience
pub use audio::{
    AudioFrame, CpalSource, FrameSource, Recorder, Recording, SampleBuffer, SilenceDetector,
    StopFlag, StopReason, Waveform, WaveformSource,
};
pub use classifier::{CentroidModel, Classifier, EmotionLabel};
pub use config::{AudioConfig, Config, FeatureConfig, FeatureVariant, OutputConfig, RecordingConfig};
pub use error::{
    AudioError, ClassifierError, ConfigError, DecodeError, FeatureError, Result, SerError,
};
pub use features::{FeatureExtractor, FeatureVector};
pub use output::{History, HistoryEntry, OutputWriter};
pub use pipeline::{Classification, Pipeline, PipelineState, Stage};
