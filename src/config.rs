//! Configuration structures for the SER-RS system

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub recording: RecordingConfig,
    pub features: FeatureConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the recorder or extractor cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::invalid("audio.sample_rate", 0));
        }
        if self.audio.channels == 0 {
            return Err(ConfigError::invalid("audio.channels", 0));
        }
        self.recording.validate()?;
        self.features.validate()?;
        Ok(())
    }
}

/// Audio input and analysis rate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Analysis sample rate (Hz); live and decoded audio is brought to this rate
    pub sample_rate: u32,
    /// Channels requested from the input device (downmixed to mono)
    pub channels: u16,
    /// Audio device name (None = default device)
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            channels: 1,
            device: None,
        }
    }
}

/// Silence-triggered recording configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Upper bound on recorded audio (seconds)
    pub max_duration_secs: f32,
    /// Length of one analysis frame delivered by the input stream (seconds)
    pub frame_duration_secs: f32,
    /// Frames whose Euclidean norm falls below this are quiet
    pub silence_threshold: f32,
    /// Consecutive quiet frames that end an utterance
    pub required_quiet_frames: u32,
    /// Suppress the silence stop until at least one loud frame was heard
    pub require_speech: bool,
    /// High-pass cutoff applied before measuring loudness (None = off)
    pub gate_high_pass_hz: Option<f32>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 5.0,
            frame_duration_secs: 0.5,
            silence_threshold: 0.01,
            required_quiet_frames: 3,
            require_speech: false,
            gate_high_pass_hz: None,
        }
    }
}

impl RecordingConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs_f32(self.max_duration_secs)
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f32(self.frame_duration_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.frame_duration_secs > 0.0) {
            return Err(ConfigError::invalid(
                "recording.frame_duration_secs",
                self.frame_duration_secs,
            ));
        }
        if !(self.max_duration_secs >= self.frame_duration_secs) {
            return Err(ConfigError::invalid(
                "recording.max_duration_secs",
                self.max_duration_secs,
            ));
        }
        if !(self.silence_threshold >= 0.0) {
            return Err(ConfigError::invalid(
                "recording.silence_threshold",
                self.silence_threshold,
            ));
        }
        if self.required_quiet_frames == 0 {
            return Err(ConfigError::invalid("recording.required_quiet_frames", 0));
        }
        if let Some(cutoff) = self.gate_high_pass_hz {
            if !(cutoff > 0.0) {
                return Err(ConfigError::invalid("recording.gate_high_pass_hz", cutoff));
            }
        }
        Ok(())
    }
}

/// Which descriptor groups make up the feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureVariant {
    /// MFCC means only
    Mfcc,
    /// MFCC, chroma and mel-band means, in that order
    Extended,
}

impl std::fmt::Display for FeatureVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureVariant::Mfcc => write!(f, "mfcc"),
            FeatureVariant::Extended => write!(f, "extended"),
        }
    }
}

/// Feature extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub variant: FeatureVariant,
    /// FFT size (samples)
    pub n_fft: usize,
    /// Hop between analysis frames (samples)
    pub hop_length: usize,
    /// Number of cepstral coefficients
    pub n_mfcc: usize,
    /// Number of mel bands
    pub n_mels: usize,
    /// Number of chroma bins
    pub n_chroma: usize,
    /// Dynamic range kept by the dB conversion before the DCT (None = unclipped)
    pub top_db: Option<f32>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            variant: FeatureVariant::Mfcc,
            n_fft: 2048,
            hop_length: 512,
            n_mfcc: 40,
            n_mels: 128,
            n_chroma: 12,
            top_db: Some(80.0),
        }
    }
}

impl FeatureConfig {
    /// Length of the vector this configuration produces
    pub fn dimension(&self) -> usize {
        match self.variant {
            FeatureVariant::Mfcc => self.n_mfcc,
            FeatureVariant::Extended => self.n_mfcc + self.n_chroma + self.n_mels,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_fft < 2 || self.n_fft % 2 != 0 {
            return Err(ConfigError::invalid("features.n_fft", self.n_fft));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(ConfigError::invalid("features.hop_length", self.hop_length));
        }
        if self.n_mels == 0 {
            return Err(ConfigError::invalid("features.n_mels", 0));
        }
        if self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return Err(ConfigError::invalid("features.n_mfcc", self.n_mfcc));
        }
        if self.n_chroma == 0 {
            return Err(ConfigError::invalid("features.n_chroma", 0));
        }
        if let Some(top_db) = self.top_db {
            if !(top_db >= 0.0) {
                return Err(ConfigError::invalid("features.top_db", top_db));
            }
        }
        Ok(())
    }
}

/// Classifier model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Path to the serialized model
    pub model_path: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/emotion_model.json"),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,
    /// Append-only history file (None = console only)
    pub output_path: Option<PathBuf>,
    /// Include timestamps in text output
    pub enable_timestamps: bool,
    /// Enable console output
    pub enable_console: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            output_path: None,
            enable_timestamps: true,
            enable_console: true,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// One JSON object per line
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
