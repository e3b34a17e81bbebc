//! Custom error types for the SER-RS system

use std::sync::Arc;

use thiserror::Error;

/// Main error type for the SER-RS system
///
/// Cloneable so a failed pipeline can keep the error it handed back to the caller.
#[derive(Error, Debug, Clone)]
pub enum SerError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Feature extraction error: {0}")]
    Feature(#[from] FeatureError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for SerError {
    fn from(err: std::io::Error) -> Self {
        SerError::Io(Arc::new(err))
    }
}

/// Audio capture and recording errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("Audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Recording captured no audio")]
    EmptyRecording,

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Resampling error: {0}")]
    Resampling(String),

    #[error("WAV write error: {0}")]
    WavWrite(String),
}

/// Errors raised while turning an audio file into a waveform
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Failed to read audio source: {0}")]
    Read(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed audio data: {0}")]
    Malformed(String),

    #[error("No decodable audio track")]
    NoAudioTrack,

    #[error("Audio file contains no samples")]
    Empty,
}

/// Feature extraction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Waveform sample rate {actual} Hz does not match extractor rate {expected} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("FFT error: {0}")]
    Fft(String),
}

/// Classifier and model errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Feature vector has {actual} values, classifier expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Failed to save model: {0}")]
    ModelSave(String),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, value: impl ToString) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_is_cloneable() {
        let err: SerError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = SerError::from(ClassifierError::DimensionMismatch {
            expected: 180,
            actual: 40,
        });
        assert!(err.to_string().contains("40 values"));
        assert!(err.to_string().contains("expects 180"));
    }
}
