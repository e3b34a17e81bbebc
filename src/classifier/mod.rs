//! Emotion classifiers

pub mod centroid;

pub use centroid::CentroidModel;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::features::FeatureVector;

/// Name of an emotional state, as produced by a classifier
///
/// Cloning only bumps a reference count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EmotionLabel(Arc<str>);

impl EmotionLabel {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmotionLabel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EmotionLabel {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<EmotionLabel> for String {
    fn from(label: EmotionLabel) -> Self {
        label.0.to_string()
    }
}

/// Maps a feature vector to an emotion label
pub trait Classifier: Send + Sync {
    /// Length of the feature vectors this classifier accepts
    fn dimension(&self) -> usize;

    /// Every label `predict` can return
    fn labels(&self) -> &[EmotionLabel];

    /// Predict the emotion of one utterance
    ///
    /// Implementations fail with `ClassifierError::DimensionMismatch` when
    /// `features` has the wrong length.
    fn predict(&self, features: &FeatureVector) -> Result<EmotionLabel>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn labels(&self) -> &[EmotionLabel] {
        (**self).labels()
    }

    fn predict(&self, features: &FeatureVector) -> Result<EmotionLabel> {
        (**self).predict(features)
    }
}
