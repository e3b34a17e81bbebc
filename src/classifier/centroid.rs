//! Nearest-centroid classifier over standardized features

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use super::{Classifier, EmotionLabel};
use crate::config::FeatureVariant;
use crate::error::{ClassifierError, Result};
use crate::features::FeatureVector;

/// Per-dimension scales below this are treated as constant features
const MIN_SCALE: f32 = 1e-8;

/// Nearest-centroid model stored as JSON
///
/// Features are standardized with the training mean and standard deviation,
/// then assigned to the label whose centroid is closest in Euclidean
/// distance. Ties go to the label listed first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidModel {
    /// Feature variant the model was trained on
    variant: FeatureVariant,
    dimension: usize,
    labels: Vec<EmotionLabel>,
    mean: Vec<f32>,
    scale: Vec<f32>,
    /// One standardized centroid per label, in label order
    centroids: Vec<Vec<f32>>,
}

impl CentroidModel {
    /// Load a model file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ClassifierError::ModelNotFound(path.display().to_string()).into());
        }

        info!("Loading emotion model from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let model = Self::from_json(&content)?;

        info!(
            "Model loaded: {} labels, {} features ({})",
            model.labels.len(),
            model.dimension,
            model.variant
        );

        Ok(model)
    }

    /// Parse and validate a model from its JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let model: Self =
            serde_json::from_str(content).map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    /// Write the model as pretty-printed JSON, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ClassifierError::ModelSave(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClassifierError::ModelSave(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, json)
            .map_err(|e| ClassifierError::ModelSave(format!("{}: {}", path.display(), e)))?;

        info!("Model saved to: {}", path.display());
        Ok(())
    }

    /// Train a model from labelled feature vectors
    pub fn fit<'a, I>(samples: I, variant: FeatureVariant) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a EmotionLabel, &'a FeatureVector)>,
    {
        let samples: Vec<_> = samples.into_iter().collect();
        let dimension = match samples.first() {
            Some((_, features)) => features.len(),
            None => {
                return Err(ClassifierError::InvalidModel("no training samples".to_string()).into())
            }
        };
        if dimension == 0 {
            return Err(ClassifierError::InvalidModel("empty feature vectors".to_string()).into());
        }
        if let Some((_, bad)) = samples.iter().find(|(_, f)| f.len() != dimension) {
            return Err(ClassifierError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            }
            .into());
        }

        let n = samples.len() as f64;
        let mut mean = vec![0.0f64; dimension];
        for (_, features) in &samples {
            for (m, &v) in mean.iter_mut().zip(features.as_slice()) {
                *m += v as f64 / n;
            }
        }

        let mut variance = vec![0.0f64; dimension];
        for (_, features) in &samples {
            for ((var, &v), m) in variance.iter_mut().zip(features.as_slice()).zip(&mean) {
                *var += (v as f64 - m).powi(2) / n;
            }
        }

        let mean: Vec<f32> = mean.into_iter().map(|m| m as f32).collect();
        let scale: Vec<f32> = variance
            .into_iter()
            .map(|v| v.sqrt() as f32)
            .map(|s| if s < MIN_SCALE { 1.0 } else { s })
            .collect();

        // Per-label sums in standardized space, labels in sorted order
        let mut sums: BTreeMap<EmotionLabel, (Vec<f64>, usize)> = BTreeMap::new();
        for (label, features) in &samples {
            let (sum, count) = sums
                .entry((*label).clone())
                .or_insert_with(|| (vec![0.0; dimension], 0));
            for (i, (s, &v)) in sum.iter_mut().zip(features.as_slice()).enumerate() {
                *s += ((v - mean[i]) / scale[i]) as f64;
            }
            *count += 1;
        }

        let mut labels = Vec::with_capacity(sums.len());
        let mut centroids = Vec::with_capacity(sums.len());
        for (label, (sum, count)) in sums {
            debug!("Centroid for {}: {} samples", label, count);
            labels.push(label);
            centroids.push(sum.iter().map(|s| (s / count as f64) as f32).collect());
        }

        let model = Self {
            variant,
            dimension,
            labels,
            mean,
            scale,
            centroids,
        };
        model.validate()?;

        info!(
            "Trained model: {} samples, {} labels, {} features",
            samples.len(),
            model.labels.len(),
            dimension
        );
        Ok(model)
    }

    pub fn variant(&self) -> FeatureVariant {
        self.variant
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(ClassifierError::InvalidModel(msg).into()) };

        if self.dimension == 0 {
            return invalid("dimension is zero".to_string());
        }
        if self.labels.is_empty() {
            return invalid("no labels".to_string());
        }
        let unique: HashSet<&EmotionLabel> = self.labels.iter().collect();
        if unique.len() != self.labels.len() {
            return invalid("duplicate labels".to_string());
        }
        if self.mean.len() != self.dimension || self.scale.len() != self.dimension {
            return invalid(format!(
                "normalization has {}/{} values, expected {}",
                self.mean.len(),
                self.scale.len(),
                self.dimension
            ));
        }
        if self.scale.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return invalid("scale values must be positive".to_string());
        }
        if self.centroids.len() != self.labels.len() {
            return invalid(format!(
                "{} centroids for {} labels",
                self.centroids.len(),
                self.labels.len()
            ));
        }
        if let Some(bad) = self.centroids.iter().find(|c| c.len() != self.dimension) {
            return invalid(format!(
                "centroid has {} values, expected {}",
                bad.len(),
                self.dimension
            ));
        }
        Ok(())
    }
}

impl Classifier for CentroidModel {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn labels(&self) -> &[EmotionLabel] {
        &self.labels
    }

    fn predict(&self, features: &FeatureVector) -> Result<EmotionLabel> {
        if features.len() != self.dimension {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dimension,
                actual: features.len(),
            }
            .into());
        }

        let standardized: Vec<f32> = features
            .as_slice()
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect();

        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (i, centroid) in self.centroids.iter().enumerate() {
            let distance: f32 = centroid
                .iter()
                .zip(&standardized)
                .map(|(c, x)| (c - x) * (c - x))
                .sum();
            if distance < best_distance {
                best = i;
                best_distance = distance;
            }
        }

        Ok(self.labels[best].clone())
    }
}
