//! RAVDESS dataset tooling: labelling, feature tables and training input
//!
//! RAVDESS file names are seven dash-separated two-digit fields, e.g.
//! `03-01-05-01-02-01-12.wav`; the third field is the emotion code.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::audio::decode_file;
use crate::classifier::EmotionLabel;
use crate::error::Result;
use crate::features::{FeatureExtractor, FeatureVector};

/// Emotion codes used by RAVDESS
const RAVDESS_EMOTIONS: [(&str, &str); 8] = [
    ("01", "neutral"),
    ("02", "calm"),
    ("03", "happy"),
    ("04", "sad"),
    ("05", "angry"),
    ("06", "fearful"),
    ("07", "disgust"),
    ("08", "surprised"),
];

/// An audio file and its ground-truth label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledFile {
    pub path: PathBuf,
    pub label: EmotionLabel,
}

/// Extracted features and their ground-truth label
#[derive(Debug, Clone)]
pub struct LabeledFeatures {
    pub path: PathBuf,
    pub label: EmotionLabel,
    pub features: FeatureVector,
}

/// Emotion encoded in a RAVDESS file name, if the code is known
pub fn ravdess_label(file_name: &str) -> Option<EmotionLabel> {
    let code = file_name.split('-').nth(2)?;
    RAVDESS_EMOTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| EmotionLabel::new(name))
}

/// Recursively collect labelled `.wav` files under `root`, sorted by path
pub fn scan_dataset<P: AsRef<Path>>(root: P) -> Result<Vec<LabeledFile>> {
    let mut files = Vec::new();
    scan_dir(root.as_ref(), &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));

    info!("Found {} labelled files under {}", files.len(), root.as_ref().display());
    Ok(files)
}

fn scan_dir(dir: &Path, files: &mut Vec<LabeledFile>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan_dir(&path, files)?;
            continue;
        }

        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if !is_wav {
            continue;
        }

        let label = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(ravdess_label);
        match label {
            Some(label) => files.push(LabeledFile { path, label }),
            None => debug!("Skipping unlabelled file: {}", path.display()),
        }
    }
    Ok(())
}

/// Decode and extract every file; failures are logged and skipped
pub fn extract_dataset(files: &[LabeledFile], extractor: &FeatureExtractor) -> Vec<LabeledFeatures> {
    let mut samples = Vec::with_capacity(files.len());

    for (i, file) in files.iter().enumerate() {
        let features = decode_file(&file.path, extractor.sample_rate())
            .and_then(|waveform| extractor.extract(&waveform));

        match features {
            Ok(features) => samples.push(LabeledFeatures {
                path: file.path.clone(),
                label: file.label.clone(),
                features,
            }),
            Err(e) => warn!("Skipping {}: {}", file.path.display(), e),
        }

        if (i + 1) % 100 == 0 {
            info!("Extracted {}/{} files", i + 1, files.len());
        }
    }

    info!(
        "Feature extraction complete: {} of {} files",
        samples.len(),
        files.len()
    );
    samples
}

/// Write a CSV table with columns `f0..f{D-1},label`
pub fn write_feature_table<W: Write>(writer: W, samples: &[LabeledFeatures]) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    let dimension = samples.first().map(|s| s.features.len()).unwrap_or(0);

    let header: Vec<String> = (0..dimension).map(|i| format!("f{i}")).collect();
    if header.is_empty() {
        writeln!(writer, "label")?;
    } else {
        writeln!(writer, "{},label", header.join(","))?;
    }

    for sample in samples {
        for value in sample.features.as_slice() {
            write!(writer, "{value},")?;
        }
        writeln!(writer, "{}", sample.label)?;
    }

    writer.flush()?;
    Ok(())
}

/// [`write_feature_table`] into a file, creating parent directories
pub fn save_feature_table<P: AsRef<Path>>(path: P, samples: &[LabeledFeatures]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_feature_table(File::create(path)?, samples)?;
    info!("Wrote {} rows to {}", samples.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;

    fn write_tone(path: &Path, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..sample_rate / 4 {
            let s = (i as f32 * 0.05).sin() * 8000.0;
            writer.write_sample(s as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_ravdess_label() {
        assert_eq!(
            ravdess_label("03-01-05-01-02-01-12.wav").map(|l| l.to_string()),
            Some("angry".to_string())
        );
        assert_eq!(
            ravdess_label("03-01-08-02-02-02-01.wav").map(|l| l.to_string()),
            Some("surprised".to_string())
        );
        assert_eq!(ravdess_label("03-01-09-01-01-01-01.wav"), None);
        assert_eq!(ravdess_label("recording.wav"), None);
    }

    #[test]
    fn test_scan_dataset_recurses_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let actor = dir.path().join("Actor_01");
        std::fs::create_dir(&actor).unwrap();

        write_tone(&actor.join("03-01-04-01-01-01-01.wav"), 8000);
        write_tone(&actor.join("03-01-02-01-01-01-01.wav"), 8000);
        write_tone(&actor.join("03-01-99-01-01-01-01.wav"), 8000);
        std::fs::write(actor.join("notes.txt"), "not audio").unwrap();

        let files = scan_dataset(dir.path()).unwrap();
        let labels: Vec<String> = files.iter().map(|f| f.label.to_string()).collect();
        assert_eq!(labels, vec!["calm", "sad"]);
    }

    #[test]
    fn test_extract_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("03-01-03-01-01-01-01.wav");
        let broken = dir.path().join("03-01-05-01-01-01-01.wav");
        write_tone(&good, 22050);
        std::fs::write(&broken, b"RIFF....WAVEjunk").unwrap();

        let files = scan_dataset(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let extractor = FeatureExtractor::new(&FeatureConfig::default(), 22050).unwrap();
        let samples = extract_dataset(&files, &extractor);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label.as_str(), "happy");
        assert_eq!(samples[0].features.len(), 40);
    }

    #[test]
    fn test_feature_table_layout() {
        let samples = vec![
            LabeledFeatures {
                path: PathBuf::from("a.wav"),
                label: EmotionLabel::new("calm"),
                features: FeatureVector::new(vec![1.5, -2.0]),
            },
            LabeledFeatures {
                path: PathBuf::from("b.wav"),
                label: EmotionLabel::new("sad"),
                features: FeatureVector::new(vec![0.0, 3.25]),
            },
        ];

        let mut out = Vec::new();
        write_feature_table(&mut out, &samples).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "f0,f1,label\n1.5,-2,calm\n0,3.25,sad\n");
    }
}
