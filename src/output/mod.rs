//! Prediction history and output writing

pub mod formats;

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::classifier::EmotionLabel;
use crate::config::{OutputConfig, OutputFormat};

pub use formats::{format_json, format_text};

/// One prediction
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub label: EmotionLabel,
    /// Where the audio came from: `microphone` or a file path
    pub source: String,
}

impl HistoryEntry {
    pub fn now(label: EmotionLabel, source: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            label,
            source: source.into(),
        }
    }
}

/// Append-only list of predictions made during a session
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of predictions per label, in label order
    pub fn counts(&self) -> BTreeMap<EmotionLabel, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.label.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Output writer that handles multiple destinations
pub struct OutputWriter {
    config: OutputConfig,
    file: Option<File>,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(config: OutputConfig) -> io::Result<Self> {
        let file = if let Some(ref path) = config.output_path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            Some(OpenOptions::new().create(true).append(true).open(path)?)
        } else {
            None
        };

        Ok(Self { config, file })
    }

    /// Write one history entry
    pub fn write(&mut self, entry: &HistoryEntry) -> io::Result<()> {
        let formatted = self.format(entry);

        if self.config.enable_console {
            self.write_console(&formatted)?;
        }

        if let Some(ref mut file) = self.file {
            writeln!(file, "{}", formatted)?;
            file.flush()?;
        }

        Ok(())
    }

    fn format(&self, entry: &HistoryEntry) -> String {
        match self.config.format {
            OutputFormat::Text => format_text(entry, self.config.enable_timestamps),
            OutputFormat::Json => format_json(entry),
        }
    }

    fn write_console(&self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", text)?;
        stdout.flush()
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }

    /// Get the output file path if configured
    pub fn output_path(&self) -> Option<&PathBuf> {
        self.config.output_path.as_ref()
    }
}
