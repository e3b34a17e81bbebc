//! Speech Emotion Recognition CLI Application

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use ser_rs::audio::decode_file;
use ser_rs::dataset::{extract_dataset, save_feature_table, scan_dataset};
use ser_rs::{
    AudioConfig, AudioError, CentroidModel, Classifier, Config, CpalSource, FeatureExtractor,
    FeatureVariant, FrameSource, History, HistoryEntry, OutputWriter, Pipeline, SerError,
    StopFlag, WaveformSource,
};

/// Speech Emotion Recognition System
#[derive(Parser)]
#[command(name = "ser-rs")]
#[command(about = "Detect the emotion in short spoken utterances", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Record utterances from the microphone and classify each one
    Listen {
        /// Number of utterances to classify (0 = until Ctrl+C)
        #[arg(short, long, default_value = "1")]
        repeat: u32,

        /// Audio input device name (uses default if not specified)
        #[arg(short, long)]
        device: Option<String>,

        /// Path to the emotion model file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Maximum recording length in seconds
        #[arg(long)]
        max_duration: Option<f32>,

        /// Frame norm below which a frame counts as quiet
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Keep recording until speech has been heard
        #[arg(long)]
        require_speech: bool,

        /// Save the last recording to this WAV file
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Feed an audio file through the recorder instead of the microphone
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Classify audio files (WAV, MP3)
    Classify {
        /// Input audio files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Path to the emotion model file
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// List available audio input devices
    Devices,

    /// Extract a feature table from a RAVDESS directory
    Extract {
        /// Dataset root (searched recursively for .wav files)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "emotion_features.csv")]
        output: PathBuf,

        /// Use the 180-value MFCC + chroma + mel variant
        #[arg(long)]
        extended: bool,
    },

    /// Train a nearest-centroid model from a RAVDESS directory
    Train {
        /// Dataset root (searched recursively for .wav files)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Output model path
        #[arg(short, long, default_value = "./models/emotion_model.json")]
        output: PathBuf,

        /// Use the 180-value MFCC + chroma + mel variant
        #[arg(long)]
        extended: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging - quiet by default, use -v for more
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    // Load configuration
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Listen {
            repeat,
            device,
            model,
            max_duration,
            threshold,
            require_speech,
            save,
            replay,
        } => {
            // Apply CLI overrides
            if let Some(device) = device {
                config.audio.device = Some(device);
            }
            if let Some(model) = model {
                config.classifier.model_path = model;
            }
            if let Some(max_duration) = max_duration {
                config.recording.max_duration_secs = max_duration;
            }
            if let Some(threshold) = threshold {
                config.recording.silence_threshold = threshold;
            }
            if require_speech {
                config.recording.require_speech = true;
            }
            config.validate().context("Invalid configuration")?;

            listen(config, repeat, save, replay)
        }
        Commands::Classify { files, model } => {
            if let Some(model) = model {
                config.classifier.model_path = model;
            }
            classify_files(config, &files)
        }
        Commands::Devices => list_devices(),
        Commands::Extract {
            dataset,
            output,
            extended,
        } => {
            if extended {
                config.features.variant = FeatureVariant::Extended;
            }
            extract_features(config, &dataset, &output)
        }
        Commands::Train {
            dataset,
            output,
            extended,
        } => {
            if extended {
                config.features.variant = FeatureVariant::Extended;
            }
            train_model(config, &dataset, &output)
        }
    }
}

/// Load the model and build a pipeline around it
///
/// The feature variant follows the model, since that is what it was trained on.
fn build_pipeline(config: &mut Config) -> Result<Pipeline<CentroidModel>> {
    let model = CentroidModel::load(&config.classifier.model_path)
        .context("Failed to load emotion model")?;

    if model.variant() != config.features.variant {
        info!(
            "Model was trained on {} features; overriding configured {}",
            model.variant(),
            config.features.variant
        );
        config.features.variant = model.variant();
    }

    Pipeline::new(config, model).context("Failed to initialize pipeline")
}

fn log_history(history: &History) {
    if history.is_empty() {
        info!("No emotions detected this session");
        return;
    }

    info!("Session complete: {} predictions", history.len());
    for (label, count) in history.counts() {
        info!("  {}: {}", label, count);
    }
}

/// Live path: record, classify, repeat
fn listen(
    mut config: Config,
    repeat: u32,
    save: Option<PathBuf>,
    replay: Option<PathBuf>,
) -> Result<()> {
    let mut pipeline = build_pipeline(&mut config)?;
    let mut output =
        OutputWriter::new(config.output.clone()).context("Failed to create output writer")?;
    if let Some(path) = output.output_path() {
        info!("Appending predictions to {}", path.display());
    }
    let mut history = History::new();

    // Ctrl+C cancels the recording in progress and ends the session
    let stop = StopFlag::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handler_stop.request_stop();
    })?;

    let (mut source, source_name): (Box<dyn FrameSource>, &str) = match replay {
        Some(ref path) => {
            let waveform = decode_file(path, config.audio.sample_rate)
                .with_context(|| format!("Failed to decode {}", path.display()))?;
            (Box::new(WaveformSource::from_waveform(waveform)), "replay")
        }
        None => (Box::new(CpalSource::new(config.audio.clone())), "microphone"),
    };

    let mut utterance = 0u32;
    while repeat == 0 || utterance < repeat {
        if stop.is_stop_requested() {
            break;
        }
        utterance += 1;

        println!("Listening... speak now (Ctrl+C to stop)");

        let result = match pipeline.classify_live(source.as_mut(), &stop) {
            Ok(result) => result,
            Err(SerError::Audio(AudioError::EmptyRecording)) => {
                warn!("Nothing was recorded");
                continue;
            }
            Err(e) => return Err(e).context("Live classification failed"),
        };

        let entry = HistoryEntry::now(result.label.clone(), source_name);
        if let Err(e) = output.write(&entry) {
            error!("Failed to write output: {}", e);
        }
        history.push(entry);

        if let Some(ref path) = save {
            result
                .waveform
                .write_wav(path)
                .with_context(|| format!("Failed to save recording to {}", path.display()))?;
        }
    }

    output.flush()?;
    log_history(&history);

    Ok(())
}

/// Upload path: decode and classify each file
fn classify_files(mut config: Config, files: &[PathBuf]) -> Result<()> {
    let mut pipeline = build_pipeline(&mut config)?;
    let mut output =
        OutputWriter::new(config.output.clone()).context("Failed to create output writer")?;
    if let Some(path) = output.output_path() {
        info!("Appending predictions to {}", path.display());
    }
    let mut history = History::new();
    let mut failures = 0;

    for path in files {
        match pipeline.classify_file(path) {
            Ok(result) => {
                let entry = HistoryEntry::now(result.label, path.display().to_string());
                output.write(&entry)?;
                history.push(entry);
            }
            Err(e) => {
                failures += 1;
                error!("Failed to classify {}: {}", path.display(), e);
            }
        }
    }

    output.flush()?;
    log_history(&history);

    if failures > 0 {
        anyhow::bail!("{} of {} files could not be classified", failures, files.len());
    }
    Ok(())
}

/// List available audio input devices
fn list_devices() -> Result<()> {
    let source = CpalSource::new(AudioConfig::default());
    let devices = source.list_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found");
    } else {
        println!("Available audio input devices:");
        for (i, name) in devices.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
    }

    Ok(())
}

/// Write a CSV feature table for a labelled dataset
fn extract_features(config: Config, dataset: &Path, output: &Path) -> Result<()> {
    let extractor = FeatureExtractor::new(&config.features, config.audio.sample_rate)?;
    let files = scan_dataset(dataset)
        .with_context(|| format!("Failed to scan dataset {}", dataset.display()))?;

    let samples = extract_dataset(&files, &extractor);
    if samples.is_empty() {
        anyhow::bail!("No usable audio files under {}", dataset.display());
    }

    save_feature_table(output, &samples)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} rows to {}", samples.len(), output.display());

    Ok(())
}

/// Fit and save a nearest-centroid model for a labelled dataset
fn train_model(config: Config, dataset: &Path, output: &Path) -> Result<()> {
    let extractor = FeatureExtractor::new(&config.features, config.audio.sample_rate)?;
    let files = scan_dataset(dataset)
        .with_context(|| format!("Failed to scan dataset {}", dataset.display()))?;

    let samples = extract_dataset(&files, &extractor);
    let model = CentroidModel::fit(
        samples.iter().map(|s| (&s.label, &s.features)),
        config.features.variant,
    )
    .context("Training failed")?;

    let correct = samples
        .iter()
        .filter(|s| matches!(model.predict(&s.features), Ok(ref label) if *label == s.label))
        .count();
    info!(
        "Training accuracy: {:.1}% ({}/{})",
        100.0 * correct as f32 / samples.len() as f32,
        correct,
        samples.len()
    );

    model
        .save(output)
        .with_context(|| format!("Failed to save model to {}", output.display()))?;
    println!(
        "Saved model with {} labels to {}",
        model.labels().len(),
        output.display()
    );

    Ok(())
}
