//! Microphone frame source using cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::frame::AudioFrame;
use super::source::FrameSource;
use crate::config::AudioConfig;
use crate::error::{AudioError, Result};

/// Frames that may wait in the queue before the callback starts dropping
const FRAME_QUEUE_DEPTH: usize = 64;

/// Live microphone input
pub struct CpalSource {
    config: AudioConfig,
    host: Host,
    device: Option<Device>,
    stream_config: Option<StreamConfig>,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    is_running: Arc<AtomicBool>,
    stream_error: Arc<Mutex<Option<String>>>,
    actual_sample_rate: u32,
}

impl CpalSource {
    /// Create a new microphone source; call [`CpalSource::init`] before opening
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            host: cpal::default_host(),
            device: None,
            stream_config: None,
            sample_format: SampleFormat::F32,
            stream: None,
            is_running: Arc::new(AtomicBool::new(false)),
            stream_error: Arc::new(Mutex::new(None)),
            actual_sample_rate: 0,
        }
    }

    /// List available audio input devices
    pub fn list_devices(&self) -> Result<Vec<String>> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Pick the device and a stream configuration close to the requested one
    pub fn init(&mut self) -> Result<()> {
        let device = if let Some(ref device_name) = self.config.device {
            self.find_device_by_name(device_name)?
        } else {
            self.host.default_input_device().ok_or_else(|| {
                AudioError::DeviceUnavailable("no default input device".to_string())
            })?
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let supported_configs = device
            .supported_input_configs()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let target_rate = SampleRate(self.config.sample_rate);
        let mut best_config = None;
        for cfg in supported_configs {
            debug!(
                "Supported config: channels={}, format={:?}, sample_rate={:?}-{:?}",
                cfg.channels(),
                cfg.sample_format(),
                cfg.min_sample_rate(),
                cfg.max_sample_rate()
            );

            if !is_supported_format(cfg.sample_format()) {
                continue;
            }

            // Prefer matching channel count at the analysis rate
            if cfg.channels() == self.config.channels {
                if cfg.min_sample_rate() <= target_rate && target_rate <= cfg.max_sample_rate() {
                    best_config = Some(cfg.with_sample_rate(target_rate));
                } else {
                    // Use max available sample rate (resampled after capture)
                    best_config = Some(cfg.with_max_sample_rate());
                }
                break;
            }
            if best_config.is_none() {
                best_config = Some(cfg.with_max_sample_rate());
            }
        }

        let supported_config = best_config.ok_or_else(|| {
            AudioError::DeviceUnavailable("no suitable input configuration".to_string())
        })?;

        self.actual_sample_rate = supported_config.sample_rate().0;
        self.sample_format = supported_config.sample_format();
        info!(
            "Audio config: {} channels @ {} Hz, {:?} (analysis rate: {} Hz)",
            supported_config.channels(),
            self.actual_sample_rate,
            self.sample_format,
            self.config.sample_rate
        );

        self.stream_config = Some(supported_config.config());
        self.device = Some(device);
        Ok(())
    }

    fn build_stream(&self, frame_len: usize, sender: Sender<AudioFrame>) -> Result<Stream> {
        let device = self.device.as_ref().ok_or_else(|| {
            AudioError::DeviceUnavailable("device not initialized".to_string())
        })?;
        let config = self.stream_config.clone().ok_or_else(|| {
            AudioError::DeviceUnavailable("device not initialized".to_string())
        })?;

        let channels = usize::from(config.channels.max(1));
        let stream_error = self.stream_error.clone();
        let err_fn = move |err: cpal::StreamError| {
            error!("Audio stream error: {}", err);
            *stream_error.lock() = Some(err.to_string());
        };

        let stream = match self.sample_format {
            SampleFormat::F32 => {
                let mut assembler = FrameAssembler::new(frame_len, channels);
                let is_running = self.is_running.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if is_running.load(Ordering::Relaxed) {
                            assembler.push(data, |s| s, |frame| forward(&sender, frame));
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let mut assembler = FrameAssembler::new(frame_len, channels);
                let is_running = self.is_running.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if is_running.load(Ordering::Relaxed) {
                            assembler.push(
                                data,
                                |s| s as f32 / 32_768.0,
                                |frame| forward(&sender, frame),
                            );
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut assembler = FrameAssembler::new(frame_len, channels);
                let is_running = self.is_running.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        if is_running.load(Ordering::Relaxed) {
                            assembler.push(
                                data,
                                |s| (s as f32 - 32_768.0) / 32_768.0,
                                |frame| forward(&sender, frame),
                            );
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => return Err(AudioError::UnsupportedFormat(format!("{other:?}")).into()),
        };

        stream.map_err(|e| AudioError::DeviceUnavailable(e.to_string()).into())
    }

    fn find_device_by_name(&self, name: &str) -> Result<Device> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        for device in devices {
            if let Ok(device_name) = device.name() {
                if device_name.contains(name) {
                    return Ok(device);
                }
            }
        }

        Err(AudioError::DeviceUnavailable(format!("device not found: {name}")).into())
    }
}

impl FrameSource for CpalSource {
    fn prepare(&mut self) -> Result<()> {
        if self.device.is_none() {
            self.init()?;
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.actual_sample_rate
    }

    fn open(&mut self, frame_len: usize) -> Result<Receiver<AudioFrame>> {
        self.prepare()?;

        let (sender, receiver) = bounded(FRAME_QUEUE_DEPTH);
        *self.stream_error.lock() = None;
        self.is_running.store(true, Ordering::Relaxed);

        let stream = match self.build_stream(frame_len, sender) {
            Ok(stream) => stream,
            Err(e) => {
                self.is_running.store(false, Ordering::Relaxed);
                return Err(e);
            }
        };

        if let Err(e) = stream.play() {
            self.is_running.store(false, Ordering::Relaxed);
            return Err(AudioError::DeviceUnavailable(e.to_string()).into());
        }

        self.stream = Some(stream);
        info!("Audio capture started ({} samples per frame)", frame_len);
        Ok(receiver)
    }

    fn check(&self) -> Result<()> {
        match self.stream_error.lock().as_ref() {
            Some(message) => Err(AudioError::DeviceUnavailable(message.clone()).into()),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        self.is_running.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause audio stream: {}", e);
            }
            drop(stream);
            info!("Audio capture stopped");
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

fn forward(sender: &Sender<AudioFrame>, frame: AudioFrame) {
    if sender.try_send(frame).is_err() {
        warn!("Audio frame queue full - dropping frame");
    }
}

/// Re-blocks interleaved device buffers into mono frames of a fixed length
struct FrameAssembler {
    pending: Vec<f32>,
    frame_len: usize,
    channels: usize,
}

impl FrameAssembler {
    fn new(frame_len: usize, channels: usize) -> Self {
        Self {
            pending: Vec::with_capacity(frame_len),
            frame_len: frame_len.max(1),
            channels: channels.max(1),
        }
    }

    fn push<T: Copy>(
        &mut self,
        data: &[T],
        convert: impl Fn(T) -> f32,
        mut emit: impl FnMut(AudioFrame),
    ) {
        for chunk in data.chunks(self.channels) {
            let sum: f32 = chunk.iter().map(|&s| convert(s)).sum();
            self.pending.push(sum / chunk.len() as f32);

            if self.pending.len() == self.frame_len {
                let frame = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_len));
                emit(AudioFrame::new(frame));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_reblocks() {
        let mut assembler = FrameAssembler::new(4, 1);
        let mut frames = Vec::new();

        assembler.push(&[1.0f32, 2.0, 3.0], |s| s, |f| frames.push(f));
        assert!(frames.is_empty());

        assembler.push(&[4.0f32, 5.0, 6.0, 7.0, 8.0, 9.0], |s| s, |f| frames.push(f));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frames[1].samples(), &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(assembler.pending, vec![9.0]);
    }

    #[test]
    fn test_assembler_downmixes() {
        let mut assembler = FrameAssembler::new(2, 2);
        let mut frames = Vec::new();
        assembler.push(&[1.0f32, 0.0, 0.5, 0.5], |s| s, |f| frames.push(f));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), &[0.5, 0.5]);
    }

    #[test]
    fn test_assembler_converts_i16() {
        let mut assembler = FrameAssembler::new(2, 1);
        let mut frames = Vec::new();
        assembler.push(&[16384i16, -32768], |s| s as f32 / 32_768.0, |f| frames.push(f));
        assert_eq!(frames[0].samples(), &[0.5, -1.0]);
    }

    #[test]
    fn test_source_creation() {
        let source = CpalSource::new(AudioConfig::default());
        assert!(!source.is_running.load(Ordering::Relaxed));
        assert_eq!(source.sample_rate(), 0);
        assert!(source.check().is_ok());
    }
}
