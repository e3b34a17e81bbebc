//! Live frame sources consumed by the recorder

use crossbeam_channel::{unbounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::frame::{AudioFrame, Waveform};
use crate::error::Result;

/// A stream of fixed-size mono frames
///
/// `open` starts delivery and hands back the receiving end of the frame
/// queue. Every frame except possibly the last has exactly `frame_len`
/// samples. `close` must release the underlying device and is called by the
/// recorder on every exit path.
pub trait FrameSource {
    /// Acquire the device so that `sample_rate` is known; called before `open`
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Rate of the samples this source delivers
    fn sample_rate(&self) -> u32;

    /// Start delivering frames of `frame_len` samples
    fn open(&mut self, frame_len: usize) -> Result<Receiver<AudioFrame>>;

    /// Report an asynchronous stream failure, if any occurred since `open`
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Stop delivery and release the device
    fn close(&mut self);
}

/// Caller-held cancellation signal for a recording in progress
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the recorder to stop at the next frame boundary
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm the flag for the next recording
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Replays an in-memory signal as if it came from a microphone
///
/// All frames are queued at `open`; the recorder still decides how many of
/// them to consume.
pub struct WaveformSource {
    samples: Vec<f32>,
    sample_rate: u32,
    open: bool,
    opened_count: usize,
}

impl WaveformSource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            open: false,
            opened_count: 0,
        }
    }

    pub fn from_waveform(waveform: Waveform) -> Self {
        let sample_rate = waveform.sample_rate();
        Self::new(waveform.into_samples(), sample_rate)
    }

    /// Whether the source is currently delivering
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// How many times `open` was called
    pub fn opened_count(&self) -> usize {
        self.opened_count
    }
}

impl FrameSource for WaveformSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn open(&mut self, frame_len: usize) -> Result<Receiver<AudioFrame>> {
        let (sender, receiver) = unbounded();
        for chunk in self.samples.chunks(frame_len.max(1)) {
            // Receiver is alive, send cannot fail
            let _ = sender.send(AudioFrame::new(chunk.to_vec()));
        }
        debug!(
            "Replay source queued {} samples in frames of {}",
            self.samples.len(),
            frame_len
        );
        self.open = true;
        self.opened_count += 1;
        Ok(receiver)
    }

    fn close(&mut self) {
        self.open = false;
    }
}
