//! Silence-triggered recording loop
//!
//! The input callback only queues frames. Everything else (buffering, the
//! silence decision, the duration cap, cancellation and stream teardown)
//! happens on the thread that calls [`Recorder::record`], so the buffer is
//! never touched after the stream is closed.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::buffer::SampleBuffer;
use super::frame::{AudioFrame, Waveform};
use super::silence::SilenceDetector;
use super::source::{FrameSource, StopFlag};
use crate::config::RecordingConfig;
use crate::error::{AudioError, Result};

/// How often the recorder wakes up to check the stop flag and the deadline
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Enough consecutive quiet frames
    Silence,
    /// The duration cap was reached
    MaxDuration,
    /// The caller raised the stop flag
    Cancelled,
    /// The source stopped delivering frames
    SourceEnded,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::Silence => "silence",
            StopReason::MaxDuration => "max_duration",
            StopReason::Cancelled => "cancelled",
            StopReason::SourceEnded => "source_ended",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one recording session
#[derive(Debug, Clone)]
pub struct Recording {
    pub waveform: Waveform,
    pub stop_reason: StopReason,
    /// Frames captured, including the final quiet ones
    pub frames: usize,
}

/// Drives one frame source until silence, the duration cap, or cancellation
pub struct Recorder {
    config: RecordingConfig,
}

impl Recorder {
    pub fn new(config: RecordingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Samples per frame at `sample_rate`
    pub fn frame_len(&self, sample_rate: u32) -> usize {
        ((sample_rate as f64 * self.config.frame_duration_secs as f64).round() as usize).max(1)
    }

    /// Frame budget implied by the duration cap
    pub fn max_frames(&self) -> usize {
        let ratio = self.config.max_duration_secs as f64 / self.config.frame_duration_secs as f64;
        // Tolerate float noise such as 2.0 / 0.5 = 4.000000001
        ((ratio - 1e-6).ceil() as usize).max(1)
    }

    /// Record one utterance from `source`
    pub fn record(&self, source: &mut dyn FrameSource, stop: &StopFlag) -> Result<Recording> {
        source.prepare()?;
        let sample_rate = source.sample_rate();
        let frame_len = self.frame_len(sample_rate);
        let max_frames = self.max_frames();
        let mut detector = SilenceDetector::new(&self.config, sample_rate)?;
        let mut buffer = SampleBuffer::with_capacity(sample_rate, max_frames);

        debug!(
            "Recording: {} Hz, {} samples/frame, at most {} frames, threshold {}",
            sample_rate, frame_len, max_frames, self.config.silence_threshold
        );

        let stop_reason = {
            let mut stream = OpenStream::open(source, frame_len)?;
            let receiver = stream.receiver.clone();

            // Wall-clock backstop in case the device stalls: cap plus one frame of slack
            let deadline =
                Instant::now() + self.config.max_duration() + self.config.frame_duration();

            let reason = loop {
                if stop.is_stop_requested() {
                    break StopReason::Cancelled;
                }
                stream.source.check()?;

                match receiver.recv_timeout(POLL_INTERVAL) {
                    Ok(frame) => {
                        let quiet_enough = detector.observe(frame.samples());
                        buffer.append(frame);

                        if quiet_enough {
                            break StopReason::Silence;
                        }
                        if buffer.frame_count() >= max_frames {
                            break StopReason::MaxDuration;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if Instant::now() >= deadline {
                            break StopReason::MaxDuration;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break StopReason::SourceEnded,
                }
            };

            stream.close();
            reason
        };

        info!(
            "Recording stopped ({}): {} frames, {:.2}s",
            stop_reason,
            buffer.frame_count(),
            buffer.duration()
        );

        let frames = buffer.frame_count();
        if buffer.is_empty() {
            return Err(AudioError::EmptyRecording.into());
        }

        Ok(Recording {
            waveform: buffer.finalize()?,
            stop_reason,
            frames,
        })
    }
}

/// Keeps a source open for the lifetime of the guard; closes it on every exit path
struct OpenStream<'a> {
    source: &'a mut dyn FrameSource,
    receiver: Receiver<AudioFrame>,
    closed: bool,
}

impl<'a> OpenStream<'a> {
    fn open(source: &'a mut dyn FrameSource, frame_len: usize) -> Result<Self> {
        let receiver = source.open(frame_len)?;
        Ok(Self {
            source,
            receiver,
            closed: false,
        })
    }

    fn close(&mut self) {
        if !self.closed {
            self.source.close();
            self.closed = true;
        }
    }
}

impl Drop for OpenStream<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::WaveformSource;
    use crate::error::SerError;
    use crossbeam_channel::{bounded, unbounded, Sender};

    fn config(max: f32, frame: f32, threshold: f32) -> RecordingConfig {
        RecordingConfig {
            max_duration_secs: max,
            frame_duration_secs: frame,
            silence_threshold: threshold,
            required_quiet_frames: 3,
            ..Default::default()
        }
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| 0.5 * (i as f32 * 0.3).sin()).collect()
    }

    /// Opens fine but never delivers anything
    struct StalledSource {
        sender: Option<Sender<AudioFrame>>,
        closed: bool,
    }

    impl FrameSource for StalledSource {
        fn sample_rate(&self) -> u32 {
            100
        }

        fn open(&mut self, _frame_len: usize) -> Result<Receiver<AudioFrame>> {
            let (sender, receiver) = unbounded();
            self.sender = Some(sender);
            Ok(receiver)
        }

        fn close(&mut self) {
            self.sender = None;
            self.closed = true;
        }
    }

    /// Fails to open
    struct MissingDevice;

    impl FrameSource for MissingDevice {
        fn sample_rate(&self) -> u32 {
            16000
        }

        fn open(&mut self, _frame_len: usize) -> Result<Receiver<AudioFrame>> {
            Err(AudioError::DeviceUnavailable("no input device".to_string()).into())
        }

        fn close(&mut self) {}
    }

    /// Delivers frames, then reports a stream failure
    struct FailingSource {
        closed: bool,
    }

    impl FrameSource for FailingSource {
        fn sample_rate(&self) -> u32 {
            100
        }

        fn open(&mut self, frame_len: usize) -> Result<Receiver<AudioFrame>> {
            let (sender, receiver) = unbounded();
            sender.send(AudioFrame::new(vec![0.5; frame_len])).unwrap();
            Ok(receiver)
        }

        fn check(&self) -> Result<()> {
            Err(AudioError::DeviceUnavailable("device unplugged".to_string()).into())
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    /// Hands over `frames` loud frames one at a time, then raises the stop flag
    ///
    /// The channel is a rendezvous, so the flag goes up only after the
    /// recorder has taken the last frame. The source keeps a sender until
    /// closed, so the queue never reports a disconnect.
    struct CancellingSource {
        frames: usize,
        stop: StopFlag,
        sender: Option<Sender<AudioFrame>>,
        worker: Option<std::thread::JoinHandle<()>>,
        closed: bool,
    }

    impl FrameSource for CancellingSource {
        fn sample_rate(&self) -> u32 {
            100
        }

        fn open(&mut self, frame_len: usize) -> Result<Receiver<AudioFrame>> {
            let (sender, receiver) = bounded(0);
            let worker_sender = sender.clone();
            let frames = self.frames;
            let stop = self.stop.clone();
            self.worker = Some(std::thread::spawn(move || {
                for _ in 0..frames {
                    if worker_sender.send(AudioFrame::new(vec![0.5; frame_len])).is_err() {
                        return;
                    }
                }
                stop.request_stop();
            }));
            self.sender = Some(sender);
            Ok(receiver)
        }

        fn close(&mut self) {
            self.sender = None;
            self.closed = true;
        }
    }

    #[test]
    fn test_frame_budget() {
        let recorder = Recorder::new(config(5.0, 0.5, 0.01));
        assert_eq!(recorder.frame_len(22050), 11025);
        assert_eq!(recorder.max_frames(), 10);

        let recorder = Recorder::new(config(1.2, 0.5, 0.01));
        assert_eq!(recorder.max_frames(), 3);
    }

    #[test]
    fn test_stops_after_three_quiet_frames() {
        let sample_rate = 1000;
        let recorder = Recorder::new(config(2.0, 0.5, 0.01));
        let mut source = WaveformSource::new(vec![0.0; 2000], sample_rate);

        let recording = recorder.record(&mut source, &StopFlag::new()).unwrap();
        assert_eq!(recording.stop_reason, StopReason::Silence);
        assert_eq!(recording.frames, 3);
        assert_eq!(recording.waveform.len(), 1500);
        assert!(!source.is_open());
    }

    #[test]
    fn test_never_silent_stream_hits_cap() {
        let sample_rate = 1000;
        let recorder = Recorder::new(config(2.0, 0.5, 0.01));
        let mut source = WaveformSource::new(tone(10_000), sample_rate);

        let recording = recorder.record(&mut source, &StopFlag::new()).unwrap();
        assert_eq!(recording.stop_reason, StopReason::MaxDuration);
        assert_eq!(recording.frames, 4);
        assert_eq!(recording.waveform.len(), 2000);
    }

    #[test]
    fn test_speech_then_silence() {
        let sample_rate = 1000;
        let recorder = Recorder::new(config(10.0, 0.5, 0.01));
        let mut samples = tone(1500);
        samples.extend(vec![0.0; 5000]);
        let mut source = WaveformSource::new(samples, sample_rate);

        let recording = recorder.record(&mut source, &StopFlag::new()).unwrap();
        assert_eq!(recording.stop_reason, StopReason::Silence);
        assert_eq!(recording.frames, 6);
    }

    #[test]
    fn test_short_source_ends() {
        let recorder = Recorder::new(config(5.0, 0.5, 0.01));
        let mut source = WaveformSource::new(tone(700), 1000);

        let recording = recorder.record(&mut source, &StopFlag::new()).unwrap();
        assert_eq!(recording.stop_reason, StopReason::SourceEnded);
        assert_eq!(recording.waveform.len(), 700);
    }

    #[test]
    fn test_cancelled_before_any_frame() {
        let recorder = Recorder::new(config(5.0, 0.5, 0.01));
        let mut source = WaveformSource::new(tone(5000), 1000);
        let stop = StopFlag::new();
        stop.request_stop();

        let result = recorder.record(&mut source, &stop);
        assert!(matches!(
            result,
            Err(SerError::Audio(AudioError::EmptyRecording))
        ));
        assert!(!source.is_open());
    }

    #[test]
    fn test_cancel_keeps_buffered_frames() {
        let recorder = Recorder::new(config(10.0, 0.5, 0.01));
        let stop = StopFlag::new();
        let mut source = CancellingSource {
            frames: 3,
            stop: stop.clone(),
            sender: None,
            worker: None,
            closed: false,
        };

        let recording = recorder.record(&mut source, &stop).unwrap();
        assert_eq!(recording.stop_reason, StopReason::Cancelled);
        assert_eq!(recording.frames, 3);
        assert_eq!(recording.waveform.len(), 3 * 50);
        assert!(recording.waveform.samples().iter().all(|&s| s == 0.5));
        assert!(source.closed);

        source.worker.take().unwrap().join().unwrap();
    }

    #[test]
    fn test_stalled_device_is_empty_recording() {
        let recorder = Recorder::new(config(0.1, 0.1, 0.01));
        let mut source = StalledSource {
            sender: None,
            closed: false,
        };

        let started = Instant::now();
        let result = recorder.record(&mut source, &StopFlag::new());
        assert!(matches!(
            result,
            Err(SerError::Audio(AudioError::EmptyRecording))
        ));
        assert!(source.closed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_device_unavailable() {
        let recorder = Recorder::new(config(5.0, 0.5, 0.01));
        let result = recorder.record(&mut MissingDevice, &StopFlag::new());
        assert!(matches!(
            result,
            Err(SerError::Audio(AudioError::DeviceUnavailable(_)))
        ));
    }

    #[test]
    fn test_stream_error_closes_source() {
        let recorder = Recorder::new(config(5.0, 0.5, 0.01));
        let mut source = FailingSource { closed: false };
        let result = recorder.record(&mut source, &StopFlag::new());
        assert!(matches!(
            result,
            Err(SerError::Audio(AudioError::DeviceUnavailable(_)))
        ));
        assert!(source.closed);
    }

    #[test]
    fn test_require_speech_waits_for_cap() {
        let mut cfg = config(2.0, 0.5, 0.01);
        cfg.require_speech = true;
        let recorder = Recorder::new(cfg);
        let mut source = WaveformSource::new(vec![0.0; 4000], 1000);

        let recording = recorder.record(&mut source, &StopFlag::new()).unwrap();
        assert_eq!(recording.stop_reason, StopReason::MaxDuration);
        assert_eq!(recording.frames, 4);
    }
}
