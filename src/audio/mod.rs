//! Audio capture, recording and decoding modules

pub mod buffer;
pub mod capture;
pub mod decode;
pub mod frame;
pub mod recorder;
pub mod resample;
pub mod silence;
pub mod source;

pub use buffer::SampleBuffer;
pub use capture::CpalSource;
pub use decode::{decode_bytes, decode_file};
pub use frame::{AudioFrame, AudioSample, Waveform};
pub use recorder::{Recorder, Recording, StopReason};
pub use resample::{resample, resample_waveform};
pub use silence::{frame_norm, FrameLoudness, SilenceDetector};
pub use source::{FrameSource, StopFlag, WaveformSource};
