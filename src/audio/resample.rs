//! Sample rate conversion for finished waveforms

use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use super::frame::Waveform;
use crate::error::{AudioError, Result};

const CHUNK_SIZE: usize = 1024;

/// Convert `samples` from `source_rate` to `target_rate`
///
/// The resampler's output delay is dropped from the front, so input sample
/// `i` lands at output index `i * target / source`. The input is zero-padded
/// until the tail has been flushed, and the output is trimmed to
/// `round(len * target / source)` samples.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == 0 || target_rate == 0 {
        return Err(AudioError::Resampling(format!(
            "invalid rates {source_rate} Hz -> {target_rate} Hz"
        ))
        .into());
    }
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    debug!(
        "Resampling {} samples: {} Hz -> {} Hz",
        samples.len(),
        source_rate,
        target_rate
    );

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_SIZE,
        1, // sub-chunks
        1, // channels
    )
    .map_err(|e| AudioError::Resampling(e.to_string()))?;

    let ratio = target_rate as f64 / source_rate as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let wanted = expected + delay;
    // Input past which a stalled resampler is reported instead of fed forever
    let input_limit = samples.len() + (delay as f64 / ratio).ceil() as usize + 4 * CHUNK_SIZE;

    let mut output = Vec::with_capacity(wanted + CHUNK_SIZE);
    let mut chunk = vec![0.0f32; CHUNK_SIZE];
    let mut position = 0;

    // Keep feeding (zeros past the end) until the delayed tail has come out
    while output.len() < wanted {
        let needed = resampler.input_frames_next();
        if chunk.len() != needed {
            chunk.resize(needed, 0.0);
        }
        chunk.fill(0.0);

        let end = (position + needed).min(samples.len());
        if position < end {
            chunk[..end - position].copy_from_slice(&samples[position..end]);
        }
        position += needed;

        let result = resampler
            .process(std::slice::from_ref(&chunk), None)
            .map_err(|e| AudioError::Resampling(e.to_string()))?;

        if let Some(resampled) = result.into_iter().next() {
            output.extend(resampled);
        }

        if position > input_limit && output.len() < wanted {
            return Err(AudioError::Resampling("resampler made no progress".to_string()).into());
        }
    }

    output.truncate(wanted);
    output.drain(..delay);
    Ok(output)
}

/// Bring a waveform to `target_rate`, passing it through unchanged when it already matches
pub fn resample_waveform(waveform: Waveform, target_rate: u32) -> Result<Waveform> {
    if waveform.sample_rate() == target_rate {
        return Ok(waveform);
    }
    let samples = resample(waveform.samples(), waveform.sample_rate(), target_rate)?;
    Waveform::new(samples, target_rate)
}
