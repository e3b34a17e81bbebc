//! Audio file decoding for the upload path
//!
//! WAV goes through `hound`; anything else is probed with `symphonia`
//! (MP3 and whatever other codecs it was built with). Output is always a
//! mono waveform at the requested analysis rate.

use std::io::{Cursor, ErrorKind};
use std::path::Path;

use symphonia::core::audio::SampleBuffer as DecodedBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use super::frame::Waveform;
use super::resample::resample;
use crate::error::{DecodeError, Result};

/// Decode an audio file into a mono waveform at `target_rate`
pub fn decode_file<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<Waveform> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| DecodeError::Read(format!("{}: {}", path.display(), e)))?;
    let extension = path.extension().and_then(|ext| ext.to_str());

    info!("Decoding: {}", path.display());
    decode_bytes(bytes, extension, target_rate)
}

/// Decode an in-memory audio file; `extension` is a format hint such as `"mp3"`
pub fn decode_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
    target_rate: u32,
) -> Result<Waveform> {
    let (samples, source_rate) = if is_riff_wave(&bytes) {
        match read_wav(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                // hound only reads PCM/float; let symphonia try other WAV codecs
                debug!("hound could not read WAV ({}), probing with symphonia", e);
                read_with_symphonia(bytes, Some("wav"))?
            }
        }
    } else {
        read_with_symphonia(bytes, extension)?
    };

    if samples.is_empty() {
        return Err(DecodeError::Empty.into());
    }

    debug!(
        "Decoded {} samples @ {} Hz ({:.2}s)",
        samples.len(),
        source_rate,
        samples.len() as f32 / source_rate as f32
    );

    let samples = resample(&samples, source_rate, target_rate)?;
    Waveform::new(samples, target_rate).map_err(|_| DecodeError::Empty.into())
}

fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Read PCM or float WAV, downmixed to mono
fn read_wav(bytes: &[u8]) -> std::result::Result<(Vec<f32>, u32), DecodeError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let spec = reader.spec();
    debug!(
        "WAV format: {} channels, {} Hz, {} bits",
        spec.channels, spec.sample_rate, spec.bits_per_sample
    );

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| DecodeError::Malformed(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| DecodeError::Malformed(e.to_string()))?
        }
    };

    Ok((downmix(&samples, usize::from(spec.channels)), spec.sample_rate))
}

fn read_with_symphonia(bytes: Vec<u8>, extension: Option<&str>) -> Result<(Vec<f32>, u32)> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Malformed("missing sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Malformed(e.to_string()).into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count();
                let mut buffer = DecodedBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend(downmix(buffer.samples(), channels));
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(DecodeError::Malformed(e.to_string()).into()),
        }
    }

    Ok((samples, sample_rate))
}

/// Average interleaved channels into one
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerError;

    fn wav_bytes(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_wav_mono() {
        let bytes = wav_bytes(&[0, 16384, -16384, 32767], 1, 8000);
        let waveform = decode_bytes(bytes, Some("wav"), 8000).unwrap();
        assert_eq!(waveform.sample_rate(), 8000);
        assert_eq!(waveform.samples()[..3], [0.0, 0.5, -0.5]);
    }

    #[test]
    fn test_decode_wav_stereo_downmix() {
        let bytes = wav_bytes(&[16384, 0, -16384, -16384], 2, 8000);
        let waveform = decode_bytes(bytes, None, 8000).unwrap();
        assert_eq!(waveform.samples(), &[0.25, -0.5]);
    }

    #[test]
    fn test_decode_resamples() {
        let bytes = wav_bytes(&vec![1000i16; 4410], 1, 44100);
        let waveform = decode_bytes(bytes, Some("wav"), 22050).unwrap();
        assert_eq!(waveform.sample_rate(), 22050);
        assert_eq!(waveform.len(), 2205);
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode_bytes(b"definitely not audio".to_vec(), Some("txt"), 22050);
        assert!(matches!(result, Err(SerError::Decode(_))));
    }

    #[test]
    fn test_decode_empty_wav() {
        let bytes = wav_bytes(&[], 1, 22050);
        let result = decode_bytes(bytes, Some("wav"), 22050);
        assert!(matches!(result, Err(SerError::Decode(DecodeError::Empty))));
    }

    #[test]
    fn test_decode_truncated_riff() {
        let mut bytes = wav_bytes(&[0, 1, 2, 3], 1, 8000);
        bytes.truncate(20);
        let result = decode_bytes(bytes, Some("wav"), 8000);
        assert!(matches!(result, Err(SerError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_file() {
        let result = decode_file("/nonexistent/clip.wav", 22050);
        assert!(matches!(result, Err(SerError::Decode(DecodeError::Read(_)))));
    }

    #[test]
    fn test_downmix() {
        assert_eq!(downmix(&[1.0, 3.0, 2.0, 2.0], 2), vec![2.0, 2.0]);
        assert_eq!(downmix(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }
}
