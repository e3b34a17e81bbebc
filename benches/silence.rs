//! Benchmarks for silence detection and recording

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ser_rs::{Recorder, RecordingConfig, SilenceDetector, StopFlag, WaveformSource};

fn generate_speech_like_audio(sample_rate: u32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            // Simulate speech with varying amplitude
            let envelope = 0.5 + 0.5 * (2.0 * std::f32::consts::PI * 3.0 * t).sin();
            amplitude * envelope * (2.0 * std::f32::consts::PI * 200.0 * t).sin()
        })
        .collect()
}

fn bench_silence_detector(c: &mut Criterion) {
    let mut group = c.benchmark_group("silence_detector");
    let sample_rate = 22050;
    let frame_len = sample_rate as usize / 2;

    let speech = generate_speech_like_audio(sample_rate, 5.0, 0.3);
    group.bench_function("plain_5s", |b| {
        b.iter_with_setup(
            || SilenceDetector::with_threshold(0.01, 3),
            |mut detector| {
                for frame in speech.chunks(frame_len) {
                    black_box(detector.observe(frame));
                }
            },
        )
    });

    let config = RecordingConfig {
        gate_high_pass_hz: Some(80.0),
        ..Default::default()
    };
    group.bench_function("gated_5s", |b| {
        b.iter_with_setup(
            || SilenceDetector::new(&config, sample_rate).unwrap(),
            |mut detector| {
                for frame in speech.chunks(frame_len) {
                    black_box(detector.observe(frame));
                }
            },
        )
    });

    group.finish();
}

fn bench_recorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("recorder");
    let sample_rate = 22050;

    for frame_secs in [0.1f32, 0.25, 0.5] {
        let config = RecordingConfig {
            max_duration_secs: 5.0,
            frame_duration_secs: frame_secs,
            ..Default::default()
        };
        let recorder = Recorder::new(config);
        let speech = generate_speech_like_audio(sample_rate, 5.0, 0.3);

        group.bench_with_input(
            BenchmarkId::new("frame_secs", format!("{:.2}", frame_secs)),
            &speech,
            |b, speech| {
                b.iter_with_setup(
                    || WaveformSource::new(speech.clone(), sample_rate),
                    |mut source| black_box(recorder.record(&mut source, &StopFlag::new())),
                )
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_silence_detector, bench_recorder);
criterion_main!(benches);
