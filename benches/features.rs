//! Benchmarks for feature extraction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ser_rs::audio::resample;
use ser_rs::{FeatureConfig, FeatureExtractor, FeatureVariant, Waveform};

fn generate_voice(sample_rate: u32, duration_secs: f32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.3 * (2.0 * std::f32::consts::PI * 180.0 * t).sin()
                + 0.2 * (2.0 * std::f32::consts::PI * 900.0 * t).sin()
                + 0.1 * (2.0 * std::f32::consts::PI * 2400.0 * t).sin()
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let sample_rate = 22050;

    for variant in [FeatureVariant::Mfcc, FeatureVariant::Extended] {
        let config = FeatureConfig {
            variant,
            ..Default::default()
        };
        let extractor = FeatureExtractor::new(&config, sample_rate).unwrap();

        for secs in [1.0f32, 3.0] {
            let waveform = Waveform::new(generate_voice(sample_rate, secs), sample_rate).unwrap();
            group.bench_with_input(
                BenchmarkId::new(variant.to_string(), format!("{secs}s")),
                &waveform,
                |b, waveform| b.iter(|| black_box(extractor.extract(waveform).unwrap())),
            );
        }
    }

    group.finish();
}

fn bench_extractor_setup(c: &mut Criterion) {
    let config = FeatureConfig {
        variant: FeatureVariant::Extended,
        ..Default::default()
    };
    c.bench_function("extractor_setup_extended", |b| {
        b.iter(|| black_box(FeatureExtractor::new(&config, 22050).unwrap()))
    });
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");
    let input = generate_voice(48000, 3.0);

    for target in [16000u32, 22050] {
        group.bench_with_input(BenchmarkId::new("from_48k", target), &input, |b, input| {
            b.iter(|| black_box(resample(input, 48000, target).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract, bench_extractor_setup, bench_resample);
criterion_main!(benches);
