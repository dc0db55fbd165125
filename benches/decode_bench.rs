use std::sync::Arc;
use std::time::Duration;

use cdm_video_decoder::synthetic::{SyntheticEngineFactory, SyntheticEngineOptions, encode_unit};
use cdm_video_decoder::{
    AdapterOptions, Codec, CompressedUnit, DecoderAdapter, DecoderConfig, Dimensions,
    HeapAllocator, PlaneCopy, Timestamp, VideoFormat, copy_plane,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn run_decode(dims: Dimensions, padding: usize, units: &[Vec<u8>]) -> usize {
    let mut adapter = DecoderAdapter::with_options(
        SyntheticEngineFactory::new(SyntheticEngineOptions {
            lookahead: 1,
            stride_padding: padding,
            ..SyntheticEngineOptions::default()
        }),
        Arc::new(HeapAllocator::default()),
        AdapterOptions {
            report_metrics: Some(false),
        },
    );
    adapter
        .initialize(DecoderConfig::new(Codec::Vp9, dims, VideoFormat::I420))
        .expect("initialize should succeed in benchmark");

    let mut frames = 0usize;
    for (i, unit) in units.iter().enumerate() {
        let outcome = adapter
            .decode_frame(CompressedUnit::new(unit, Timestamp(i as i64 * 33_333)))
            .expect("decode should succeed in benchmark");
        frames += usize::from(!outcome.is_needs_more_data());
    }
    while let Some(_frame) = adapter
        .drain()
        .expect("drain should succeed in benchmark")
        .into_frame()
    {
        frames += 1;
    }
    frames
}

fn decode_benchmark(c: &mut Criterion) {
    let units: Vec<Vec<u8>> = (0..30u8).map(encode_unit).collect();

    let mut group = c.benchmark_group("decode_synthetic");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(1));

    for (label, dims) in [
        ("360p", Dimensions::new(640, 360)),
        ("1080p", Dimensions::new(1920, 1080)),
    ] {
        for padding in [0usize, 64] {
            group.throughput(Throughput::Elements(units.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(label, format!("padding_{padding}")),
                &padding,
                |b, &padding| {
                    b.iter(|| run_decode(dims, padding, &units));
                },
            );
        }
    }
    group.finish();
}

fn copy_plane_benchmark(c: &mut Criterion) {
    let (width, height) = (1920usize, 1080usize);
    let mut group = c.benchmark_group("copy_plane");
    group.throughput(Throughput::Bytes((width * height) as u64));

    for (label, src_stride, dst_stride) in [
        ("tight", width, width),
        ("padded_src", width + 64, width),
        ("padded_both", width + 64, width + 32),
    ] {
        let src = vec![0x5A_u8; src_stride * height];
        let mut dst = vec![0_u8; dst_stride * height];
        let copy = PlaneCopy {
            plane: 0,
            row_bytes: width,
            rows: height,
            src_stride,
            dst_stride,
        };
        group.bench_function(label, |b| {
            b.iter(|| copy_plane(&src, &mut dst, copy).expect("copy should fit"));
        });
    }
    group.finish();
}

criterion_group!(benches, decode_benchmark, copy_plane_benchmark);
criterion_main!(benches);
