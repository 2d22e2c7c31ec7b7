use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use teleview_core::{color_from_rgb8, decode_frame, filter_frame, DecodedFrame, Point3f, RawPointMessage, RenderConfig};

fn synthetic_message(n: usize) -> RawPointMessage {
    let frame: DecodedFrame = (0..n)
        .map(|i| {
            let t = i as f32 * 0.001;
            let position = Point3f::new(t.sin(), t.cos(), (i % 2000) as f32 * 0.01);
            let color = color_from_rgb8((i % 256) as u8, 128, 255 - (i % 256) as u8);
            (position, color)
        })
        .collect();
    RawPointMessage::encode_points(&frame, 32).expect("32-byte records hold every field")
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");
    for &n in &[10_000usize, 100_000, 300_000] {
        let msg = synthetic_message(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &msg, |b, msg| {
            b.iter(|| decode_frame(black_box(msg)).unwrap())
        });
    }
    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_frame");
    let frame = decode_frame(&synthetic_message(300_000)).unwrap();
    for &rate in &[1usize, 4, 10] {
        let config = RenderConfig { downsample_rate: rate, max_points: 100_000, display_points: 100_000, ..Default::default() };
        group.bench_with_input(BenchmarkId::new("downsample", rate), &config, |b, config| {
            b.iter(|| filter_frame(black_box(&frame), config, config.display_points))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_filter);
criterion_main!(benches);
