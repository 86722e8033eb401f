use compression::{deflate, zlib};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample_data() -> Vec<u8> {
    (0..1 << 16_u32)
        .map(|i| ((i % 251) ^ (i / 4096)) as u8)
        .collect()
}

fn compression_benchmark(c: &mut Criterion) {
    let data = sample_data();
    c.bench_function("deflate compress", |b| {
        b.iter(|| deflate::compress(black_box(&data)))
    });

    let compressed = zlib::compress(&data);
    c.bench_function("zlib decompress", |b| {
        b.iter(|| zlib::decompress(black_box(&compressed)))
    });
}

criterion_group!(benches, compression_benchmark);
criterion_main!(benches);
