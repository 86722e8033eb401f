use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn checksums(c: &mut Criterion) {
    let data: Vec<u8> = (0..1 << 20).map(|i: u32| (i.wrapping_mul(31) >> 3) as u8).collect();

    let mut group = c.benchmark_group("checksums");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("crc32", |b| b.iter(|| hash::crc32(black_box(&data))));
    group.bench_function("adler32", |b| b.iter(|| hash::adler32(black_box(&data))));
    group.finish();
}

criterion_group!(benches, checksums);
criterion_main!(benches);
