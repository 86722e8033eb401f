use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{argb, registry, ImageFormat, PixelBuffer};

fn sample_image() -> PixelBuffer {
    let (width, height) = (256, 256);
    let data = (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            argb(0xFF, x as u8, y as u8, ((x ^ y) & 0xF0) as u8)
        })
        .collect();
    PixelBuffer::from_data(data, width, height)
}

fn codec_benchmark(c: &mut Criterion) {
    let pixels = sample_image();

    for format in ImageFormat::ALL.into_iter().filter(ImageFormat::can_encode) {
        let encoded = registry::encode(&pixels, format).expect("format can be encoded");

        c.bench_function(&format!("{format} encode"), |b| {
            b.iter(|| registry::encode(black_box(&pixels), format))
        });
        c.bench_function(&format!("{format} decode"), |b| {
            b.iter(|| registry::decode(black_box(&encoded)))
        });
    }
}

criterion_group!(benches, codec_benchmark);
criterion_main!(benches);
