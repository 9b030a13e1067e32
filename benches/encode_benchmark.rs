use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use heicconv::processing::encode;
use heicconv::OutputFormat;
use image::{DynamicImage, Rgb, RgbImage};

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn benchmark_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.sample_size(20);

    for (width, height) in [(640, 480), (1920, 1080)] {
        let image = gradient(width, height);
        let label = format!("{}x{}", width, height);
        group.throughput(Throughput::Elements(u64::from(width) * u64::from(height)));

        group.bench_with_input(BenchmarkId::new("jpeg_q80", &label), &image, |b, image| {
            b.iter(|| encode(black_box(image), OutputFormat::Jpeg, 80))
        });
        group.bench_with_input(BenchmarkId::new("png", &label), &image, |b, image| {
            b.iter(|| encode(black_box(image), OutputFormat::Png, 80))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_encode);
criterion_main!(benches);
