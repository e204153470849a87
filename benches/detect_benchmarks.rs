//! Benchmarks for the integral image engine and cascade scanning

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{GrayImage, Luma};
use microvision::imgproc::{IntegralImage, Moment, MovingWindowIntegral};
use microvision::objdetect::haar::CascadeParts;
use microvision::{HaarCascade, ImageView};
use std::time::Duration;

/// Textured frame with a few dark-left / bright-right squares
fn create_frame(width: u32, height: u32) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = ((x * 13 + y * 7) % 64) as u8;
            img.put_pixel(x, y, Luma([v]));
        }
    }
    for k in 0..4 {
        let (ox, oy) = (16 + k * 48, 16 + k * 24);
        if ox + 24 > width || oy + 24 > height {
            break;
        }
        for y in oy..oy + 24 {
            for x in ox + 12..ox + 24 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }
    img
}

fn edge_cascade() -> HaarCascade {
    HaarCascade::from_parts(CascadeParts {
        window: (24, 24),
        stage_feature_counts: vec![1, 1],
        stage_thresholds: vec![50, 50],
        feature_thresholds: vec![3000, 1000],
        alpha1: vec![-100, -100],
        alpha2: vec![100, 100],
        feature_rect_counts: vec![2, 3],
        rect_weights: vec![-1, 1, 1, -2, 1],
        rects: vec![
            [0, 0, 12, 24],
            [12, 0, 12, 24],
            [0, 0, 24, 8],
            [0, 8, 24, 8],
            [0, 16, 24, 8],
        ],
    })
    .expect("valid cascade")
}

fn benchmark_integral_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("integral_image");
    for size in [160u32, 320, 640] {
        let img = create_frame(size, size * 3 / 4);
        group.bench_with_input(
            BenchmarkId::new("static", format!("{}x{}", size, size * 3 / 4)),
            &img,
            |b, img| {
                let view = ImageView::from(img);
                b.iter(|| IntegralImage::new(black_box(&view)));
            },
        );
    }
    group.finish();
}

fn benchmark_moving_window(c: &mut Criterion) {
    let img = create_frame(320, 240);
    let view = ImageView::from(&img);
    let roi = view.bounds().expect("frame fits");
    let mut mw = MovingWindowIntegral::new(Moment::Sum, 320, 24).expect("buffers");

    c.bench_function("moving_window_full_pass", |b| {
        b.iter(|| {
            mw.rescale(roi, 320, 240).expect("rescale");
            mw.compute(&view).expect("compute");
            while mw.y_offset() + 2 + mw.window_rows() <= mw.height() {
                mw.shift(black_box(&view), 2).expect("shift");
            }
        });
    });
}

fn benchmark_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("haar_detect");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    let cascade = edge_cascade();
    for size in [160u32, 320] {
        let img = create_frame(size, size * 3 / 4);
        group.bench_with_input(
            BenchmarkId::new("cpu", format!("{}x{}", size, size * 3 / 4)),
            &img,
            |b, img| {
                let view = ImageView::from(img);
                let roi = view.bounds().expect("frame fits");
                b.iter(|| cascade.detect(black_box(&view), roi));
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_integral_build,
    benchmark_moving_window,
    benchmark_detect
);
criterion_main!(benches);
