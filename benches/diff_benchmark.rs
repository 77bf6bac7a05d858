use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};

use spotcheck::diff::{encode_png, visual_diff};

fn checkerboard(width: u32, height: u32, offset: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        if (x + y + offset) % 2 == 0 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    encode_png(&img).unwrap()
}

fn benchmark_visual_diff(c: &mut Criterion) {
    let before = checkerboard(800, 600, 0);
    let same = before.clone();
    let inverted = checkerboard(800, 600, 1);

    c.bench_function("visual_diff_identical_800x600", |b| {
        b.iter(|| {
            let result = visual_diff(black_box(&before), black_box(&same)).unwrap();
            assert!(result.identical);
        })
    });

    c.bench_function("visual_diff_every_pixel_800x600", |b| {
        b.iter(|| {
            let result = visual_diff(black_box(&before), black_box(&inverted)).unwrap();
            assert!(!result.identical);
        })
    });
}

criterion_group!(benches, benchmark_visual_diff);
criterion_main!(benches);
