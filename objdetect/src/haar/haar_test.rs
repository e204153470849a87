use super::*;
use cv_core::{Error, ImageView, Rect};
use image::{GrayImage, Luma};
use std::sync::atomic::AtomicBool;

/// One stage, one feature: right half of the window minus its left half.
/// Fires only on a dark-left / bright-right square aligned with the window.
fn edge_cascade() -> HaarCascade {
    HaarCascade::from_parts(CascadeParts {
        window: (24, 24),
        stage_feature_counts: vec![1],
        stage_thresholds: vec![50],
        feature_thresholds: vec![3900],
        alpha1: vec![-100],
        alpha2: vec![100],
        feature_rect_counts: vec![2],
        rect_weights: vec![-1, 1],
        rects: vec![[0, 0, 12, 24], [12, 0, 12, 24]],
    })
    .unwrap()
}

fn edge_pattern(w: u32, h: u32, at: (u32, u32)) -> GrayImage {
    edge_square(w, h, at, 24)
}

/// Dark-left / bright-right square of side `side` on a black frame.
fn edge_square(w: u32, h: u32, at: (u32, u32), side: u32) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in at.1..at.1 + side {
        for x in at.0 + side / 2..at.0 + side {
            img.put_pixel(x, y, Luma([255]));
        }
    }
    img
}

#[test]
fn test_haar_detects_handcrafted_pattern() {
    let img = edge_pattern(64, 64, (16, 20));
    let view = ImageView::from(&img);
    let cascade = edge_cascade();

    let raw = cascade.detect_raw(&view, view.bounds().unwrap()).unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].rect, Rect::new(16, 20, 24, 24));
    assert_eq!(raw[0].scale, 1.0);

    let merged = cascade.detect(&view, view.bounds().unwrap()).unwrap();
    assert_eq!(merged, vec![Rect::new(16, 20, 24, 24)]);
}

#[test]
fn test_haar_roi_offsets_are_mapped_back() {
    let img = edge_pattern(64, 64, (16, 20));
    let view = ImageView::from(&img);
    let found = edge_cascade()
        .detect(&view, Rect::new(8, 8, 56, 56))
        .unwrap();
    assert_eq!(found, vec![Rect::new(16, 20, 24, 24)]);
}

#[test]
fn test_haar_flat_image_is_rejected_by_contrast_floor() {
    let mut img = GrayImage::new(64, 64);
    for p in img.pixels_mut() {
        *p = Luma([128]);
    }
    let view = ImageView::from(&img);
    let found = edge_cascade().detect(&view, view.bounds().unwrap()).unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_haar_threshold_multiplier_controls_stage() {
    let img = edge_pattern(64, 64, (16, 20));
    let view = ImageView::from(&img);
    // 100 < 2.5 * 50: the only matching window now fails its stage.
    let strict = edge_cascade()
        .with_params(ScanParams::default().with_threshold(2.5))
        .unwrap();
    assert!(strict.detect(&view, view.bounds().unwrap()).unwrap().is_empty());
}

#[test]
fn test_haar_detection_is_deterministic() {
    let mut img = edge_pattern(96, 80, (16, 20));
    for y in 40..64 {
        for x in 60..72 {
            img.put_pixel(x, y, Luma([200]));
        }
    }
    let view = ImageView::from(&img);
    let cascade = edge_cascade()
        .with_params(ScanParams::default().with_threshold(-10.0).with_min_std_dev(10))
        .unwrap();
    let first = cascade.detect_raw(&view, view.bounds().unwrap()).unwrap();
    let second = cascade.detect_raw(&view, view.bounds().unwrap()).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_haar_zero_stage_cascade_is_a_configuration_error() {
    let empty = HaarCascade::from_parts(CascadeParts {
        window: (24, 24),
        ..Default::default()
    })
    .unwrap();
    let img = GrayImage::new(32, 32);
    let view = ImageView::from(&img);
    assert!(matches!(
        empty.detect(&view, view.bounds().unwrap()),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_haar_invalid_region() {
    let img = GrayImage::new(32, 32);
    let view = ImageView::from(&img);
    let cascade = edge_cascade();
    for roi in [
        Rect::new(0, 0, 0, 10),
        Rect::new(10, 10, 30, 10),
        Rect::new(-2, 0, 10, 10),
    ] {
        assert!(matches!(
            cascade.detect(&view, roi),
            Err(Error::InvalidRegion(_))
        ));
    }
}

#[test]
fn test_haar_region_smaller_than_window_is_empty() {
    let img = GrayImage::new(32, 32);
    let view = ImageView::from(&img);
    let found = edge_cascade().detect(&view, Rect::new(0, 0, 20, 32)).unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_haar_rejects_color_input() {
    let buf = vec![0u8; 32 * 32 * 2];
    let view = ImageView::new(32, 32, cv_core::PixelFormat::Rgb565, &buf).unwrap();
    assert!(matches!(
        edge_cascade().detect(&view, Rect::new(0, 0, 32, 32)),
        Err(Error::UnsupportedFormat(_))
    ));
}

#[test]
fn test_haar_cancellation_between_scales() {
    let img = edge_pattern(64, 64, (16, 20));
    let view = ImageView::from(&img);
    let cancel = AtomicBool::new(true);
    assert!(matches!(
        edge_cascade().detect_cancellable(&view, view.bounds().unwrap(), &cancel),
        Err(Error::Cancelled)
    ));

    let go = AtomicBool::new(false);
    let found = edge_cascade()
        .detect_cancellable(&view, view.bounds().unwrap(), &go)
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn test_haar_batch_shares_cascade() {
    let hit = edge_pattern(64, 64, (16, 20));
    let miss = GrayImage::new(64, 64);
    let frames = [ImageView::from(&hit), ImageView::from(&miss), ImageView::from(&hit)];
    let results = edge_cascade().detect_batch(&frames);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap(), &vec![Rect::new(16, 20, 24, 24)]);
    assert!(results[1].as_ref().unwrap().is_empty());
    assert_eq!(results[2].as_ref().unwrap().len(), 1);
}

#[test]
fn test_haar_detects_pattern_on_downscaled_level() {
    // 36 = 24 * 1.5: the pattern only fills the window on the second level.
    let img = edge_square(96, 96, (30, 30), 36);
    let view = ImageView::from(&img);
    let raw = edge_cascade()
        .detect_raw(&view, view.bounds().unwrap())
        .unwrap();
    assert!(
        raw.contains(&Detection {
            rect: Rect::new(30, 30, 36, 36),
            scale: 1.5
        }),
        "{:?}",
        raw
    );
    assert!(raw.iter().all(|d| d.scale == 1.0 || d.scale == 1.5));
}

#[test]
fn test_haar_downscaled_hit_maps_through_roi_offset() {
    let img = edge_square(96, 96, (30, 30), 36);
    let view = ImageView::from(&img);
    let raw = edge_cascade()
        .detect_raw(&view, Rect::new(6, 6, 90, 90))
        .unwrap();
    assert!(
        raw.contains(&Detection {
            rect: Rect::new(30, 30, 36, 36),
            scale: 1.5
        }),
        "{:?}",
        raw
    );
}

#[test]
fn test_haar_visits_every_grid_position() {
    // No contrast floor and a negative multiplier: every window is accepted.
    let img = GrayImage::new(64, 64);
    let view = ImageView::from(&img);
    let cascade = edge_cascade()
        .with_params(ScanParams::default().with_threshold(-10.0).with_min_std_dev(0))
        .unwrap();
    let raw = cascade.detect_raw(&view, view.bounds().unwrap()).unwrap();

    // 64 -> 42 -> 28 pixels per side at factors 1, 1.5, 2.25.
    let per_level = |scale: f32| raw.iter().filter(|d| d.scale == scale).count();
    assert_eq!(per_level(1.0), 21 * 21);
    assert_eq!(per_level(1.5), 10 * 10);
    assert_eq!(per_level(2.25), 3 * 3);
    assert_eq!(raw.len(), 441 + 100 + 9);
    assert!(raw.capacity() >= raw.len());
}
