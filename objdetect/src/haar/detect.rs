//! Multi-scale sliding-window evaluation of a [`HaarCascade`].
//!
//! Instead of growing the detection window, each pyramid level resamples the
//! region of interest down by the current factor and slides the fixed base window
//! over it. Two moving-window integrals (sum and sum of squares) cover exactly one
//! window height; they are shifted down one step at a time, so the per-position
//! work is a handful of table lookups.

use super::cascade::{HaarCascade, HaarFeature};
use super::merge::merge;
use cv_core::{try_alloc_capacity, try_reserve_additional, Error, ImageView, Rect, Result};
use cv_imgproc::{compute_pair, shift_pair, Moment, MovingWindowIntegral};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Weights are stored as small integers; feature sums are carried in the same
/// x4096 fixed point as the feature thresholds.
const WEIGHT_SHIFT: u32 = 12;

/// A window that passed every stage, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub rect: Rect,
    /// Pyramid factor at which the window fired.
    pub scale: f32,
}

/// Integral buffers owned by one detection run.
struct ScanBuffers {
    sum: MovingWindowIntegral,
    ssq: MovingWindowIntegral,
}

impl HaarCascade {
    /// Detects objects inside `roi` and merges overlapping hits.
    pub fn detect(&self, image: &ImageView<'_>, roi: Rect) -> Result<Vec<Rect>> {
        let raw = self.scan(image, roi, None)?;
        Ok(merge(&raw, self.params.merge))
    }

    /// Same as [`detect`](Self::detect), but gives up with [`Error::Cancelled`]
    /// once `cancel` is set. The flag is polled before every pyramid level.
    pub fn detect_cancellable(
        &self,
        image: &ImageView<'_>,
        roi: Rect,
        cancel: &AtomicBool,
    ) -> Result<Vec<Rect>> {
        let raw = self.scan(image, roi, Some(cancel))?;
        Ok(merge(&raw, self.params.merge))
    }

    /// Every window that passed the cascade, before merging.
    pub fn detect_raw(&self, image: &ImageView<'_>, roi: Rect) -> Result<Vec<Detection>> {
        self.scan(image, roi, None)
    }

    /// Runs independent full-frame detections on the global rayon pool. Each run
    /// is single-threaded and owns its buffers; only the cascade is shared.
    pub fn detect_batch(&self, frames: &[ImageView<'_>]) -> Vec<Result<Vec<Rect>>> {
        frames
            .par_iter()
            .map(|frame| {
                let roi = frame.bounds()?;
                self.detect(frame, roi)
            })
            .collect()
    }

    fn scan(
        &self,
        image: &ImageView<'_>,
        roi: Rect,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<Detection>> {
        if self.stages.is_empty() || self.features.is_empty() {
            return Err(Error::Configuration(format!(
                "cascade has {} stages and {} features",
                self.stages.len(),
                self.features.len()
            )));
        }
        self.params.validate()?;
        image.require_grayscale()?;
        image.check_region(&roi)?;

        let (win_w, win_h) = (self.size.0 as usize, self.size.1 as usize);
        let mut detections = try_alloc_capacity::<Detection>(16)?;
        if (roi.w as usize) < win_w || (roi.h as usize) < win_h {
            return Ok(detections);
        }

        let mut buffers = ScanBuffers {
            sum: MovingWindowIntegral::new(Moment::Sum, roi.w as usize, win_h)?,
            ssq: MovingWindowIntegral::new(Moment::SumSquared, roi.w as usize, win_h)?,
        };

        let mut factor = 1.0f32;
        loop {
            let scaled_w = (roi.w as f32 / factor) as usize;
            let scaled_h = (roi.h as f32 / factor) as usize;
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::debug!(factor, "detection cancelled");
                return Err(Error::Cancelled);
            }

            let before = detections.len();
            self.scan_level(image, roi, factor, scaled_w, scaled_h, &mut buffers, &mut detections)?;
            tracing::debug!(
                factor,
                width = scaled_w,
                height = scaled_h,
                hits = detections.len() - before,
                "scanned pyramid level"
            );

            factor *= self.params.scale_factor;
        }

        Ok(detections)
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_level(
        &self,
        image: &ImageView<'_>,
        roi: Rect,
        factor: f32,
        scaled_w: usize,
        scaled_h: usize,
        buffers: &mut ScanBuffers,
        detections: &mut Vec<Detection>,
    ) -> Result<()> {
        let (win_w, win_h) = (self.size.0 as usize, self.size.1 as usize);
        let step = self.params.step as usize;
        let ScanBuffers { sum, ssq } = buffers;

        sum.rescale(roi, scaled_w, scaled_h)?;
        ssq.rescale(roi, scaled_w, scaled_h)?;
        compute_pair(sum, ssq, image)?;

        let max_x = scaled_w - win_w;
        let max_y = scaled_h - win_h;
        // Room for every position of the level, so accepting a window never allocates.
        try_reserve_additional(detections, level_positions(max_x, max_y, step))?;

        let mut y = 0;
        loop {
            for x in (0..=max_x).step_by(step) {
                if self.classify(sum, ssq, x)? {
                    let rect = map_to_image(x, y, factor, roi, self.size)?;
                    tracing::trace!(?rect, factor, "window accepted");
                    detections.push(Detection {
                        rect,
                        scale: factor,
                    });
                }
            }
            if y + step > max_y {
                break;
            }
            shift_pair(sum, ssq, image, step)?;
            y += step;
        }
        Ok(())
    }

    /// Runs the cascade on the window at column `x` of the current rows.
    fn classify(
        &self,
        sum: &MovingWindowIntegral,
        ssq: &MovingWindowIntegral,
        x: usize,
    ) -> Result<bool> {
        let (win_w, win_h) = (self.size.0 as usize, self.size.1 as usize);
        let n = (win_w * win_h) as i64;
        let s = sum.lookup(x, 0, win_w, win_h)?;
        let sq = ssq.lookup(x, 0, win_w, win_h)?;

        let mean = s / n;
        let variance = sq / n - mean * mean;
        let floor = self.params.min_std_dev as i64;
        if variance < floor * floor {
            return Ok(false);
        }

        // n * sigma, so feature sums need no division by the window area.
        let norm = ((sq * n - s * s).max(0) as f64).sqrt() as i64;

        for stage in &self.stages {
            let mut stage_sum = 0i32;
            for feature in &self.features[stage.features()] {
                stage_sum += self.vote(sum, feature, x, norm)? as i32;
            }
            if (stage_sum as f32) < self.params.threshold * stage.threshold as f32 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    #[inline]
    fn vote(
        &self,
        sum: &MovingWindowIntegral,
        feature: &HaarFeature,
        x: usize,
        norm: i64,
    ) -> Result<i16> {
        let threshold = feature.threshold as i64 * norm;
        let mut weighted = 0i64;
        for r in &self.rects[feature.rects()] {
            let area = sum.lookup(x + r.x as usize, r.y as usize, r.w as usize, r.h as usize)?;
            weighted += area * ((r.weight as i64) << WEIGHT_SHIFT);
        }
        Ok(if weighted >= threshold {
            feature.alpha2
        } else {
            feature.alpha1
        })
    }
}

/// Window positions visited on a level whose last valid origin is `(max_x, max_y)`.
fn level_positions(max_x: usize, max_y: usize, step: usize) -> usize {
    (max_x / step + 1) * (max_y / step + 1)
}

fn map_to_image(x: usize, y: usize, factor: f32, roi: Rect, size: (u32, u32)) -> Result<Rect> {
    let rx = (x as f32 * factor) as i32 + roi.x as i32;
    let ry = (y as f32 * factor) as i32 + roi.y as i32;
    let rw = (size.0 as f32 * factor) as i32;
    let rh = (size.1 as f32 * factor) as i32;
    Rect::try_from_i32(rx, ry, rw, rh).ok_or_else(|| {
        Error::InvalidRegion(format!(
            "detection ({rx}, {ry}, {rw}, {rh}) exceeds 16-bit coordinates"
        ))
    })
}

/// Detects objects of the cascade's class inside `roi` of a grayscale image,
/// using the cascade's scan parameters.
pub fn detect_objects(image: &ImageView<'_>, cascade: &HaarCascade, roi: Rect) -> Result<Vec<Rect>> {
    cascade.detect(image, roi)
}
