//! Cascade model and its binary file format.
//!
//! All multi-byte fields are little-endian:
//!
//! ```text
//! window_w: i32, window_h: i32, n_stages: i32
//! stage_feature_counts: u8  x n_stages
//! stage_thresholds:     i16 x n_stages
//! feature_thresholds:   i16 x F        F = sum(stage_feature_counts)
//! alpha1:               i16 x F
//! alpha2:               i16 x F
//! feature_rect_counts:  u8  x F
//! rect_weights:         i8  x R        R = sum(feature_rect_counts)
//! rects:                i8  x 4R       (x, y, w, h) per rectangle
//! ```

use super::params::ScanParams;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use cv_core::{try_alloc_zeroed, Error, Result};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::ops::Range;
use std::path::Path;

/// One rejection checkpoint: a contiguous run of features and the score the
/// run has to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeStage {
    pub threshold: i16,
    pub first_feature: usize,
    pub feature_count: usize,
}

impl CascadeStage {
    pub fn features(&self) -> Range<usize> {
        self.first_feature..self.first_feature + self.feature_count
    }
}

/// Two-branch weak classifier over a few weighted rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaarFeature {
    /// Fixed-point (x4096) threshold, scaled by the window deviation at run time.
    pub threshold: i16,
    /// Vote when the weighted sum is below the threshold.
    pub alpha1: i16,
    /// Vote when the weighted sum is at or above the threshold.
    pub alpha2: i16,
    pub first_rect: usize,
    pub rect_count: usize,
}

impl HaarFeature {
    pub fn rects(&self) -> Range<usize> {
        self.first_rect..self.first_rect + self.rect_count
    }
}

/// Rectangle in base-window coordinates with its integer weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedRect {
    pub x: i8,
    pub y: i8,
    pub w: i8,
    pub h: i8,
    pub weight: i8,
}

/// Flat arrays in file order, used to build or dump a [`HaarCascade`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeParts {
    pub window: (i32, i32),
    pub stage_feature_counts: Vec<u8>,
    pub stage_thresholds: Vec<i16>,
    pub feature_thresholds: Vec<i16>,
    pub alpha1: Vec<i16>,
    pub alpha2: Vec<i16>,
    pub feature_rect_counts: Vec<u8>,
    pub rect_weights: Vec<i8>,
    pub rects: Vec<[i8; 4]>,
}

/// Viola-Jones cascade classifier.
///
/// Built once from a file or from [`CascadeParts`], immutable afterwards and safe
/// to share between detection runs.
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    pub(crate) size: (u32, u32),
    pub(crate) stages: Vec<CascadeStage>,
    pub(crate) features: Vec<HaarFeature>,
    pub(crate) rects: Vec<WeightedRect>,
    pub(crate) params: ScanParams,
}

/// Largest squared 8-bit pixel; a window's sum of squares must stay in `u32`.
const MAX_SQUARE: u64 = 255 * 255;

fn corrupt(msg: impl Into<String>) -> Error {
    Error::CorruptCascade(msg.into())
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(corrupt(format!(
            "{what}: {actual} entries, counts declare {expected}"
        )));
    }
    Ok(())
}

impl HaarCascade {
    /// Reads and validates a cascade file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let cascade = Self::parse(&bytes).inspect_err(|e| {
            tracing::warn!("rejected cascade {}: {}", path.display(), e);
        })?;
        tracing::debug!(
            path = %path.display(),
            window_w = cascade.size.0,
            window_h = cascade.size.1,
            stages = cascade.stages.len(),
            features = cascade.features.len(),
            rects = cascade.rects.len(),
            "loaded cascade"
        );
        Ok(cascade)
    }

    pub fn read_from(mut reader: impl Read) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse(&bytes)
    }

    /// Parses the binary layout. Every declared count is checked against the
    /// bytes actually remaining before anything is allocated, and trailing bytes
    /// are rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let window = (read_header(&mut cur)?, read_header(&mut cur)?);
        let n_stages = read_header(&mut cur)?;
        let n_stages = usize::try_from(n_stages)
            .map_err(|_| corrupt(format!("negative stage count {n_stages}")))?;

        let stage_feature_counts: Vec<u8> = read_section(&mut cur, n_stages, 1, |c, b| {
            c.read_exact(b)
        })?;
        let stage_thresholds: Vec<i16> = read_section(&mut cur, n_stages, 2, |c, b| {
            c.read_i16_into::<LittleEndian>(b)
        })?;

        let n_features: usize = stage_feature_counts.iter().map(|&n| n as usize).sum();
        let feature_thresholds: Vec<i16> = read_section(&mut cur, n_features, 2, |c, b| {
            c.read_i16_into::<LittleEndian>(b)
        })?;
        let alpha1: Vec<i16> = read_section(&mut cur, n_features, 2, |c, b| {
            c.read_i16_into::<LittleEndian>(b)
        })?;
        let alpha2: Vec<i16> = read_section(&mut cur, n_features, 2, |c, b| {
            c.read_i16_into::<LittleEndian>(b)
        })?;
        let feature_rect_counts: Vec<u8> = read_section(&mut cur, n_features, 1, |c, b| {
            c.read_exact(b)
        })?;

        let n_rects: usize = feature_rect_counts.iter().map(|&n| n as usize).sum();
        let rect_weights: Vec<i8> = read_section(&mut cur, n_rects, 1, |c, b| c.read_i8_into(b))?;
        let flat: Vec<i8> = read_section(&mut cur, n_rects * 4, 1, |c, b| c.read_i8_into(b))?;

        let trailing = bytes.len() - cur.position() as usize;
        if trailing != 0 {
            return Err(corrupt(format!("{trailing} trailing bytes after rectangle table")));
        }

        Self::from_parts(CascadeParts {
            window,
            stage_feature_counts,
            stage_thresholds,
            feature_thresholds,
            alpha1,
            alpha2,
            feature_rect_counts,
            rect_weights,
            rects: flat
                .chunks_exact(4)
                .map(|r| [r[0], r[1], r[2], r[3]])
                .collect(),
        })
    }

    /// Validates flat arrays and builds the cascade with default scan parameters.
    ///
    /// The per-stage feature counts must add up to the feature arrays' length,
    /// the per-feature rectangle counts to the rectangle tables' length, and every
    /// rectangle must have a positive size inside the base window. The window
    /// area is capped so its sum of squared pixels fits in 32 bits (257 x 257).
    pub fn from_parts(parts: CascadeParts) -> Result<Self> {
        let (win_w, win_h) = parts.window;
        if win_w <= 0 || win_h <= 0 || win_w > i16::MAX as i32 || win_h > i16::MAX as i32 {
            return Err(corrupt(format!("invalid window size {win_w}x{win_h}")));
        }
        if MAX_SQUARE * win_w as u64 * win_h as u64 > u32::MAX as u64 {
            return Err(corrupt(format!(
                "window {win_w}x{win_h} overflows the 32-bit sum of squares"
            )));
        }

        let n_stages = parts.stage_feature_counts.len();
        check_len("stage thresholds", parts.stage_thresholds.len(), n_stages)?;

        let n_features: usize = parts.stage_feature_counts.iter().map(|&n| n as usize).sum();
        check_len("feature thresholds", parts.feature_thresholds.len(), n_features)?;
        check_len("alpha1", parts.alpha1.len(), n_features)?;
        check_len("alpha2", parts.alpha2.len(), n_features)?;
        check_len("feature rectangle counts", parts.feature_rect_counts.len(), n_features)?;

        let n_rects: usize = parts.feature_rect_counts.iter().map(|&n| n as usize).sum();
        check_len("rectangle weights", parts.rect_weights.len(), n_rects)?;
        check_len("rectangles", parts.rects.len(), n_rects)?;

        let mut rects = Vec::with_capacity(n_rects);
        for (i, (&[x, y, w, h], &weight)) in parts.rects.iter().zip(&parts.rect_weights).enumerate()
        {
            let inside = x >= 0
                && y >= 0
                && w > 0
                && h > 0
                && x as i32 + w as i32 <= win_w
                && y as i32 + h as i32 <= win_h;
            if !inside {
                return Err(corrupt(format!(
                    "rectangle {i} ({x}, {y}, {w}, {h}) outside {win_w}x{win_h} window"
                )));
            }
            rects.push(WeightedRect { x, y, w, h, weight });
        }

        let mut features = Vec::with_capacity(n_features);
        let mut first_rect = 0;
        for i in 0..n_features {
            let rect_count = parts.feature_rect_counts[i] as usize;
            features.push(HaarFeature {
                threshold: parts.feature_thresholds[i],
                alpha1: parts.alpha1[i],
                alpha2: parts.alpha2[i],
                first_rect,
                rect_count,
            });
            first_rect += rect_count;
        }

        let mut stages = Vec::with_capacity(n_stages);
        let mut first_feature = 0;
        for (&count, &threshold) in parts.stage_feature_counts.iter().zip(&parts.stage_thresholds) {
            stages.push(CascadeStage {
                threshold,
                first_feature,
                feature_count: count as usize,
            });
            first_feature += count as usize;
        }

        Ok(Self {
            size: (win_w as u32, win_h as u32),
            stages,
            features,
            rects,
            params: ScanParams::default(),
        })
    }

    /// Attaches scan parameters, consuming the cascade.
    pub fn with_params(mut self, params: ScanParams) -> Result<Self> {
        params.validate()?;
        self.params = params;
        Ok(self)
    }

    /// Flat arrays in file order.
    pub fn to_parts(&self) -> CascadeParts {
        CascadeParts {
            window: (self.size.0 as i32, self.size.1 as i32),
            stage_feature_counts: self.stages.iter().map(|s| s.feature_count as u8).collect(),
            stage_thresholds: self.stages.iter().map(|s| s.threshold).collect(),
            feature_thresholds: self.features.iter().map(|f| f.threshold).collect(),
            alpha1: self.features.iter().map(|f| f.alpha1).collect(),
            alpha2: self.features.iter().map(|f| f.alpha2).collect(),
            feature_rect_counts: self.features.iter().map(|f| f.rect_count as u8).collect(),
            rect_weights: self.rects.iter().map(|r| r.weight).collect(),
            rects: self.rects.iter().map(|r| [r.x, r.y, r.w, r.h]).collect(),
        }
    }

    pub fn write_to(&self, mut w: impl Write) -> Result<()> {
        let parts = self.to_parts();
        w.write_i32::<LittleEndian>(parts.window.0)?;
        w.write_i32::<LittleEndian>(parts.window.1)?;
        w.write_i32::<LittleEndian>(parts.stage_feature_counts.len() as i32)?;
        w.write_all(&parts.stage_feature_counts)?;
        for section in [
            &parts.stage_thresholds,
            &parts.feature_thresholds,
            &parts.alpha1,
            &parts.alpha2,
        ] {
            for &v in section {
                w.write_i16::<LittleEndian>(v)?;
            }
        }
        w.write_all(&parts.feature_rect_counts)?;
        for &v in &parts.rect_weights {
            w.write_i8(v)?;
        }
        for r in &parts.rects {
            for &v in r {
                w.write_i8(v)?;
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Base detection window `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn stages(&self) -> &[CascadeStage] {
        &self.stages
    }

    pub fn features(&self) -> &[HaarFeature] {
        &self.features
    }

    pub fn rects(&self) -> &[WeightedRect] {
        &self.rects
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }
}

fn read_header(cur: &mut Cursor<&[u8]>) -> Result<i32> {
    cur.read_i32::<LittleEndian>()
        .map_err(|_| corrupt("truncated header"))
}

fn read_section<T: Clone + Default>(
    cur: &mut Cursor<&[u8]>,
    len: usize,
    elem_size: usize,
    read: impl FnOnce(&mut Cursor<&[u8]>, &mut [T]) -> std::io::Result<()>,
) -> Result<Vec<T>> {
    let remaining = cur.get_ref().len() - cur.position() as usize;
    let needed = len
        .checked_mul(elem_size)
        .ok_or_else(|| corrupt("section size overflow"))?;
    if needed > remaining {
        return Err(corrupt(format!(
            "truncated: section needs {needed} bytes, {remaining} left"
        )));
    }
    let mut buf = try_alloc_zeroed::<T>(len)?;
    read(cur, &mut buf).map_err(|e| corrupt(format!("unreadable section: {e}")))?;
    Ok(buf)
}
