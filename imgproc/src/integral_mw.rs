//! Moving-window integral images.
//!
//! A [`MovingWindowIntegral`] keeps only `window_rows + 1` accumulator rows of the
//! integral of a region of interest resampled to `width` x `height`. Row `r` of the
//! buffer holds integral row `y_offset + r`, i.e. the sum over resampled rows
//! `0..y_offset + r` and columns `0..c` at column `c`. Sliding the window down by `n`
//! rows recycles the `n` oldest row buffers and recomputes only the newly exposed
//! rows from the row above them, so a scan costs O(width) per row instead of
//! O(width * height) per window.
//!
//! Resampling uses the 16.16 fixed-point ratio `((roi_len << 16) / target) + 1`,
//! expanded once per rescale into a column map.

use cv_core::{try_alloc_capacity, try_alloc_zeroed, Error, ImageView, Rect, Result};

const FIXED_ONE: u32 = 1 << 16;

/// Which pixel moment an accumulator integrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    Sum,
    SumSquared,
}

impl Moment {
    #[inline]
    fn apply(self, p: u8) -> u32 {
        let p = p as u32;
        match self {
            Moment::Sum => p,
            Moment::SumSquared => p * p,
        }
    }
}

#[derive(Debug)]
pub struct MovingWindowIntegral {
    moment: Moment,
    max_width: usize,
    width: usize,
    height: usize,
    rows: usize,
    y_offs: usize,
    x_ratio: u32,
    y_ratio: u32,
    roi: Rect,
    x_map: Vec<u32>,
    data: Vec<Vec<u32>>,
    swap: Vec<Vec<u32>>,
}

impl MovingWindowIntegral {
    /// Allocates every buffer the window will ever need: `window_rows + 1` rows of
    /// `max_width + 1` accumulators, the swap row table and the column map.
    /// Later rescales and shifts do not allocate.
    pub fn new(moment: Moment, max_width: usize, window_rows: usize) -> Result<Self> {
        if max_width == 0 || window_rows == 0 {
            return Err(Error::InvalidRegion(format!(
                "moving window needs a positive size, got {}x{}",
                max_width, window_rows
            )));
        }
        let rows = window_rows + 1;
        tracing::debug!(?moment, max_width, rows, "allocating moving-window integral");
        let mut data = try_alloc_capacity::<Vec<u32>>(rows)?;
        for _ in 0..rows {
            data.push(try_alloc_zeroed::<u32>(max_width + 1)?);
        }

        Ok(Self {
            moment,
            max_width,
            width: 0,
            height: 0,
            rows,
            y_offs: 0,
            x_ratio: FIXED_ONE + 1,
            y_ratio: FIXED_ONE + 1,
            roi: Rect::default(),
            x_map: try_alloc_zeroed::<u32>(max_width)?,
            data,
            swap: try_alloc_capacity::<Vec<u32>>(rows)?,
        })
    }

    /// Resamples `roi` to a `width` x `height` grid and rewinds to the top.
    /// The accumulator contents are stale until [`compute`](Self::compute) runs.
    pub fn rescale(&mut self, roi: Rect, width: usize, height: usize) -> Result<()> {
        if roi.is_empty() || roi.x < 0 || roi.y < 0 {
            return Err(Error::InvalidRegion(format!("invalid region {:?}", roi)));
        }
        if width == 0 || width > self.max_width {
            return Err(Error::InvalidRegion(format!(
                "target width {} outside 1..={}",
                width, self.max_width
            )));
        }
        if height < self.rows - 1 {
            return Err(Error::InvalidRegion(format!(
                "target height {} smaller than the {}-row window",
                height,
                self.rows - 1
            )));
        }

        self.width = width;
        self.height = height;
        self.roi = roi;
        self.y_offs = 0;
        self.x_ratio = fixed_ratio(roi.w as u32, width as u32);
        self.y_ratio = fixed_ratio(roi.h as u32, height as u32);

        let last_col = roi.w as u64 - 1;
        for (c, sx) in self.x_map[..width].iter_mut().enumerate() {
            let col = ((c as u64 * self.x_ratio as u64) >> 16).min(last_col);
            *sx = roi.x as u32 + col as u32;
        }
        tracing::trace!(?roi, width, height, x_ratio = self.x_ratio, y_ratio = self.y_ratio, "rescaled");
        Ok(())
    }

    /// Fills the whole window from the top of the resampled region.
    pub fn compute(&mut self, src: &ImageView<'_>) -> Result<()> {
        self.check_source(src)?;
        self.y_offs = 0;

        let xs = &self.x_map[..self.width];
        self.data[0][..=self.width].fill(0);
        for r in 1..self.rows {
            let sy = source_row(self.roi, self.y_ratio, r - 1);
            let (head, tail) = self.data.split_at_mut(r);
            accumulate_row(self.moment, xs, src.row(sy), &head[r - 1], &mut tail[0]);
        }
        Ok(())
    }

    /// Slides the window down by `n` resampled rows.
    ///
    /// The surviving rows are moved into the swap table in their new order, the
    /// rows recycled from the top are recomputed there, and only then do the two
    /// tables trade places, so `data` always holds a complete window.
    pub fn shift(&mut self, src: &ImageView<'_>, n: usize) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        if self.y_offs + n + self.rows - 1 > self.height {
            return Err(Error::OutOfBounds {
                x: 0,
                y: (self.y_offs + n) as i32,
                w: self.width as i32,
                h: (self.rows - 1) as i32,
                width: self.width,
                height: self.height,
            });
        }
        self.check_source(src)?;

        let mut remaining = n;
        while remaining > 0 {
            let k = remaining.min(self.rows - 1);
            self.rotate(src, k);
            remaining -= k;
        }
        Ok(())
    }

    fn rotate(&mut self, src: &ImageView<'_>, k: usize) {
        debug_assert!(self.swap.is_empty());
        self.swap.extend(self.data.drain(k..));
        self.swap.extend(self.data.drain(..));
        self.y_offs += k;

        let xs = &self.x_map[..self.width];
        for r in (self.rows - k)..self.rows {
            let sy = source_row(self.roi, self.y_ratio, self.y_offs + r - 1);
            let (head, tail) = self.swap.split_at_mut(r);
            accumulate_row(self.moment, xs, src.row(sy), &head[r - 1], &mut tail[0]);
        }
        std::mem::swap(&mut self.data, &mut self.swap);
    }

    /// Sum over `w` x `h` resampled pixels at `(x, y)`, with `y` relative to the
    /// top of the current window.
    #[inline]
    pub fn lookup(&self, x: usize, y: usize, w: usize, h: usize) -> Result<i64> {
        if x + w > self.width || y + h >= self.rows {
            return Err(Error::OutOfBounds {
                x: x as i32,
                y: y as i32,
                w: w as i32,
                h: h as i32,
                width: self.width,
                height: self.rows - 1,
            });
        }
        let top = &self.data[y];
        let bottom = &self.data[y + h];
        Ok(bottom[x + w]
            .wrapping_sub(bottom[x])
            .wrapping_sub(top[x + w])
            .wrapping_add(top[x]) as i64)
    }

    fn check_source(&self, src: &ImageView<'_>) -> Result<()> {
        if self.width == 0 {
            return Err(Error::InvalidRegion(
                "moving window used before rescale".into(),
            ));
        }
        src.require_grayscale()?;
        src.check_region(&self.roi)
    }

    pub fn moment(&self) -> Moment {
        self.moment
    }

    /// Current resampled width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Current resampled height.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Height of the lookup window in resampled rows.
    pub fn window_rows(&self) -> usize {
        self.rows - 1
    }

    pub fn y_offset(&self) -> usize {
        self.y_offs
    }

    /// 16.16 fixed-point source pixels per resampled pixel, `(x, y)`.
    pub fn ratios(&self) -> (u32, u32) {
        (self.x_ratio, self.y_ratio)
    }

    pub fn roi(&self) -> Rect {
        self.roi
    }

    /// Accumulator rows currently held, top to bottom.
    pub fn accumulator(&self) -> impl Iterator<Item = &[u32]> + '_ {
        self.data.iter().map(move |row| &row[..=self.width])
    }
}

/// Fills `sum` and `ssq` for the same region; both must already be rescaled alike.
pub fn compute_pair(
    sum: &mut MovingWindowIntegral,
    ssq: &mut MovingWindowIntegral,
    src: &ImageView<'_>,
) -> Result<()> {
    sum.compute(src)?;
    ssq.compute(src)
}

/// Slides a sum/sum-of-squares pair by the same amount.
pub fn shift_pair(
    sum: &mut MovingWindowIntegral,
    ssq: &mut MovingWindowIntegral,
    src: &ImageView<'_>,
    n: usize,
) -> Result<()> {
    sum.shift(src, n)?;
    ssq.shift(src, n)
}

#[inline]
fn fixed_ratio(source_len: u32, target_len: u32) -> u32 {
    ((source_len << 16) / target_len) + 1
}

#[inline]
fn source_row(roi: Rect, y_ratio: u32, resampled_row: usize) -> u32 {
    let row = ((resampled_row as u64 * y_ratio as u64) >> 16).min(roi.h as u64 - 1);
    roi.y as u32 + row as u32
}

#[inline]
fn accumulate_row(moment: Moment, xs: &[u32], src: &[u8], prev: &[u32], cur: &mut [u32]) {
    cur[0] = 0;
    let mut s = 0u32;
    for (c, &sx) in xs.iter().enumerate() {
        s = s.wrapping_add(moment.apply(src[sx as usize]));
        cur[c + 1] = prev[c + 1].wrapping_add(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: u32, h: u32) -> Vec<u8> {
        (0..w * h).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_swap_bank_is_drained_after_shift() {
        let px = ramp(16, 16);
        let view = ImageView::gray(16, 16, &px).unwrap();
        let mut mw = MovingWindowIntegral::new(Moment::Sum, 16, 4).unwrap();
        mw.rescale(Rect::new(0, 0, 16, 16), 16, 16).unwrap();
        mw.compute(&view).unwrap();

        mw.shift(&view, 3).unwrap();
        assert!(mw.swap.is_empty());
        assert_eq!(mw.data.len(), 5);
        assert!(mw.data.iter().all(|row| row.len() == 17));
        assert!(mw.swap.capacity() >= 5);
    }

    #[test]
    fn test_identity_ratio_maps_columns_one_to_one() {
        let mut mw = MovingWindowIntegral::new(Moment::Sum, 40, 2).unwrap();
        mw.rescale(Rect::new(3, 1, 40, 10), 40, 10).unwrap();
        let expected: Vec<u32> = (3..43).collect();
        assert_eq!(&mw.x_map[..40], &expected[..]);
        assert_eq!(mw.ratios(), (FIXED_ONE + 1, FIXED_ONE + 1));
    }

    #[test]
    fn test_first_row_is_zero() {
        let px = ramp(8, 8);
        let view = ImageView::gray(8, 8, &px).unwrap();
        let mut mw = MovingWindowIntegral::new(Moment::SumSquared, 8, 3).unwrap();
        mw.rescale(Rect::new(0, 0, 8, 8), 8, 8).unwrap();
        mw.compute(&view).unwrap();
        assert!(mw.accumulator().next().unwrap().iter().all(|&v| v == 0));
    }
}
