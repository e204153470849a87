//! Static integral images.
//!
//! The accumulator carries an extra zero row and column, so entry `(r + 1, c + 1)`
//! holds the sum of every source pixel with row `<= r` and column `<= c`:
//! `I[r][c] = I[r-1][c] + I[r][c-1] - I[r-1][c-1] + p[r][c]`.
//!
//! Arithmetic wraps modulo 2^32. A rectangle sum obtained through the four-corner
//! formula is therefore exact whenever the true sum fits in 32 bits, even if the
//! running total over the whole image does not (squared integrals of large frames).

use cv_core::{try_alloc_zeroed, Error, ImageView, Rect, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegralImage {
    width: usize,
    height: usize,
    data: Vec<u32>,
}

impl IntegralImage {
    /// Integral of pixel values.
    pub fn new(src: &ImageView<'_>) -> Result<Self> {
        src.require_grayscale()?;
        Self::accumulate(src, src.width() as usize, src.height() as usize, |p| p as u32)
    }

    /// Integral of squared pixel values.
    pub fn squared(src: &ImageView<'_>) -> Result<Self> {
        src.require_grayscale()?;
        Self::accumulate(src, src.width() as usize, src.height() as usize, |p| {
            let p = p as u32;
            p * p
        })
    }

    /// Integral of `src` resampled to `width` x `height` by nearest neighbour.
    pub fn scaled(src: &ImageView<'_>, width: u32, height: u32) -> Result<Self> {
        src.require_grayscale()?;
        if width == 0 || height == 0 || src.width() == 0 || src.height() == 0 {
            return Err(Error::InvalidRegion(format!(
                "cannot scale {}x{} image to {}x{}",
                src.width(),
                src.height(),
                width,
                height
            )));
        }
        Self::accumulate(src, width as usize, height as usize, |p| p as u32)
    }

    fn accumulate(
        src: &ImageView<'_>,
        width: usize,
        height: usize,
        map: impl Fn(u8) -> u32,
    ) -> Result<Self> {
        let stride = width + 1;
        let mut data = try_alloc_zeroed::<u32>(stride * (height + 1))?;
        let (src_w, src_h) = (src.width() as usize, src.height() as usize);

        for y in 0..height {
            let sy = y * src_h / height;
            let src_row = src.row(sy as u32);
            let mut row_sum = 0u32;
            for x in 0..width {
                let sx = x * src_w / width;
                row_sum = row_sum.wrapping_add(map(src_row[sx]));
                let idx = (y + 1) * stride + (x + 1);
                data[idx] = data[idx - stride].wrapping_add(row_sum);
            }
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Inclusive accumulator value: the sum over rows `0..=row`, columns `0..=col`.
    pub fn value(&self, row: usize, col: usize) -> Option<u32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(self.data[(row + 1) * (self.width + 1) + col + 1])
    }

    /// Sum over `rect` by four-corner inclusion-exclusion.
    pub fn rect_sum(&self, rect: Rect) -> Result<u32> {
        if rect.x < 0
            || rect.y < 0
            || rect.w < 0
            || rect.h < 0
            || rect.right() as usize > self.width
            || rect.bottom() as usize > self.height
        {
            return Err(Error::OutOfBounds {
                x: rect.x as i32,
                y: rect.y as i32,
                w: rect.w as i32,
                h: rect.h as i32,
                width: self.width,
                height: self.height,
            });
        }

        let stride = self.width + 1;
        let x0 = rect.x as usize;
        let y0 = rect.y as usize;
        let x1 = rect.right() as usize;
        let y1 = rect.bottom() as usize;
        let d = &self.data;
        Ok(d[y1 * stride + x1]
            .wrapping_sub(d[y0 * stride + x1])
            .wrapping_sub(d[y1 * stride + x0])
            .wrapping_add(d[y0 * stride + x0]))
    }
}
