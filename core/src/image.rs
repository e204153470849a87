use crate::{Error, Rect, Result};
use image::GrayImage;

/// Pixel layout of an [`ImageView`], mirroring the `bpp` tag used on
/// embedded camera pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit luminance, `bpp == 1`.
    Grayscale,
    /// Packed 16-bit RGB565, `bpp == 2`.
    Rgb565,
    /// Compressed or otherwise externally decoded payload, `bpp >= 3`.
    Encoded,
}

impl PixelFormat {
    pub fn from_bpp(bpp: u32) -> Result<Self> {
        match bpp {
            0 => Err(Error::UnsupportedFormat("bpp must be >= 1".into())),
            1 => Ok(PixelFormat::Grayscale),
            2 => Ok(PixelFormat::Rgb565),
            _ => Ok(PixelFormat::Encoded),
        }
    }

    /// Bytes per pixel for raw formats, `None` for encoded payloads.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Grayscale => Some(1),
            PixelFormat::Rgb565 => Some(2),
            PixelFormat::Encoded => None,
        }
    }
}

/// Borrowed, non-owning view over a contiguous pixel buffer.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: &'a [u8],
}

impl<'a> ImageView<'a> {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: &'a [u8]) -> Result<Self> {
        if let Some(bpp) = format.bytes_per_pixel() {
            let expected = width as usize * height as usize * bpp;
            if data.len() != expected {
                return Err(Error::UnsupportedFormat(format!(
                    "{}x{} {:?} image needs {} bytes, buffer has {}",
                    width,
                    height,
                    format,
                    expected,
                    data.len()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn gray(width: u32, height: u32, data: &'a [u8]) -> Result<Self> {
        Self::new(width, height, PixelFormat::Grayscale, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    pub fn require_grayscale(&self) -> Result<()> {
        if self.format != PixelFormat::Grayscale {
            return Err(Error::UnsupportedFormat(format!(
                "expected grayscale input, got {:?}; convert upstream",
                self.format
            )));
        }
        Ok(())
    }

    /// Grey level at `(x, y)`. Only meaningful for grayscale views; panics on
    /// out-of-range coordinates like slice indexing does.
    #[inline]
    pub fn pixel_at(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// One row of a grayscale view.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.data[start..start + w]
    }

    /// Whole-image rectangle, failing for images too large for 16-bit coordinates.
    pub fn bounds(&self) -> Result<Rect> {
        Rect::try_from_i32(0, 0, self.width as i32, self.height as i32).ok_or_else(|| {
            Error::InvalidRegion(format!(
                "{}x{} image exceeds 16-bit rectangle range",
                self.width, self.height
            ))
        })
    }

    /// Rejects empty regions and regions not fully inside the image.
    pub fn check_region(&self, roi: &Rect) -> Result<()> {
        if roi.is_empty() {
            return Err(Error::InvalidRegion(format!("empty region {:?}", roi)));
        }
        if roi.x < 0
            || roi.y < 0
            || roi.right() as i64 > self.width as i64
            || roi.bottom() as i64 > self.height as i64
        {
            return Err(Error::InvalidRegion(format!(
                "region {:?} outside {}x{} image",
                roi, self.width, self.height
            )));
        }
        Ok(())
    }
}

impl<'a> From<&'a GrayImage> for ImageView<'a> {
    fn from(img: &'a GrayImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            format: PixelFormat::Grayscale,
            data: img.as_raw(),
        }
    }
}
