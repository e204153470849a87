/// Axis-aligned rectangle in pixel coordinates.
///
/// Coordinates are signed 16-bit to match the fixed-width detection output of
/// embedded targets; width and height are expected to be non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub w: i16,
    pub h: i16,
}

impl Rect {
    pub fn new(x: i16, y: i16, w: i16, h: i16) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(w: i16, h: i16) -> Self {
        Self { x: 0, y: 0, w, h }
    }

    /// Builds a rectangle from wide integers, failing when any field does not
    /// fit in 16 bits or the size is negative.
    pub fn try_from_i32(x: i32, y: i32, w: i32, h: i32) -> Option<Self> {
        if w < 0 || h < 0 {
            return None;
        }
        Some(Self {
            x: i16::try_from(x).ok()?,
            y: i16::try_from(y).ok()?,
            w: i16::try_from(w).ok()?,
            h: i16::try_from(h).ok()?,
        })
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x as i32 + self.w as i32
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y as i32 + self.h as i32
    }

    pub fn area(&self) -> i32 {
        self.w.max(0) as i32 * self.h.max(0) as i32
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x as i32 && y >= self.y as i32 && x < self.right() && y < self.bottom()
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Strict overlap test: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (self.x as i32) < other.right()
            && (self.y as i32) < other.bottom()
            && self.right() > other.x as i32
            && self.bottom() > other.y as i32
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect::try_from_i32(x as i32, y as i32, right - x as i32, bottom - y as i32)
    }

    /// Smallest rectangle covering both inputs.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect {
            x,
            y,
            w: (right - x as i32).min(i16::MAX as i32) as i16,
            h: (bottom - y as i32).min(i16::MAX as i32) as i16,
        }
    }

    /// Clips the rectangle to a `width` x `height` image, returning `None` when
    /// nothing of it remains visible.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Rect> {
        let bounds = Rect::try_from_i32(
            0,
            0,
            width.min(i16::MAX as u32) as i32,
            height.min(i16::MAX as u32) as i32,
        )?;
        self.intersection(&bounds)
    }
}
