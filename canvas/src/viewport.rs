#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

/// A point in either client (CSS pixel) or fractional canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Size of the drawing area in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Map a fractional point to pixels.
    #[must_use]
    pub fn to_px(&self, fraction: Point) -> Point {
        Point { x: fraction.x * self.width, y: fraction.y * self.height }
    }

    /// Half the larger side: the radius a ripple reaches at phase 1.
    #[must_use]
    pub fn max_ripple_radius(&self) -> f64 {
        self.width.max(self.height) / 2.0
    }
}

/// The canvas element's client rectangle, as measured by the host.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Resolve client coordinates to fractional canvas coordinates.
    ///
    /// A zero-sized side is treated as one pixel wide.
    #[must_use]
    pub fn to_fraction(&self, client: Point) -> Point {
        let w = if self.width == 0.0 { 1.0 } else { self.width };
        let h = if self.height == 0.0 { 1.0 } else { self.height };
        Point { x: (client.x - self.left) / w, y: (client.y - self.top) / h }
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds { width: self.width, height: self.height }
    }
}
