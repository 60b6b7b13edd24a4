//! Rendering seam: the drawing primitives the mirror needs.
//!
//! [`Painter`] is the only interface charges and bonds draw through. The
//! browser implementation wraps [`web_sys::CanvasRenderingContext2d`];
//! tests use [`RecordingPainter`] to assert on what would have been drawn.
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

use std::convert::Infallible;
use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use crate::color::Color;
use crate::viewport::Point;

/// One stop of a linear gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f64,
    pub color: Color,
}

/// Drawing primitives consumed by the mirror.
pub trait Painter {
    type Error;

    /// Push the context state.
    ///
    /// # Errors
    ///
    /// Backend-specific failure.
    fn save(&mut self) -> Result<(), Self::Error>;

    /// Pop the context state.
    ///
    /// # Errors
    ///
    /// Backend-specific failure.
    fn restore(&mut self) -> Result<(), Self::Error>;

    /// Fill a full circle.
    ///
    /// # Errors
    ///
    /// Backend-specific failure.
    fn fill_circle(&mut self, center: Point, radius: f64, color: Color) -> Result<(), Self::Error>;

    /// Stroke a full circle outline.
    ///
    /// # Errors
    ///
    /// Backend-specific failure.
    fn stroke_circle(&mut self, center: Point, radius: f64, color: Color, line_width: f64) -> Result<(), Self::Error>;

    /// Stroke a straight line with a linear gradient running from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Backend-specific failure.
    fn stroke_gradient_line(
        &mut self,
        from: Point,
        to: Point,
        stops: &[ColorStop],
        line_width: f64,
    ) -> Result<(), Self::Error>;
}

impl Painter for CanvasRenderingContext2d {
    type Error = JsValue;

    fn save(&mut self) -> Result<(), JsValue> {
        CanvasRenderingContext2d::save(self);
        Ok(())
    }

    fn restore(&mut self) -> Result<(), JsValue> {
        CanvasRenderingContext2d::restore(self);
        Ok(())
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color) -> Result<(), JsValue> {
        self.begin_path();
        self.arc(center.x, center.y, radius, 0.0, 2.0 * PI)?;
        self.set_fill_style_str(&color.to_css());
        self.fill();
        Ok(())
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, color: Color, line_width: f64) -> Result<(), JsValue> {
        self.begin_path();
        self.arc(center.x, center.y, radius, 0.0, 2.0 * PI)?;
        self.set_stroke_style_str(&color.to_css());
        self.set_line_width(line_width);
        self.stroke();
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn stroke_gradient_line(&mut self, from: Point, to: Point, stops: &[ColorStop], line_width: f64) -> Result<(), JsValue> {
        let gradient = self.create_linear_gradient(from.x, from.y, to.x, to.y);
        for stop in stops {
            gradient.add_color_stop(stop.offset as f32, &stop.color.to_css())?;
        }
        self.set_line_width(line_width);
        self.set_stroke_style_canvas_gradient(&gradient);
        self.begin_path();
        self.move_to(from.x, from.y);
        self.line_to(to.x, to.y);
        self.stroke();
        Ok(())
    }
}

/// A drawing call captured by [`RecordingPainter`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Save,
    Restore,
    FillCircle { center: Point, radius: f64, color: Color },
    StrokeCircle { center: Point, radius: f64, color: Color, line_width: f64 },
    GradientLine { from: Point, to: Point, stops: Vec<ColorStop>, line_width: f64 },
}

/// Painter that records every call instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingPainter {
    pub ops: Vec<DrawOp>,
}

impl RecordingPainter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of filled discs recorded.
    #[must_use]
    pub fn discs(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DrawOp::FillCircle { .. })).count()
    }

    /// Number of ripple rings recorded.
    #[must_use]
    pub fn rings(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DrawOp::StrokeCircle { .. })).count()
    }

    /// Recorded gradient lines (bonds).
    #[must_use]
    pub fn lines(&self) -> Vec<&DrawOp> {
        self.ops.iter().filter(|op| matches!(op, DrawOp::GradientLine { .. })).collect()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Painter for RecordingPainter {
    type Error = Infallible;

    fn save(&mut self) -> Result<(), Infallible> {
        self.ops.push(DrawOp::Save);
        Ok(())
    }

    fn restore(&mut self) -> Result<(), Infallible> {
        self.ops.push(DrawOp::Restore);
        Ok(())
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color) -> Result<(), Infallible> {
        self.ops.push(DrawOp::FillCircle { center, radius, color });
        Ok(())
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, color: Color, line_width: f64) -> Result<(), Infallible> {
        self.ops.push(DrawOp::StrokeCircle { center, radius, color, line_width });
        Ok(())
    }

    fn stroke_gradient_line(&mut self, from: Point, to: Point, stops: &[ColorStop], line_width: f64) -> Result<(), Infallible> {
        self.ops.push(DrawOp::GradientLine { from, to, stops: stops.to_vec(), line_width });
        Ok(())
    }
}
