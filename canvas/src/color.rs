//! RGBA colours: parsing, darkening, alpha and blending.
//!
//! Channels are kept as `f64` so animated colours interpolate smoothly; they
//! are only rounded when formatted for the canvas or the wire.

#[cfg(test)]
#[path = "color_test.rs"]
mod color_test;

use std::fmt;
use std::str::FromStr;

/// Multiplier applied per unit of darkening.
const DARKER_FACTOR: f64 = 0.7;

/// Error returned when a colour string is not `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex colour: {0}")]
pub struct ColorError(pub String);

/// An sRGB colour with straight alpha. Channels are 0–255, alpha 0–1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Scale the channels by `0.7^k`. Negative `k` brightens.
    #[must_use]
    pub fn darker(self, k: f64) -> Self {
        let f = DARKER_FACTOR.powf(k);
        Self { r: self.r * f, g: self.g * f, b: self.b * f, a: self.a }
    }

    /// Replace the alpha channel.
    #[must_use]
    pub fn alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }

    /// Linear blend towards `other`; `t = 0` is `self`, `t = 1` is `other`.
    #[must_use]
    pub fn mix(self, other: Self, t: f64) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// `#rrggbb`, ignoring alpha. Used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", channel(self.r), channel(self.g), channel(self.b))
    }

    /// A CSS colour string suitable for canvas fill/stroke styles.
    #[must_use]
    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            self.to_hex()
        } else {
            let a = (self.a.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
            format!("rgba({},{},{},{a})", channel(self.r), channel(self.g), channel(self.b))
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ColorError(s.to_owned());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let digit = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let r = digit(0, 1)?;
                let g = digit(1, 1)?;
                let b = digit(2, 1)?;
                Ok(Self::rgb(f64::from(r * 17), f64::from(g * 17), f64::from(b * 17)))
            }
            6 => Ok(Self::rgb(f64::from(digit(0, 2)?), f64::from(digit(2, 2)?), f64::from(digit(4, 2)?))),
            _ => Err(invalid()),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
