//! Animated properties: a target state plus an optional timed transition.
//!
//! An [`Animated`] value is advanced once per frame with [`Animated::on_frame`].
//! A transition's clock starts on the first frame after it is set, so values
//! set between frames never skip ahead. `on_frame` reports completion instead
//! of invoking callbacks; owners re-arm chained animations themselves.

#[cfg(test)]
#[path = "tween_test.rs"]
mod tween_test;

use crate::color::Color;

/// Values that can be blended between two endpoints.
pub trait Interpolate: Copy {
    fn interpolate(self, to: Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(self, to: Self, t: f64) -> Self {
        self + (to - self) * t
    }
}

impl Interpolate for Color {
    fn interpolate(self, to: Self, t: f64) -> Self {
        self.mix(to, t)
    }
}

/// Easing curves mapping normalized time `[0, 1]` to progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    /// `clamp01(2t - offset)`: reaches 1 halfway through the clock, delayed by `offset`.
    Stagger { offset: f64 },
}

impl Easing {
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::Stagger { offset } => (2.0 * t - offset).clamp(0.0, 1.0),
        }
    }
}

/// Duration (ms) and easing of a state change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub duration: f64,
    pub easing: Easing,
}

impl Transition {
    /// A linear transition over `duration` ms.
    #[must_use]
    pub fn duration(duration: f64) -> Self {
        Self { duration, easing: Easing::Linear }
    }

    #[must_use]
    pub fn with_easing(self, easing: Easing) -> Self {
        Self { easing, ..self }
    }
}

#[derive(Debug, Clone, Copy)]
struct Tween<T> {
    from: T,
    transition: Transition,
    start: Option<f64>,
}

/// A property with a current (interpolated) value and a target state.
#[derive(Debug, Clone, Copy)]
pub struct Animated<T> {
    value: T,
    state: T,
    tween: Option<Tween<T>>,
}

impl<T: Interpolate> Animated<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self { value, state: value, tween: None }
    }

    /// The interpolated value as of the last frame.
    #[must_use]
    pub fn value(&self) -> T {
        self.value
    }

    /// The target the property is heading to.
    #[must_use]
    pub fn state(&self) -> T {
        self.state
    }

    /// Whether a transition is still running.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// Jump straight to `state`, cancelling any running transition.
    pub fn set_state(&mut self, state: T) {
        self.value = state;
        self.state = state;
        self.tween = None;
    }

    /// Transition from the current value to `state`.
    pub fn set_state_with(&mut self, state: T, transition: Transition) {
        self.state = state;
        self.tween = Some(Tween { from: self.value, transition, start: None });
    }

    /// Advance to time `t` (ms). Returns `true` on the frame a transition completes.
    pub fn on_frame(&mut self, t: f64) -> bool {
        let Some(tween) = self.tween.as_mut() else {
            return false;
        };
        let start = *tween.start.get_or_insert(t);
        let duration = tween.transition.duration;
        let u = if duration > 0.0 { ((t - start) / duration).clamp(0.0, 1.0) } else { 1.0 };
        self.value = tween.from.interpolate(self.state, tween.transition.easing.apply(u));
        if u >= 1.0 {
            self.tween = None;
            return true;
        }
        false
    }
}
