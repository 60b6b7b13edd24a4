//! Charge: the animated unit behind one press gesture.
//!
//! A charge has a fixed origin (where its ripples expand from), an animated
//! center (where its disc sits), and a set of ripple phases. Its lifecycle is
//!
//! ```text
//! Delayed --(press delay elapses)--> Pressed --(press up)--> Released --(ripples done)--> Inactive
//! Instant (never pressed, ripple-only) ------------------------------------(ripples done)--> Inactive
//! ```
//!
//! A positive press delay arms a deadline that [`Charge::tick`] fires; a zero
//! delay starts pressed; a negative delay never presses. While pressed the
//! disc jitters: every completed 10 ms step draws a new offset, and the chain
//! stops re-arming as soon as the charge is released.
//!
//! Charges know nothing about the network; the mirror surface turns their
//! events into press notifications.

#[cfg(test)]
#[path = "charge_test.rs"]
mod charge_test;

use frames::ChargeKey;
use rand::Rng;

use crate::color::Color;
use crate::consts::{
    DEFAULT_CHARGE_RADIUS, DEFAULT_JITTER_RADIUS, DEFAULT_PRESS_DELAY_MS, DEFAULT_RIPPLE_DURATION_MS,
    DEFAULT_RIPPLE_SPREAD_MS, JITTER_STEP_MS, PRESS_RADIUS_MS, RIPPLE_LINE_WIDTH,
};
use crate::press::ChargeHandle;
use crate::render::Painter;
use crate::tween::{Animated, Easing, Transition};
use crate::viewport::{Bounds, Point};

/// Default charge colour (`#80dc1a`).
pub const DEFAULT_CHARGE_COLOR: Color = Color::rgb(128.0, 220.0, 26.0);

/// Per-charge visual configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeMode {
    pub charge_color: Color,
    pub charge_opacity: f64,
    pub charge_darken: f64,
    pub charge_radius: f64,
    pub charge_jitter_radius: f64,
    pub ripple_color: Color,
    pub ripple_opacity: f64,
    pub ripple_darken: f64,
    /// Time it takes a ripple to expand.
    pub ripple_duration: f64,
    /// Time interval over which ripples emit.
    pub ripple_spread: f64,
    /// `> 0` delays the hold, `0` holds immediately, `< 0` never holds.
    pub press_delay: f64,
}

impl Default for ChargeMode {
    fn default() -> Self {
        Self {
            charge_color: DEFAULT_CHARGE_COLOR,
            charge_opacity: 1.0,
            charge_darken: 0.0,
            charge_radius: DEFAULT_CHARGE_RADIUS,
            charge_jitter_radius: DEFAULT_JITTER_RADIUS,
            ripple_color: DEFAULT_CHARGE_COLOR,
            ripple_opacity: 1.0,
            ripple_darken: 0.0,
            ripple_duration: DEFAULT_RIPPLE_DURATION_MS,
            ripple_spread: DEFAULT_RIPPLE_SPREAD_MS,
            press_delay: DEFAULT_PRESS_DELAY_MS,
        }
    }
}

impl ChargeMode {
    /// Same mode with both charge and ripple colour set to `color`.
    #[must_use]
    pub fn colored(self, color: Color) -> Self {
        Self { charge_color: color, ripple_color: color, ..self }
    }
}

/// Where a charge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOrigin {
    /// Pressed on this client.
    Local,
    /// Materialized from a remote burst; ripples only, never held.
    RemoteBurst,
    /// Mirrors a remote entry of the shared charge map.
    RemoteHold,
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    /// Waiting for the press delay; only ripples render.
    Delayed,
    /// Held: disc visible and jittering.
    Pressed,
    /// Was held, released, ripples still animating.
    Released,
    /// Never held, ripples still animating.
    Instant,
    /// Nothing left to show; collected on the next render.
    Inactive,
}

/// Emitted by [`Charge::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeEvent {
    /// The press delay elapsed and the charge is now held.
    Held,
}

/// One expanding ring.
#[derive(Debug, Clone, Copy)]
pub struct Ripple {
    offset: f64,
    progress: Animated<f64>,
}

impl Ripple {
    fn new(offset: f64, mode: &ChargeMode) -> Self {
        let stagger = if mode.ripple_duration > 0.0 { mode.ripple_spread / mode.ripple_duration * offset } else { 0.0 };
        let mut progress = Animated::new(0.0);
        progress.set_state_with(
            1.0,
            Transition::duration(2.0 * mode.ripple_duration).with_easing(Easing::Stagger { offset: stagger }),
        );
        Self { offset, progress }
    }

    /// Phase offset in `[0, 1)` this ripple was created with.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Expansion progress: 0 at emission, 1 when fully expanded.
    #[must_use]
    pub fn phase(&self) -> f64 {
        self.progress.value()
    }
}

/// A press gesture, local or remote.
#[derive(Debug, Clone)]
pub struct Charge {
    id: ChargeKey,
    handle: ChargeHandle,
    origin: ChargeOrigin,
    /// Press time (ms); orders bond anchoring and drives the bond pulse.
    pub t0: f64,
    origin_x: f64,
    origin_y: f64,
    pub center_x: Animated<f64>,
    pub center_y: Animated<f64>,
    pub charge_color: Animated<Color>,
    pub charge_opacity: Animated<f64>,
    pub charge_darken: Animated<f64>,
    pub charge_radius: Animated<f64>,
    pub charge_jitter: Animated<f64>,
    pub charge_jitter_radius: Animated<f64>,
    pub ripple_color: Animated<Color>,
    pub ripple_opacity: Animated<f64>,
    pub ripple_darken: Animated<f64>,
    ripples: Vec<Ripple>,
    phases: Vec<f64>,
    pressed: bool,
    was_pressed: bool,
    press_at: Option<f64>,
}

impl Charge {
    /// Build a charge at fractional `origin` with one ripple per phase.
    ///
    /// `now` arms the press-delay deadline; `rng` seeds the first jitter step
    /// when the mode holds immediately.
    pub fn new(
        id: ChargeKey,
        t0: f64,
        origin: Point,
        phases: Vec<f64>,
        mode: &ChargeMode,
        now: f64,
        rng: &mut impl Rng,
    ) -> Self {
        let ripples = phases.iter().map(|&p| Ripple::new(p, mode)).collect();
        let mut charge = Self {
            id,
            handle: ChargeHandle(0),
            origin: ChargeOrigin::Local,
            t0,
            origin_x: origin.x,
            origin_y: origin.y,
            center_x: Animated::new(origin.x),
            center_y: Animated::new(origin.y),
            charge_color: Animated::new(mode.charge_color),
            charge_opacity: Animated::new(mode.charge_opacity),
            charge_darken: Animated::new(mode.charge_darken),
            charge_radius: Animated::new(mode.charge_radius),
            charge_jitter: Animated::new(0.0),
            charge_jitter_radius: Animated::new(mode.charge_jitter_radius),
            ripple_color: Animated::new(mode.ripple_color),
            ripple_opacity: Animated::new(mode.ripple_opacity),
            ripple_darken: Animated::new(mode.ripple_darken),
            ripples,
            phases,
            pressed: false,
            was_pressed: false,
            press_at: None,
        };
        if mode.press_delay > 0.0 {
            charge.press_at = Some(now + mode.press_delay);
        } else if mode.press_delay == 0.0 {
            charge.set_pressed(true, rng);
        }
        charge
    }

    // --- Identity ---

    #[must_use]
    pub fn id(&self) -> &ChargeKey {
        &self.id
    }

    #[must_use]
    pub fn handle(&self) -> ChargeHandle {
        self.handle
    }

    #[must_use]
    pub fn origin(&self) -> ChargeOrigin {
        self.origin
    }

    pub(crate) fn attach(&mut self, handle: ChargeHandle, origin: ChargeOrigin) {
        self.handle = handle;
        self.origin = origin;
    }

    /// Fixed fractional point the ripples expand from.
    #[must_use]
    pub fn origin_point(&self) -> Point {
        Point::new(self.origin_x, self.origin_y)
    }

    /// Current fractional disc center.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.center_x.value(), self.center_y.value())
    }

    /// Phases the charge was created with, leading zero included.
    #[must_use]
    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    #[must_use]
    pub fn ripples(&self) -> &[Ripple] {
        &self.ripples
    }

    // --- State ---

    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// A charge stays alive while held or while any ripple is still expanding.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.pressed || !self.ripples.is_empty()
    }

    /// Whether the press-delay deadline is still pending.
    #[must_use]
    pub fn is_delayed(&self) -> bool {
        self.press_at.is_some()
    }

    #[must_use]
    pub fn state(&self) -> ChargeState {
        if self.press_at.is_some() {
            ChargeState::Delayed
        } else if self.pressed {
            ChargeState::Pressed
        } else if self.ripples.is_empty() {
            ChargeState::Inactive
        } else if self.was_pressed {
            ChargeState::Released
        } else {
            ChargeState::Instant
        }
    }

    /// Force the pressed flag. Pressing cancels a pending delay and starts jitter.
    pub fn set_pressed(&mut self, pressed: bool, rng: &mut impl Rng) {
        if self.pressed == pressed {
            return;
        }
        self.pressed = pressed;
        if pressed {
            self.press_at = None;
            self.was_pressed = true;
            self.jitter(rng);
        }
    }

    // --- Lifecycle ---

    /// Advance every animation to `now`, firing the press delay if due.
    pub fn tick(&mut self, now: f64, rng: &mut impl Rng) -> Option<ChargeEvent> {
        let mut event = None;
        if let Some(at) = self.press_at {
            if now >= at {
                self.press_at = None;
                self.press_down(rng);
                event = Some(ChargeEvent::Held);
            }
        }

        self.center_x.on_frame(now);
        self.center_y.on_frame(now);
        self.charge_color.on_frame(now);
        self.charge_opacity.on_frame(now);
        self.charge_darken.on_frame(now);
        self.charge_radius.on_frame(now);
        self.charge_jitter_radius.on_frame(now);
        self.ripple_color.on_frame(now);
        self.ripple_opacity.on_frame(now);
        self.ripple_darken.on_frame(now);
        if self.charge_jitter.on_frame(now) && self.pressed {
            self.jitter(rng);
        }
        for ripple in &mut self.ripples {
            ripple.progress.on_frame(now);
        }
        event
    }

    fn press_down(&mut self, rng: &mut impl Rng) {
        self.pressed = true;
        self.was_pressed = true;
        let radius = self.charge_radius.state();
        self.charge_radius.set_state(0.0);
        self.charge_radius.set_state_with(radius, Transition::duration(PRESS_RADIUS_MS));
        self.jitter(rng);
    }

    fn jitter(&mut self, rng: &mut impl Rng) {
        let offset = 0.5 - rng.random::<f64>();
        self.charge_jitter.set_state_with(offset, Transition::duration(JITTER_STEP_MS));
    }

    /// Move the disc center directly, without easing.
    pub fn press_move(&mut self, x: f64, y: f64) {
        self.center_x.set_state(x);
        self.center_y.set_state(y);
    }

    /// Release the press. The running jitter step finishes and is not re-armed.
    pub fn press_up(&mut self) {
        self.press_at = None;
        self.pressed = false;
    }

    /// Cancel a pending press delay without releasing.
    pub fn cancel_timer(&mut self) {
        self.press_at = None;
    }

    // --- Rendering ---

    /// Disc radius including jitter, never negative.
    #[must_use]
    pub fn disc_radius(&self) -> f64 {
        (self.charge_radius.value() + self.charge_jitter.value() * self.charge_jitter_radius.value()).max(0.0)
    }

    /// Disc fill colour after darkening and opacity.
    #[must_use]
    pub fn disc_color(&self) -> Color {
        self.charge_color
            .value()
            .darker(self.charge_darken.value())
            .alpha(self.charge_opacity.value())
    }

    /// Draw the disc (when held) and every in-flight ripple.
    ///
    /// Ripples that have reached phase 1 are removed here, in place, without
    /// skipping the ripple that slides into the removed slot.
    ///
    /// # Errors
    ///
    /// Propagates painter failures.
    pub fn render<P: Painter>(&mut self, painter: &mut P, bounds: Bounds) -> Result<(), P::Error> {
        painter.save()?;
        if self.pressed {
            let center = bounds.to_px(self.center());
            painter.fill_circle(center, self.disc_radius(), self.disc_color())?;
        }
        self.render_ripples(painter, bounds)?;
        painter.restore()
    }

    fn render_ripples<P: Painter>(&mut self, painter: &mut P, bounds: Bounds) -> Result<(), P::Error> {
        let origin = bounds.to_px(self.origin_point());
        let color = self.ripple_color.value().darker(self.ripple_darken.value());
        let opacity = self.ripple_opacity.value();
        let max_radius = bounds.max_ripple_radius();

        let mut i = 0;
        while i < self.ripples.len() {
            let phase = self.ripples[i].phase();
            if phase >= 1.0 {
                self.ripples.remove(i);
                continue;
            }
            if phase > 0.0 {
                let stroke = color.alpha(ripple_alpha(opacity, phase));
                painter.stroke_circle(origin, ripple_radius(phase, max_radius), stroke, RIPPLE_LINE_WIDTH)?;
            }
            i += 1;
        }
        Ok(())
    }
}

/// Ring radius at `phase` for a canvas whose half-extent is `max_radius`.
#[must_use]
pub fn ripple_radius(phase: f64, max_radius: f64) -> f64 {
    phase * max_radius
}

/// Ring stroke alpha: fades linearly to zero as the ring expands.
#[must_use]
pub fn ripple_alpha(opacity: f64, phase: f64) -> f64 {
    opacity - opacity * phase
}
