//! Mirror surface: the collection of charges on one canvas.
//!
//! The surface owns every live [`Charge`] (local presses, remote bursts and
//! remote holds), the per-session identity and display colour, and the
//! [`PressTracker`] that maps input sources to local charges. It advances and
//! renders charges, draws bonds between held charges, and sweeps inactive
//! charges after each render.
//!
//! Input handlers return [`PressEvent`]s instead of calling out. The engine
//! forwards them to registered [`MirrorObserver`]s through
//! [`MirrorSurface::notify`], so observers never run while the surface is
//! mid-mutation.

#[cfg(test)]
#[path = "mirror_test.rs"]
mod mirror_test;

use frames::{ChargeKey, ModeRecord, PALETTE};
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::charge::{Charge, ChargeEvent, ChargeMode, ChargeOrigin, DEFAULT_CHARGE_COLOR};
use crate::color::Color;
use crate::consts::{
    BOND_LINE_WIDTH, BOND_PULSE_MS, DEFAULT_RIPPLE_DURATION_MS, DEFAULT_RIPPLE_SPREAD_MS, SESSION_ID_LEN,
};
use crate::press::{ChargeHandle, PressSource, PressTracker, TouchListeners};
use crate::render::{ColorStop, Painter};
use crate::viewport::{Bounds, Point};

// =============================================================================
// MODE
// =============================================================================

/// Surface-wide configuration. `Some` overrides replace the per-charge default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorMode {
    pub min_ripples: u32,
    pub max_ripples: u32,
    pub ripple_duration: f64,
    pub ripple_spread: f64,
    pub press_delay: Option<f64>,
    pub charge_opacity: Option<f64>,
    pub charge_darken: Option<f64>,
    pub charge_radius: Option<f64>,
    pub charge_jitter_radius: Option<f64>,
    pub ripple_opacity: Option<f64>,
    pub ripple_darken: Option<f64>,
}

impl Default for MirrorMode {
    fn default() -> Self {
        Self {
            min_ripples: 2,
            max_ripples: 5,
            ripple_duration: DEFAULT_RIPPLE_DURATION_MS,
            ripple_spread: DEFAULT_RIPPLE_SPREAD_MS,
            press_delay: None,
            charge_opacity: None,
            charge_darken: None,
            charge_radius: None,
            charge_jitter_radius: None,
            ripple_opacity: None,
            ripple_darken: None,
        }
    }
}

impl MirrorMode {
    /// Adopt the ripple range and timing published by the relay.
    pub fn apply_record(&mut self, record: &ModeRecord) {
        let record = record.normalized();
        self.min_ripples = record.min_ripples;
        self.max_ripples = record.max_ripples;
        self.ripple_duration = record.ripple_duration;
        self.ripple_spread = record.ripple_spread;
    }

    /// Ripple count drawn uniformly from `[min, max]`, never below one.
    pub fn ripple_count(&self, rng: &mut impl Rng) -> usize {
        let min = self.min_ripples.max(1);
        let max = self.max_ripples.max(min);
        rng.random_range(min..=max) as usize
    }

    /// Local charge mode in `color`, with every override applied.
    #[must_use]
    pub fn charge_mode(&self, color: Color) -> ChargeMode {
        let mut mode = ChargeMode::default().colored(color);
        self.apply_overrides(&mut mode);
        mode
    }

    /// Mode for a charge mirrored from another client: zero starting radius,
    /// the remote colour, and only the opacity/darken overrides.
    #[must_use]
    pub fn remote_mode(&self, color: Color, press_delay: f64) -> ChargeMode {
        let mut mode = ChargeMode::default().colored(color);
        mode.charge_radius = 0.0;
        mode.press_delay = press_delay;
        self.apply_shading(&mut mode);
        mode
    }

    /// Overlay the surface overrides and ripple timing onto `mode`.
    pub fn apply_overrides(&self, mode: &mut ChargeMode) {
        self.apply_shading(mode);
        if let Some(v) = self.press_delay {
            mode.press_delay = v;
        }
        if let Some(v) = self.charge_radius {
            mode.charge_radius = v;
        }
        if let Some(v) = self.charge_jitter_radius {
            mode.charge_jitter_radius = v;
        }
    }

    /// Ripple timing plus the opacity/darken overrides shared by local and remote charges.
    fn apply_shading(&self, mode: &mut ChargeMode) {
        mode.ripple_duration = self.ripple_duration;
        mode.ripple_spread = self.ripple_spread;
        if let Some(v) = self.charge_opacity {
            mode.charge_opacity = v;
        }
        if let Some(v) = self.charge_darken {
            mode.charge_darken = v;
        }
        if let Some(v) = self.ripple_opacity {
            mode.ripple_opacity = v;
        }
        if let Some(v) = self.ripple_darken {
            mode.ripple_darken = v;
        }
    }
}

// =============================================================================
// EVENTS & OBSERVERS
// =============================================================================

/// Something observers or the host must react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressEvent {
    /// A local charge was created.
    Down(ChargeHandle),
    /// A local charge finished its press delay and is now held.
    Hold(ChargeHandle),
    /// A held local charge moved.
    Move(ChargeHandle),
    /// A held local charge was released.
    Up(ChargeHandle),
    /// Touch listeners must be installed or removed.
    Listeners(TouchListeners),
}

/// Receives local press lifecycle notifications. Every method defaults to a no-op.
pub trait MirrorObserver {
    fn did_press_down(&mut self, _charge: &Charge, _surface: &MirrorSurface) {}
    fn did_press_hold(&mut self, _charge: &Charge, _surface: &MirrorSurface) {}
    fn did_press_move(&mut self, _charge: &Charge, _surface: &MirrorSurface) {}
    fn did_press_up(&mut self, _charge: &Charge, _surface: &MirrorSurface) {}
}

// =============================================================================
// SURFACE
// =============================================================================

/// All charges on one canvas plus the local press sessions.
#[derive(Debug)]
pub struct MirrorSurface {
    id: String,
    pub mode: MirrorMode,
    color: Color,
    /// Prevent default browser handling of touches on the canvas.
    pub captive: bool,
    tracker: PressTracker,
    charges: Vec<Charge>,
    rng: StdRng,
    next_handle: u64,
}

impl MirrorSurface {
    #[must_use]
    pub fn new(mode: MirrorMode) -> Self {
        Self::with_rng(mode, StdRng::from_os_rng())
    }

    /// Build a surface drawing all randomness from `rng`.
    #[must_use]
    pub fn with_rng(mode: MirrorMode, mut rng: StdRng) -> Self {
        let id: String = (&mut rng).sample_iter(Alphanumeric).take(SESSION_ID_LEN).map(char::from).collect();
        let color = PALETTE[rng.random_range(0..PALETTE.len())].parse().unwrap_or(DEFAULT_CHARGE_COLOR);
        log::debug!("mirror session {id} using {color}");
        Self {
            id,
            mode,
            color,
            captive: false,
            tracker: PressTracker::new(),
            charges: Vec::new(),
            rng,
            next_handle: 1,
        }
    }

    // --- Identity ---

    /// Random per-session id; the first component of every local charge key.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display colour of local charges.
    #[must_use]
    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    // --- Queries ---

    #[must_use]
    pub fn charges(&self) -> &[Charge] {
        &self.charges
    }

    #[must_use]
    pub fn charge(&self, handle: ChargeHandle) -> Option<&Charge> {
        self.charges.iter().find(|c| c.handle() == handle)
    }

    pub fn charge_mut(&mut self, handle: ChargeHandle) -> Option<&mut Charge> {
        self.charges.iter_mut().find(|c| c.handle() == handle)
    }

    /// The remote hold mirrored under `key`.
    #[must_use]
    pub fn remote_charge(&self, key: &ChargeKey) -> Option<&Charge> {
        self.charges.iter().find(|c| c.origin() == ChargeOrigin::RemoteHold && c.id() == key)
    }

    pub fn remote_charge_mut(&mut self, key: &ChargeKey) -> Option<&mut Charge> {
        self.charges.iter_mut().find(|c| c.origin() == ChargeOrigin::RemoteHold && c.id() == key)
    }

    #[must_use]
    pub fn tracker(&self) -> &PressTracker {
        &self.tracker
    }

    /// A uniform random number in `[0, 1)` from the surface generator.
    pub fn random(&mut self) -> f64 {
        self.rng.random()
    }

    // --- Charge factory ---

    /// Build (but do not insert) a charge at fractional `origin`.
    ///
    /// Without `phases` a ripple count is drawn from the mode range, the first
    /// phase is 0 and the rest are uniform in `[0, 1)`. Without `mode` the
    /// charge takes the session colour. Surface overrides apply in both cases.
    pub fn create_charge(
        &mut self,
        id: ChargeKey,
        t0: f64,
        origin: Point,
        phases: Option<Vec<f64>>,
        mode: Option<ChargeMode>,
        now: f64,
    ) -> Charge {
        let phases = phases.unwrap_or_else(|| {
            let count = self.mode.ripple_count(&mut self.rng);
            std::iter::once(0.0).chain((1..count).map(|_| self.rng.random::<f64>())).collect()
        });
        let mut mode = mode.unwrap_or_else(|| ChargeMode::default().colored(self.color));
        self.mode.apply_overrides(&mut mode);
        Charge::new(id, t0, origin, phases, &mode, now, &mut self.rng)
    }

    /// Build a charge from an exact `mode`, bypassing surface overrides.
    pub fn build_charge(
        &mut self,
        id: ChargeKey,
        t0: f64,
        origin: Point,
        phases: Vec<f64>,
        mode: &ChargeMode,
        now: f64,
    ) -> Charge {
        Charge::new(id, t0, origin, phases, mode, now, &mut self.rng)
    }

    /// Take ownership of `charge`, returning its handle.
    pub fn insert(&mut self, mut charge: Charge, origin: ChargeOrigin) -> ChargeHandle {
        let handle = ChargeHandle(self.next_handle);
        self.next_handle += 1;
        charge.attach(handle, origin);
        self.charges.push(charge);
        handle
    }

    // --- Local input ---

    /// Begin a press from `source` at fractional `origin`.
    ///
    /// An already-active source is ignored.
    pub fn press_start(&mut self, source: PressSource, origin: Point, now: f64) -> Vec<PressEvent> {
        if self.tracker.contains(source) {
            return Vec::new();
        }
        let key = ChargeKey::new(self.id.clone(), source.tag());
        let charge = self.create_charge(key, now, origin, None, None, now);
        let held = charge.is_pressed();
        let handle = self.insert(charge, ChargeOrigin::Local);

        let mut events = Vec::with_capacity(3);
        if let Some(listeners) = self.tracker.start(source, handle) {
            events.push(PressEvent::Listeners(listeners));
        }
        events.push(PressEvent::Down(handle));
        // Zero press delay: held from the first frame.
        if held {
            events.push(PressEvent::Hold(handle));
        }
        events
    }

    /// Move the charge driven by `source`. Reports a move only while held.
    pub fn press_move(&mut self, source: PressSource, point: Point) -> Vec<PressEvent> {
        let Some(handle) = self.tracker.get(source) else {
            return Vec::new();
        };
        let Some(charge) = self.charge_mut(handle) else {
            return Vec::new();
        };
        charge.press_move(point.x, point.y);
        if charge.is_pressed() { vec![PressEvent::Move(handle)] } else { Vec::new() }
    }

    /// Release the charge driven by `source`. Reports an up only if it was held.
    pub fn press_end(&mut self, source: PressSource) -> Vec<PressEvent> {
        let Some((handle, listeners)) = self.tracker.end(source) else {
            return Vec::new();
        };
        let mut events = Vec::with_capacity(2);
        if let Some(charge) = self.charge_mut(handle) {
            let was_pressed = charge.is_pressed();
            charge.press_up();
            if was_pressed {
                events.push(PressEvent::Up(handle));
            }
        }
        if let Some(listeners) = listeners {
            events.push(PressEvent::Listeners(listeners));
        }
        events
    }

    // --- Remote charges ---

    /// Replace (or with `None`, remove) the remote hold keyed `key`.
    pub fn set_remote(&mut self, key: &ChargeKey, charge: Option<Charge>) -> Option<ChargeHandle> {
        self.remove_remote(key);
        charge.map(|c| self.insert(c, ChargeOrigin::RemoteHold))
    }

    /// Drop the remote hold keyed `key`. Returns whether one existed.
    pub fn remove_remote(&mut self, key: &ChargeKey) -> bool {
        let before = self.charges.len();
        self.charges.retain(|c| !(c.origin() == ChargeOrigin::RemoteHold && c.id() == key));
        self.charges.len() != before
    }

    /// Drop every remote charge, bursts included. Returns how many were dropped.
    pub fn clear_remote(&mut self) -> usize {
        let before = self.charges.len();
        self.charges.retain(|c| c.origin() == ChargeOrigin::Local);
        before - self.charges.len()
    }

    /// Cancel every pending press delay and forget all press sessions.
    pub fn teardown(&mut self) -> Option<TouchListeners> {
        for charge in &mut self.charges {
            charge.cancel_timer();
        }
        self.tracker.clear()
    }

    // --- Frame loop ---

    /// Advance every charge to `now`, reporting local holds.
    pub fn tick(&mut self, now: f64) -> Vec<PressEvent> {
        let mut events = Vec::new();
        for charge in &mut self.charges {
            let fired = charge.tick(now, &mut self.rng);
            if fired == Some(ChargeEvent::Held) && charge.origin() == ChargeOrigin::Local {
                events.push(PressEvent::Hold(charge.handle()));
            }
        }
        events
    }

    /// Whether anything on the surface is still animating or held.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.charges.iter().any(Charge::is_active)
    }

    /// Draw charges, then bonds, then sweep inactive charges.
    ///
    /// # Errors
    ///
    /// Propagates painter failures; garbage collection is skipped on error.
    pub fn render<P: Painter>(&mut self, painter: &mut P, bounds: Bounds, now: f64) -> Result<(), P::Error> {
        painter.save()?;
        for charge in &mut self.charges {
            charge.render(painter, bounds)?;
        }
        self.render_bonds(painter, bounds, now)?;
        painter.restore()?;
        self.collect_garbage();
        Ok(())
    }

    /// Star topology over held charges: the earliest `t0` anchors a bond to
    /// every other held charge. Fewer than two held charges yields nothing.
    #[must_use]
    pub fn bonds(&self) -> Vec<(ChargeHandle, ChargeHandle)> {
        let mut pressed: Vec<&Charge> = self.charges.iter().filter(|c| c.is_pressed()).collect();
        if pressed.len() < 2 {
            return Vec::new();
        }
        pressed.sort_by(|a, b| a.t0.total_cmp(&b.t0));
        let anchor = pressed[0].handle();
        pressed[1..].iter().map(|b| (anchor, b.handle())).collect()
    }

    fn render_bonds<P: Painter>(&self, painter: &mut P, bounds: Bounds, now: f64) -> Result<(), P::Error> {
        let opacity = self.mode.charge_opacity.unwrap_or(1.0);
        let darken = self.mode.charge_darken.unwrap_or(0.0);
        for (a, b) in self.bonds() {
            let (Some(a), Some(b)) = (self.charge(a), self.charge(b)) else {
                continue;
            };
            let a_color = a.charge_color.value().darker(darken).alpha(opacity);
            let b_color = b.charge_color.value().darker(darken).alpha(opacity);
            let stops = bond_stops(a_color, b_color, pulse_phase(now - a.t0));
            painter.stroke_gradient_line(bounds.to_px(a.center()), bounds.to_px(b.center()), &stops, BOND_LINE_WIDTH)?;
        }
        Ok(())
    }

    /// Remove every charge that is neither held nor rippling.
    pub fn collect_garbage(&mut self) -> usize {
        let before = self.charges.len();
        self.charges.retain(Charge::is_active);
        let removed = before - self.charges.len();
        if removed > 0 {
            log::debug!("collected {removed} inactive charges");
        }
        removed
    }

    // --- Observers ---

    /// Deliver a press lifecycle event to `observer`.
    ///
    /// Listener changes and events for charges that no longer exist are skipped.
    pub fn notify<O: MirrorObserver + ?Sized>(&self, event: PressEvent, observer: &mut O) {
        let handle = match event {
            PressEvent::Down(h) | PressEvent::Hold(h) | PressEvent::Move(h) | PressEvent::Up(h) => h,
            PressEvent::Listeners(_) => return,
        };
        let Some(charge) = self.charge(handle) else {
            return;
        };
        match event {
            PressEvent::Down(_) => observer.did_press_down(charge, self),
            PressEvent::Hold(_) => observer.did_press_hold(charge, self),
            PressEvent::Move(_) => observer.did_press_move(charge, self),
            PressEvent::Up(_) => observer.did_press_up(charge, self),
            PressEvent::Listeners(_) => {}
        }
    }
}

/// Triangle wave over [`BOND_PULSE_MS`]: 0 at the start of a period, 1 halfway.
#[must_use]
pub fn pulse_phase(dt: f64) -> f64 {
    let half = BOND_PULSE_MS / 2.0;
    let phase = dt.rem_euclid(BOND_PULSE_MS) / half;
    if phase > 1.0 { 2.0 - phase } else { phase }
}

/// Gradient stops for one bond: transparent ends with a blended pulse between.
#[must_use]
pub fn bond_stops(a: Color, b: Color, pulse: f64) -> Vec<ColorStop> {
    let mut stops = Vec::with_capacity(3);
    stops.push(ColorStop { offset: 0.0, color: a.alpha(0.0) });
    if pulse > 0.0 && pulse < 1.0 {
        stops.push(ColorStop { offset: pulse, color: a.mix(b, pulse) });
    }
    stops.push(ColorStop { offset: 1.0, color: b.alpha(0.0) });
    stops
}
