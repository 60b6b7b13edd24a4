//! Synchronization adapter: replicates presses through the relay.
//!
//! Outbound, the adapter observes the local [`MirrorSurface`] and publishes
//! one [`MirrorCommand`] per press event: a ripple burst on press-down and
//! hold/move/up writes against the shared charge map.
//!
//! Inbound, the host hands every relay [`Frame`] to
//! [`SyncAdapter::handle_frame`]. Bursts become ripple-only remote charges,
//! map updates create or retarget remote holds, and map removals drop them.
//! Anything carrying this session's id is an echo of our own publish and is
//! ignored. Connecting or disconnecting drops every remote charge so the map
//! snapshot that follows a connect rebuilds them from scratch.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use frames::{
    AMBIENT_COLOR, ChargeCommand, ChargeEntry, ChargeRemoval, Frame, HoldCommand, MirrorCommand, ModeRecord,
    MoveCommand, RecordError, RippleRecord, Scoreboard, Status, UpCommand, round_to, syscall,
};

use crate::charge::{Charge, ChargeOrigin};
use crate::color::Color;
use crate::consts::{COORD_PLACES, PHASE_PLACES, REMOTE_TWEEN_MS};
use crate::mirror::{MirrorObserver, MirrorSurface};
use crate::tween::Transition;
use crate::viewport::Point;

// =============================================================================
// PUBLISHING
// =============================================================================

/// Outbound transport for mirror commands.
pub trait Publisher {
    fn publish(&mut self, command: MirrorCommand);
}

/// Queues commands until the host drains them onto its socket.
#[derive(Debug, Default)]
pub struct FrameOutbox {
    pending: Vec<MirrorCommand>,
}

impl FrameOutbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands published since the last drain.
    #[must_use]
    pub fn pending(&self) -> &[MirrorCommand] {
        &self.pending
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every queued command as a request frame stamped `ts`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if a command fails to serialize; the queue is
    /// emptied either way.
    pub fn drain_frames(&mut self, ts: i64) -> Result<Vec<Frame>, RecordError> {
        std::mem::take(&mut self.pending).iter().map(|c| c.to_frame(ts)).collect()
    }
}

impl Publisher for FrameOutbox {
    fn publish(&mut self, command: MirrorCommand) {
        self.pending.push(command);
    }
}

// =============================================================================
// INBOUND RESULT
// =============================================================================

/// Why an inbound frame changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Carries this session's id.
    SelfEcho,
    /// A burst arrived while the document is hidden.
    Hidden,
    /// A map update with no positive radius.
    NoHold,
    /// The adapter is closed.
    Closed,
    /// The relay reported an error.
    Rejected,
    /// A syscall the adapter does not handle.
    Unknown,
}

/// Outcome of [`SyncAdapter::handle_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Applied,
    Ignored(IgnoreReason),
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Bridges a [`MirrorSurface`] and the relay.
#[derive(Debug)]
pub struct SyncAdapter<P: Publisher = FrameOutbox> {
    publisher: P,
    open: bool,
    hidden: bool,
    client_id: Option<String>,
    mode: Option<ModeRecord>,
    scoreboard: Option<Scoreboard>,
}

impl Default for SyncAdapter<FrameOutbox> {
    fn default() -> Self {
        Self::new(FrameOutbox::new())
    }
}

impl<P: Publisher> SyncAdapter<P> {
    /// An open adapter publishing through `publisher`.
    pub fn new(publisher: P) -> Self {
        Self { publisher, open: true, hidden: false, client_id: None, mode: None, scoreboard: None }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    // --- Lifecycle ---

    /// Resume handling inbound frames.
    pub fn open(&mut self) {
        self.open = true;
    }

    /// Stop handling inbound frames until [`Self::open`].
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Bursts are skipped while the document is hidden.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Relay-assigned connection id from the last `session:connected`.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Last mode published by the relay.
    pub fn mode(&self) -> Option<&ModeRecord> {
        self.mode.as_ref()
    }

    /// Last scoreboard published by the relay.
    pub fn scoreboard(&self) -> Option<&Scoreboard> {
        self.scoreboard.as_ref()
    }

    /// The relay connection dropped: forget every remote charge.
    pub fn on_disconnect(&mut self, surface: &mut MirrorSurface) -> usize {
        self.client_id = None;
        let dropped = surface.clear_remote();
        log::info!("mirror disconnected; dropped {dropped} remote charges");
        dropped
    }

    // --- Inbound ---

    /// Apply one relay frame to `surface`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a known syscall carries a malformed payload.
    pub fn handle_frame(&mut self, surface: &mut MirrorSurface, frame: &Frame, now: f64) -> Result<Inbound, RecordError> {
        if !self.open {
            return Ok(Inbound::Ignored(IgnoreReason::Closed));
        }
        if frame.status == Status::Error {
            log::warn!("relay rejected {}: {:?}", frame.syscall, frame.data.get(frames::FRAME_MESSAGE));
            return Ok(Inbound::Ignored(IgnoreReason::Rejected));
        }

        match frame.syscall.as_str() {
            syscall::RIPPLE_BURST => Ok(self.on_remote_ripple(surface, &frame.record()?, now)),
            syscall::CHARGE_UPDATE => Ok(Self::on_remote_update(surface, frame.record()?, now)),
            syscall::CHARGE_REMOVE => Ok(Self::on_remote_remove(surface, &frame.record()?)),
            syscall::SESSION_CONNECTED => {
                self.client_id = frame.data.get("client_id").and_then(|v| v.as_str()).map(str::to_owned);
                let dropped = surface.clear_remote();
                log::info!("mirror connected; dropped {dropped} remote charges");
                Ok(Inbound::Applied)
            }
            syscall::MIRROR_MODE => {
                let record: ModeRecord = frame.record()?;
                surface.mode.apply_record(&record);
                self.mode = Some(record);
                Ok(Inbound::Applied)
            }
            syscall::MIRROR_SCOREBOARD => {
                self.scoreboard = Some(frame.record()?);
                Ok(Inbound::Applied)
            }
            other => {
                log::debug!("ignoring frame {other}");
                Ok(Inbound::Ignored(IgnoreReason::Unknown))
            }
        }
    }

    fn on_remote_ripple(&self, surface: &mut MirrorSurface, record: &RippleRecord, now: f64) -> Inbound {
        if self.hidden {
            return Inbound::Ignored(IgnoreReason::Hidden);
        }
        if record.id.is_from(surface.id()) {
            return Inbound::Ignored(IgnoreReason::SelfEcho);
        }
        let x = record.x.unwrap_or_else(|| surface.random());
        let y = record.y.unwrap_or_else(|| surface.random());
        let phases: Vec<f64> = std::iter::once(0.0).chain(record.phases.iter().copied()).collect();
        let mode = surface.mode.remote_mode(remote_color(record.color.as_deref()), -1.0);
        let charge = surface.build_charge(record.id.clone(), now, Point::new(x, y), phases, &mode, now);
        surface.insert(charge, ChargeOrigin::RemoteBurst);
        Inbound::Applied
    }

    fn on_remote_update(surface: &mut MirrorSurface, entry: ChargeEntry, now: f64) -> Inbound {
        let ChargeEntry { key, record } = entry;
        if key.is_from(surface.id()) {
            return Inbound::Ignored(IgnoreReason::SelfEcho);
        }
        if record.r.is_nan() || record.r <= 0.0 {
            return Inbound::Ignored(IgnoreReason::NoHold);
        }
        #[allow(clippy::cast_precision_loss)]
        let t0 = if record.t0 > 0 { record.t0 as f64 } else { now };
        let color = remote_color(Some(&record.color));
        let tween = Transition::duration(REMOTE_TWEEN_MS);

        if let Some(charge) = surface.remote_charge_mut(&key) {
            charge.t0 = t0;
            charge.center_x.set_state_with(record.x, tween);
            charge.center_y.set_state_with(record.y, tween);
            charge.charge_color.set_state_with(color, tween);
            charge.charge_radius.set_state_with(record.r, tween);
            charge.ripple_color.set_state_with(color, tween);
            return Inbound::Applied;
        }

        let mode = surface.mode.remote_mode(color, 0.0);
        let mut charge = surface.build_charge(key.clone(), t0, Point::new(record.x, record.y), vec![0.0], &mode, now);
        charge.charge_radius.set_state_with(record.r, tween);
        surface.set_remote(&key, Some(charge));
        Inbound::Applied
    }

    fn on_remote_remove(surface: &mut MirrorSurface, removal: &ChargeRemoval) -> Inbound {
        if removal.key.is_from(surface.id()) {
            return Inbound::Ignored(IgnoreReason::SelfEcho);
        }
        surface.remove_remote(&removal.key);
        Inbound::Applied
    }
}

/// Parse a remote colour, falling back to the ambient colour.
fn remote_color(color: Option<&str>) -> Color {
    let fallback = || AMBIENT_COLOR.parse().unwrap_or_default();
    match color.map(str::parse::<Color>) {
        Some(Ok(color)) => color,
        _ => fallback(),
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

impl<P: Publisher> MirrorObserver for SyncAdapter<P> {
    fn did_press_down(&mut self, charge: &Charge, _surface: &MirrorSurface) {
        let origin = charge.origin_point();
        let record = RippleRecord {
            id: charge.id().clone(),
            x: Some(round_to(origin.x, COORD_PLACES)),
            y: Some(round_to(origin.y, COORD_PLACES)),
            phases: charge.phases().iter().skip(1).map(|&p| round_to(p, PHASE_PLACES)).collect(),
            color: Some(charge.charge_color.state().to_hex()),
        };
        self.publisher.publish(MirrorCommand::Ripple(record));
    }

    fn did_press_hold(&mut self, charge: &Charge, _surface: &MirrorSurface) {
        let command = HoldCommand {
            id: charge.id().clone(),
            x: round_to(charge.center_x.state(), COORD_PLACES),
            y: round_to(charge.center_y.state(), COORD_PLACES),
            r: charge.charge_radius.state() / 2.0,
            color: charge.charge_color.state().to_hex(),
        };
        self.publisher.publish(MirrorCommand::Charge(ChargeCommand::Hold(command)));
    }

    fn did_press_move(&mut self, charge: &Charge, _surface: &MirrorSurface) {
        let command = MoveCommand {
            id: charge.id().clone(),
            x: round_to(charge.center_x.state(), COORD_PLACES),
            y: round_to(charge.center_y.state(), COORD_PLACES),
            r: charge.charge_radius.state() / 2.0,
            color: Some(charge.charge_color.state().to_hex()),
        };
        self.publisher.publish(MirrorCommand::Charge(ChargeCommand::Move(command)));
    }

    fn did_press_up(&mut self, charge: &Charge, _surface: &MirrorSurface) {
        let command = UpCommand { id: charge.id().clone() };
        self.publisher.publish(MirrorCommand::Charge(ChargeCommand::Up(command)));
    }
}
