//! Mirror service: join/part, burst normalisation, the charge map and scoring.
//!
//! DESIGN
//! ======
//! Each mirror keeps two shared channels. Ripple bursts are normalised,
//! scored and broadcast once; nothing is stored. Charge commands write to the
//! replicated charge map, and every accepted write is broadcast as a
//! `charge:update` or `charge:remove` so clients can mirror the map.
//!
//! The `apply_*` functions are synchronous and operate on a borrowed
//! [`MirrorState`] with an explicit clock and RNG. They return the frames
//! to broadcast. The async wrappers take the lock, call them, then fan out.
//!
//! SCORING
//! =======
//! Only palette colours score. A burst adds `phases + 1` ripples to its
//! team; a removed charge adds its hold time (`now - t0`) when `t0` is known.

use frames::{
    AMBIENT_COLOR, ChargeCommand, ChargeEntry, ChargeKey, ChargeRecord, ChargeRemoval, DEFAULT_COLOR, ErrorCode, Frame,
    HoldCommand, ModeRecord, MoveCommand, RecordError, RippleRecord, Team, round_to, syscall, truncate_to,
};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{AppState, MirrorState};

/// Largest charge radius the relay stores.
pub const MAX_CHARGE_RADIUS: f64 = 100.0;

/// Session id used for relay-generated ripples.
pub const AMBIENT_SESSION: &str = "mirror";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("not joined to mirror: {0}")]
    NotJoined(String),
    #[error("invalid payload: {0}")]
    Payload(#[from] RecordError),
    #[error("unknown mirror op: {0}")]
    UnknownOp(String),
}

impl ErrorCode for MirrorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined(_) => "E_MIRROR_NOT_JOINED",
            Self::Payload(_) => "E_INVALID_PAYLOAD",
            Self::UnknownOp(_) => "E_UNKNOWN_OP",
        }
    }
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a mirror, creating it with the configured mode if needed.
/// Returns the snapshot frames a new client needs to catch up.
///
/// # Errors
///
/// Returns [`MirrorError::Payload`] if a stored record fails to serialize.
pub async fn join(
    state: &AppState,
    mirror: &str,
    client_id: Uuid,
    tx: mpsc::Sender<Frame>,
) -> Result<Vec<Frame>, MirrorError> {
    let mut mirrors = state.mirrors.write().await;
    let mirror_state = mirrors
        .entry(mirror.to_owned())
        .or_insert_with(|| MirrorState::new(state.config.mode));
    mirror_state.clients.insert(client_id, tx);
    info!(%mirror, %client_id, clients = mirror_state.clients.len(), "client joined mirror");
    snapshot(mirror_state)
}

/// Leave a mirror. The mirror is evicted once it has neither clients nor charges.
pub async fn part(state: &AppState, mirror: &str, client_id: Uuid) {
    let mut mirrors = state.mirrors.write().await;
    let Some(mirror_state) = mirrors.get_mut(mirror) else {
        return;
    };

    mirror_state.clients.remove(&client_id);
    info!(%mirror, %client_id, remaining = mirror_state.clients.len(), "client left mirror");

    if mirror_state.clients.is_empty() && mirror_state.charges.is_empty() {
        mirrors.remove(mirror);
        info!(%mirror, "evicted mirror from memory");
    }
}

/// Frames that bring a fresh client up to date: mode, scoreboard, then one
/// `charge:update` per live charge.
///
/// # Errors
///
/// Returns [`MirrorError::Payload`] if a record fails to serialize.
pub fn snapshot(mirror: &MirrorState) -> Result<Vec<Frame>, MirrorError> {
    let mut out = Vec::with_capacity(mirror.charges.len() + 2);
    out.push(mode_frame(&mirror.mode)?);
    out.push(Frame::request(syscall::MIRROR_SCOREBOARD, frames::Data::new()).with_record(&mirror.scoreboard)?);
    let mut entries: Vec<_> = mirror.charges.iter().collect();
    entries.sort_by_key(|(_, record)| record.t0);
    for (key, record) in entries {
        out.push(update_frame(key, record)?);
    }
    Ok(out)
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Send a frame to every client of a mirror, optionally excluding one.
pub async fn broadcast(state: &AppState, mirror: &str, frame: &Frame, exclude: Option<Uuid>) {
    let mirrors = state.mirrors.read().await;
    let Some(mirror_state) = mirrors.get(mirror) else {
        return;
    };
    fan_out(mirror_state, frame, exclude);
}

/// Best-effort delivery: a client whose channel is full misses the frame.
pub(crate) fn fan_out(mirror: &MirrorState, frame: &Frame, exclude: Option<Uuid>) {
    for (client_id, tx) in &mirror.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        if tx.try_send(frame.clone()).is_err() {
            debug!(%client_id, syscall = %frame.syscall, "dropped frame for slow client");
        }
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Apply one client frame to a mirror and broadcast the result.
/// Returns the number of frames broadcast.
///
/// # Errors
///
/// Returns [`MirrorError`] for unknown ops, malformed payloads, or a mirror
/// the client never joined.
pub async fn handle_frame(state: &AppState, mirror: &str, req: &Frame, now: i64) -> Result<usize, MirrorError> {
    let mut mirrors = state.mirrors.write().await;
    let Some(mirror_state) = mirrors.get_mut(mirror) else {
        return Err(MirrorError::NotJoined(mirror.to_owned()));
    };

    let out = match req.syscall.as_str() {
        syscall::RIPPLE_EMIT => apply_ripple(mirror_state, req.record()?, &mut rand::rng())?,
        syscall::CHARGE_HOLD | syscall::CHARGE_MOVE | syscall::CHARGE_UP => {
            apply_command(mirror_state, ChargeCommand::from_frame(req)?, now)?
        }
        syscall::MIRROR_MODE => apply_mode(mirror_state, req.record()?)?,
        other => return Err(MirrorError::UnknownOp(other.to_owned())),
    };

    for frame in &out {
        fan_out(mirror_state, frame, None);
    }
    Ok(out.len())
}

// =============================================================================
// BURSTS
// =============================================================================

/// Normalise, score and frame a ripple burst.
///
/// # Errors
///
/// Returns [`MirrorError::Payload`] if a frame fails to serialize.
pub fn apply_ripple(
    mirror: &mut MirrorState,
    record: RippleRecord,
    rng: &mut impl Rng,
) -> Result<Vec<Frame>, MirrorError> {
    let record = normalize_ripple(&mirror.mode, record, rng);
    let mut out = vec![Frame::request(syscall::RIPPLE_BURST, frames::Data::new()).with_record(&record)?];

    let color = record.color.as_deref().unwrap_or(DEFAULT_COLOR);
    if let Some(team) = Team::from_color(color) {
        let count = u64::try_from(record.phases.len()).unwrap_or(u64::MAX).saturating_add(1);
        let score = mirror.scoreboard.team_mut(team);
        score.ripple_count = score.ripple_count.saturating_add(count);
        out.push(scoreboard_frame(mirror)?);
    }
    debug!(id = %record.id, phases = record.phases.len(), "ripple burst");
    Ok(out)
}

/// Fill in missing burst fields and clamp precision.
///
/// Coordinates are truncated to 4 places and default to a random position.
/// Missing or empty phases are generated from `mode`; supplied phases pass through.
pub fn normalize_ripple(mode: &ModeRecord, record: RippleRecord, rng: &mut impl Rng) -> RippleRecord {
    let x = record.x.filter(|v| v.is_finite()).unwrap_or_else(|| rng.random());
    let y = record.y.filter(|v| v.is_finite()).unwrap_or_else(|| rng.random());
    let phases = if record.phases.is_empty() {
        generate_phases(mode, rng)
    } else {
        record.phases
    };
    RippleRecord {
        id: record.id,
        x: Some(truncate_to(x, 4)),
        y: Some(truncate_to(y, 4)),
        phases,
        color: Some(record.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned())),
    }
}

/// Pick `min + round((max - min) * u)` ripples and return the phases after
/// the implicit leading zero.
pub fn generate_phases(mode: &ModeRecord, rng: &mut impl Rng) -> Vec<f64> {
    let mode = mode.normalized();
    let span = f64::from(mode.max_ripples - mode.min_ripples);
    let extra = (span * rng.random::<f64>()).round();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = mode.min_ripples + extra as u32;
    (1..count).map(|_| truncate_to(rng.random::<f64>(), 2)).collect()
}

/// A relay-generated burst at a random origin.
pub fn ambient_ripple(mode: &ModeRecord, rng: &mut impl Rng) -> RippleRecord {
    let record = RippleRecord {
        id: ChargeKey::new(AMBIENT_SESSION, "ambient"),
        x: None,
        y: None,
        phases: Vec::new(),
        color: Some(AMBIENT_COLOR.to_owned()),
    };
    normalize_ripple(mode, record, rng)
}

// =============================================================================
// CHARGE MAP
// =============================================================================

/// Apply a charge command to the map.
///
/// A move or up for an unknown key changes nothing and broadcasts nothing.
///
/// # Errors
///
/// Returns [`MirrorError::Payload`] if a frame fails to serialize.
pub fn apply_command(mirror: &mut MirrorState, command: ChargeCommand, now: i64) -> Result<Vec<Frame>, MirrorError> {
    match command {
        ChargeCommand::Hold(hold) => {
            let key = hold.id.clone();
            let record = hold_record(&hold, now);
            let frame = update_frame(&key, &record)?;
            mirror.charges.insert(key, record);
            Ok(vec![frame])
        }
        ChargeCommand::Move(mv) => {
            let Some(record) = mirror.charges.get_mut(&mv.id) else {
                debug!(id = %mv.id, "move for unknown charge");
                return Ok(Vec::new());
            };
            move_record(record, &mv, now);
            Ok(vec![update_frame(&mv.id, record)?])
        }
        ChargeCommand::Up(up) => remove_charge(mirror, &up.id, now),
    }
}

/// Remove a charge, credit its hold time and frame the removal.
///
/// # Errors
///
/// Returns [`MirrorError::Payload`] if a frame fails to serialize.
pub fn remove_charge(mirror: &mut MirrorState, key: &ChargeKey, now: i64) -> Result<Vec<Frame>, MirrorError> {
    let Some(record) = mirror.charges.remove(key) else {
        return Ok(Vec::new());
    };
    let mut out = vec![remove_frame(key)?];
    if record.t0 != 0 {
        if let Some(team) = Team::from_color(&record.color) {
            let score = mirror.scoreboard.team_mut(team);
            score.charge_time = score.charge_time.saturating_add(now.saturating_sub(record.t0));
            out.push(scoreboard_frame(mirror)?);
        }
    }
    Ok(out)
}

/// Drop every charge whose last write is at least `ttl_ms` old.
///
/// # Errors
///
/// Returns [`MirrorError::Payload`] if a frame fails to serialize.
pub fn expire_charges(mirror: &mut MirrorState, now: i64, ttl_ms: i64) -> Result<Vec<Frame>, MirrorError> {
    let stale: Vec<ChargeKey> = mirror
        .charges
        .iter()
        .filter(|(_, record)| now.saturating_sub(record.t).abs() >= ttl_ms)
        .map(|(key, _)| key.clone())
        .collect();

    let mut out = Vec::new();
    for key in stale {
        info!(id = %key, "expiring stale charge");
        out.extend(remove_charge(mirror, &key, now)?);
    }
    Ok(out)
}

fn hold_record(hold: &HoldCommand, now: i64) -> ChargeRecord {
    ChargeRecord {
        t0: now,
        t: now,
        x: truncate_to(hold.x, 4),
        y: truncate_to(hold.y, 4),
        r: clamp_radius(hold.r),
        color: if hold.color.is_empty() { DEFAULT_COLOR.to_owned() } else { hold.color.clone() },
    }
}

fn move_record(record: &mut ChargeRecord, mv: &MoveCommand, now: i64) {
    record.t = now;
    record.x = round_to(mv.x, 4);
    record.y = round_to(mv.y, 4);
    record.r = clamp_radius(mv.r);
    if let Some(color) = &mv.color {
        record.color.clone_from(color);
    }
}

/// Whole-number radius in `[0, MAX_CHARGE_RADIUS]`.
#[must_use]
pub fn clamp_radius(r: f64) -> f64 {
    if r.is_nan() {
        return 0.0;
    }
    r.clamp(0.0, MAX_CHARGE_RADIUS).trunc()
}

// =============================================================================
// MODE
// =============================================================================

/// Replace the mirror mode and frame it for every client.
///
/// # Errors
///
/// Returns [`MirrorError::Payload`] if the frame fails to serialize.
pub fn apply_mode(mirror: &mut MirrorState, mode: ModeRecord) -> Result<Vec<Frame>, MirrorError> {
    mirror.mode = mode.normalized();
    info!(min = mirror.mode.min_ripples, max = mirror.mode.max_ripples, "mirror mode updated");
    Ok(vec![mode_frame(&mirror.mode)?])
}

// =============================================================================
// FRAMES
// =============================================================================

fn update_frame(key: &ChargeKey, record: &ChargeRecord) -> Result<Frame, RecordError> {
    let entry = ChargeEntry { key: key.clone(), record: record.clone() };
    Frame::request(syscall::CHARGE_UPDATE, frames::Data::new()).with_record(&entry)
}

fn remove_frame(key: &ChargeKey) -> Result<Frame, RecordError> {
    Frame::request(syscall::CHARGE_REMOVE, frames::Data::new()).with_record(&ChargeRemoval { key: key.clone() })
}

fn mode_frame(mode: &ModeRecord) -> Result<Frame, RecordError> {
    Frame::request(syscall::MIRROR_MODE, frames::Data::new()).with_record(mode)
}

fn scoreboard_frame(mirror: &MirrorState) -> Result<Frame, RecordError> {
    Frame::request(syscall::MIRROR_SCOREBOARD, frames::Data::new()).with_record(&mirror.scoreboard)
}

#[cfg(test)]
#[path = "mirror_test.rs"]
mod tests;
