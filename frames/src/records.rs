//! Typed mirror payloads carried in frame `data`.
//!
//! Two shared channels exist per mirror: a fire-and-forget stream of
//! [`RippleRecord`] bursts and a replicated map from [`ChargeKey`] to
//! [`ChargeRecord`] holding every press that is currently held. Clients write
//! to the map through [`ChargeCommand`]s; the relay owns the map itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Data, Frame, RecordError, record_to_data, syscall};

/// Default charge colour when a record omits one.
pub const DEFAULT_COLOR: &str = "#80dc1a";

/// Colour used for relay-generated ambient ripples.
pub const AMBIENT_COLOR: &str = "#00a6ed";

/// The session palette. Each client picks one colour at random.
pub const PALETTE: [&str; 3] = ["#80dc1a", "#56dbb6", "#c200fa"];

// =============================================================================
// KEYS
// =============================================================================

/// Compound charge identity: `(session id, press tag)`.
///
/// Serialized as a two-element array so the session component can be compared
/// without parsing. The session component is what self-echo filtering checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChargeKey(pub String, pub String);

impl ChargeKey {
    #[must_use]
    pub fn new(session: impl Into<String>, press: impl Into<String>) -> Self {
        Self(session.into(), press.into())
    }

    /// The originating client's session id.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.0
    }

    /// The input-source tag (`"mouse"`, `"touch3"`, ...).
    #[must_use]
    pub fn press(&self) -> &str {
        &self.1
    }

    /// Whether this key was produced by the given session.
    #[must_use]
    pub fn is_from(&self, session: &str) -> bool {
        self.0 == session
    }
}

impl fmt::Display for ChargeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

// =============================================================================
// BURSTS
// =============================================================================

/// A one-shot ripple burst.
///
/// `phases` omits the implicit leading zero phase of the originating charge.
/// Missing coordinates are filled in by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RippleRecord {
    pub id: ChargeKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default)]
    pub phases: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

// =============================================================================
// CHARGE MAP
// =============================================================================

/// One entry of the replicated charge map.
///
/// `t0` is stamped when the hold starts and kept across moves; `t` is
/// refreshed on every write and drives relay-side expiry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeRecord {
    pub t0: i64,
    pub t: i64,
    pub x: f64,
    pub y: f64,
    pub r: f64,
    pub color: String,
}

/// A keyed charge record as broadcast in `charge:update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeEntry {
    pub key: ChargeKey,
    #[serde(flatten)]
    pub record: ChargeRecord,
}

/// Payload of `charge:remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRemoval {
    pub key: ChargeKey,
}

/// `charge:hold` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldCommand {
    pub id: ChargeKey,
    pub x: f64,
    pub y: f64,
    pub r: f64,
    pub color: String,
}

/// `charge:move` payload. A missing colour keeps the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCommand {
    pub id: ChargeKey,
    pub x: f64,
    pub y: f64,
    pub r: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// `charge:up` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpCommand {
    pub id: ChargeKey,
}

/// A write against the replicated charge map.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeCommand {
    Hold(HoldCommand),
    Move(MoveCommand),
    Up(UpCommand),
}

impl ChargeCommand {
    /// The syscall this command travels under.
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::Hold(_) => syscall::CHARGE_HOLD,
            Self::Move(_) => syscall::CHARGE_MOVE,
            Self::Up(_) => syscall::CHARGE_UP,
        }
    }

    /// Key of the map entry this command targets.
    #[must_use]
    pub fn id(&self) -> &ChargeKey {
        match self {
            Self::Hold(c) => &c.id,
            Self::Move(c) => &c.id,
            Self::Up(c) => &c.id,
        }
    }

    /// Decode a `charge:*` frame.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnexpectedSyscall`] for non-charge syscalls and
    /// [`RecordError::Json`] for malformed payloads.
    pub fn from_frame(frame: &Frame) -> Result<Self, RecordError> {
        match frame.syscall.as_str() {
            syscall::CHARGE_HOLD => Ok(Self::Hold(frame.record()?)),
            syscall::CHARGE_MOVE => Ok(Self::Move(frame.record()?)),
            syscall::CHARGE_UP => Ok(Self::Up(frame.record()?)),
            other => Err(RecordError::UnexpectedSyscall(other.to_owned())),
        }
    }

    fn to_data(&self) -> Result<Data, RecordError> {
        match self {
            Self::Hold(c) => record_to_data(c),
            Self::Move(c) => record_to_data(c),
            Self::Up(c) => record_to_data(c),
        }
    }
}

// =============================================================================
// OUTBOUND COMMANDS
// =============================================================================

/// Everything a client publishes to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorCommand {
    Ripple(RippleRecord),
    Charge(ChargeCommand),
}

impl MirrorCommand {
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::Ripple(_) => syscall::RIPPLE_EMIT,
            Self::Charge(c) => c.syscall(),
        }
    }

    /// Wrap the command in a request frame stamped at `ts`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the payload fails to serialize.
    pub fn to_frame(&self, ts: i64) -> Result<Frame, RecordError> {
        let data = match self {
            Self::Ripple(r) => record_to_data(r)?,
            Self::Charge(c) => c.to_data()?,
        };
        Ok(Frame::request_at(self.syscall(), data, ts))
    }
}

// =============================================================================
// MODE
// =============================================================================

/// Relay-wide mirror configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeRecord {
    pub min_ripples: u32,
    pub max_ripples: u32,
    /// Time in ms a ripple takes to expand.
    pub ripple_duration: f64,
    /// Time interval in ms over which a burst's ripples emit.
    pub ripple_spread: f64,
}

impl Default for ModeRecord {
    fn default() -> Self {
        Self { min_ripples: 2, max_ripples: 5, ripple_duration: 5000.0, ripple_spread: 300.0 }
    }
}

impl ModeRecord {
    /// Clamp the ripple range to `1 <= min <= max`.
    #[must_use]
    pub fn normalized(self) -> Self {
        let min_ripples = self.min_ripples.max(1);
        let max_ripples = self.max_ripples.max(1).max(min_ripples);
        Self { min_ripples, max_ripples, ..self }
    }
}

// =============================================================================
// SCOREBOARD
// =============================================================================

/// The three palette teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Green,
    Cyan,
    Magenta,
}

impl Team {
    /// Map a palette colour to its team. Non-palette colours score nothing.
    #[must_use]
    pub fn from_color(color: &str) -> Option<Self> {
        match color {
            "#80dc1a" => Some(Self::Green),
            "#56dbb6" => Some(Self::Cyan),
            "#c200fa" => Some(Self::Magenta),
            _ => None,
        }
    }
}

/// Per-team totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamScore {
    pub ripple_count: u64,
    /// Accumulated hold time in ms.
    pub charge_time: i64,
}

/// Totals for all teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scoreboard {
    pub green: TeamScore,
    pub cyan: TeamScore,
    pub magenta: TeamScore,
}

impl Scoreboard {
    #[must_use]
    pub fn team(&self, team: Team) -> &TeamScore {
        match team {
            Team::Green => &self.green,
            Team::Cyan => &self.cyan,
            Team::Magenta => &self.magenta,
        }
    }

    pub fn team_mut(&mut self, team: Team) -> &mut TeamScore {
        match team {
            Team::Green => &mut self.green,
            Team::Cyan => &mut self.cyan,
            Team::Magenta => &mut self.magenta,
        }
    }
}

// =============================================================================
// ROUNDING
// =============================================================================

/// Round half away from zero to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Truncate toward zero to `places` decimal places.
#[must_use]
pub fn truncate_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).trunc() / scale
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;
