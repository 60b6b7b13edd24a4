//! Shared frame model for the mirror's realtime WS transport.
//!
//! This crate owns the wire representation used by both the relay server and
//! the browser `canvas` core. Every websocket message is a JSON [`Frame`]; the
//! typed mirror payloads (bursts, charge records, commands) live in
//! [`records`] and travel as the frame's flat `data` map.
//!
//! DESIGN
//! ======
//! - Flat data: payload is always a `String -> Value` map.
//! - Responses correlate to requests via `parent_id`.
//! - Routing happens on the `syscall` prefix (`"ripple:"`, `"charge:"`,
//!   `"mirror:"`, `"session:"`) and never inspects `data`.

pub mod records;

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use records::{
    AMBIENT_COLOR, ChargeCommand, ChargeEntry, ChargeKey, ChargeRecord, ChargeRemoval, DEFAULT_COLOR, HoldCommand,
    MirrorCommand, ModeRecord, MoveCommand, PALETTE, RippleRecord, Scoreboard, Team, TeamScore, UpCommand, round_to,
    truncate_to,
};

// =============================================================================
// SYSCALLS
// =============================================================================

/// Namespaced operation names carried in [`Frame::syscall`].
pub mod syscall {
    /// Client → relay: publish a one-shot ripple burst.
    pub const RIPPLE_EMIT: &str = "ripple:emit";
    /// Relay → clients: a ripple burst was emitted.
    pub const RIPPLE_BURST: &str = "ripple:burst";
    /// Client → relay: a press became a hold.
    pub const CHARGE_HOLD: &str = "charge:hold";
    /// Client → relay: a held press moved.
    pub const CHARGE_MOVE: &str = "charge:move";
    /// Client → relay: a held press was released.
    pub const CHARGE_UP: &str = "charge:up";
    /// Relay → clients: a charge map entry was inserted or replaced.
    pub const CHARGE_UPDATE: &str = "charge:update";
    /// Relay → clients: a charge map entry was removed.
    pub const CHARGE_REMOVE: &str = "charge:remove";
    /// Both directions: mirror mode (ripple count range, timing).
    pub const MIRROR_MODE: &str = "mirror:mode";
    /// Relay → clients: team scoreboard.
    pub const MIRROR_SCOREBOARD: &str = "mirror:scoreboard";
    /// Relay → client: the socket is live; carries the relay's `client_id`.
    pub const SESSION_CONNECTED: &str = "session:connected";
    /// Relay → client: a frame could not be parsed.
    pub const GATEWAY_ERROR: &str = "gateway:error";
}

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// Error returned when a frame payload does not match the expected record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The payload could not be converted to or from the typed record.
    #[error("invalid record payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The record serialized to something other than a JSON object.
    #[error("record is not an object")]
    NotAnObject,
    /// The frame carries a syscall the decoder does not handle.
    #[error("unexpected syscall: {0}")]
    UnexpectedSyscall(String),
}

/// Lifecycle position of a frame in a request/response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Item,
    Done,
    Error,
    Cancel,
}

impl Status {
    /// Terminal statuses end a response stream.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Error | Status::Cancel)
    }
}

/// The universal message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Milliseconds since Unix epoch.
    pub ts: i64,
    pub from: Option<String>,
    pub syscall: String,
    pub status: Status,
    #[serde(default)]
    pub data: Data,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
///
/// Only meaningful on native targets; browser callers pass their own clock
/// to [`Frame::request_at`].
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Create a request frame stamped with the system clock.
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self::request_at(syscall, data, now_ms())
    }

    /// Create a request frame with an explicit timestamp.
    pub fn request_at(syscall: impl Into<String>, data: Data, ts: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Create an item response carrying one result.
    #[must_use]
    pub fn item(&self, data: Data) -> Self {
        self.reply(Status::Item, data)
    }

    /// Create a done response. Terminal, carries no data.
    #[must_use]
    pub fn done(&self) -> Self {
        self.reply(Status::Done, Data::new())
    }

    /// Create a done response carrying data. Terminal.
    #[must_use]
    pub fn done_with(&self, data: Data) -> Self {
        self.reply(Status::Done, data)
    }

    /// Create an error response from a plain string. Terminal.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_MESSAGE.into(), serde_json::Value::String(message.into()));
        self.reply(Status::Error, data)
    }

    /// Create a structured error response from a typed error. Terminal.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_CODE.into(), serde_json::Value::String(err.error_code().to_string()));
        data.insert(FRAME_MESSAGE.into(), serde_json::Value::String(err.to_string()));
        data.insert(FRAME_RETRYABLE.into(), serde_json::Value::Bool(err.retryable()));
        self.reply(Status::Error, data)
    }

    /// Build a reply frame. Inherits `parent_id` and `syscall`.
    fn reply(&self, status: Status, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: now_ms(),
            from: None,
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merge the fields of a typed record into `data`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the record does not serialize to a JSON object.
    pub fn with_record<T: Serialize>(mut self, record: &T) -> Result<Self, RecordError> {
        self.data.extend(record_to_data(record)?);
        Ok(self)
    }

    /// Decode `data` as a typed record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Json`] when required fields are missing or mistyped.
    pub fn record<T: DeserializeOwned>(&self) -> Result<T, RecordError> {
        let object: serde_json::Map<String, serde_json::Value> =
            self.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }
}

/// Serialize a typed record into a flat frame payload.
///
/// # Errors
///
/// Returns [`RecordError`] if serialization fails or yields a non-object.
pub fn record_to_data<T: Serialize>(record: &T) -> Result<Data, RecordError> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(RecordError::NotAnObject),
    }
}

// =============================================================================
// ROUTING
// =============================================================================

impl Frame {
    /// Extract the syscall prefix (everything before the first ':').
    #[must_use]
    pub fn prefix(&self) -> &str {
        let Some((prefix, _)) = self.syscall.split_once(':') else {
            return &self.syscall;
        };
        prefix
    }

    /// Extract the syscall operation (everything after the first ':').
    #[must_use]
    pub fn op(&self) -> &str {
        self.syscall.split_once(':').map_or("", |(_, op)| op)
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
