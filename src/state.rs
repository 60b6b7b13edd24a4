//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the relay config and a map of live mirrors keyed by name. Each
//! mirror owns its connected clients plus the replicated state every client
//! sees: the charge map, the mode and the scoreboard. Ripple bursts are not
//! stored; they are broadcast and forgotten.

use std::collections::HashMap;
use std::sync::Arc;

use frames::{ChargeKey, ChargeRecord, Frame, ModeRecord, Scoreboard};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;

// =============================================================================
// MIRROR STATE
// =============================================================================

/// Per-mirror live state.
#[derive(Debug)]
pub struct MirrorState {
    /// Connected clients: client_id -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
    /// Held presses, keyed by `(session, press tag)`.
    pub charges: HashMap<ChargeKey, ChargeRecord>,
    pub mode: ModeRecord,
    pub scoreboard: Scoreboard,
}

impl MirrorState {
    #[must_use]
    pub fn new(mode: ModeRecord) -> Self {
        Self { clients: HashMap::new(), charges: HashMap::new(), mode, scoreboard: Scoreboard::default() }
    }
}

impl Default for MirrorState {
    fn default() -> Self {
        Self::new(ModeRecord::default())
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub mirrors: Arc<RwLock<HashMap<String, MirrorState>>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config: Arc::new(config), mirrors: Arc::new(RwLock::new(HashMap::new())) }
    }
}
