//! Shared numeric constants for the canvas crate. All times are milliseconds.

// ── Charge ──────────────────────────────────────────────────────

/// Time for a charge disc to grow from 0 to its radius once held.
pub const PRESS_RADIUS_MS: f64 = 300.0;

/// Duration of one jitter step.
pub const JITTER_STEP_MS: f64 = 10.0;

/// Default delay between press-down and hold.
pub const DEFAULT_PRESS_DELAY_MS: f64 = 500.0;

/// Default time for a ripple to expand.
pub const DEFAULT_RIPPLE_DURATION_MS: f64 = 5000.0;

/// Default interval over which a charge's ripples emit.
pub const DEFAULT_RIPPLE_SPREAD_MS: f64 = 300.0;

/// Default charge disc radius in pixels.
pub const DEFAULT_CHARGE_RADIUS: f64 = 40.0;

/// Default jitter amplitude in pixels.
pub const DEFAULT_JITTER_RADIUS: f64 = 4.0;

// ── Rendering ───────────────────────────────────────────────────

/// Ripple ring stroke width.
pub const RIPPLE_LINE_WIDTH: f64 = 1.0;

/// Bond stroke width.
pub const BOND_LINE_WIDTH: f64 = 4.0;

/// Period of the bond pulse triangle wave.
pub const BOND_PULSE_MS: f64 = 2000.0;

// ── Sync ────────────────────────────────────────────────────────

/// Transition used when a remote hold record changes.
pub const REMOTE_TWEEN_MS: f64 = 300.0;

/// Decimal places kept for published coordinates.
pub const COORD_PLACES: i32 = 4;

/// Decimal places kept for published ripple phases.
pub const PHASE_PLACES: i32 = 2;

/// Length of the random per-session id.
pub const SESSION_ID_LEN: usize = 8;
