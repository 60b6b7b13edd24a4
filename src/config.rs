//! Relay configuration parsed from environment variables.
//!
//! Every knob has a default so the relay starts with an empty environment.
//! Unparseable values fall back to the default rather than aborting startup.

use std::time::Duration;

use frames::ModeRecord;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_AMBIENT_MIN_DELAY_MS: u64 = 500;
pub const DEFAULT_AMBIENT_MAX_DELAY_MS: u64 = 2000;
pub const DEFAULT_CHARGE_TTL_SECS: u64 = 60;

/// Timing for the relay-generated ambient ripples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbientConfig {
    pub enabled: bool,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self { enabled: true, min_delay_ms: DEFAULT_AMBIENT_MIN_DELAY_MS, max_delay_ms: DEFAULT_AMBIENT_MAX_DELAY_MS }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    /// Mode every new mirror starts with.
    pub mode: ModeRecord,
    pub ambient: AmbientConfig,
    /// Charge records whose `t` is older than this are expired.
    pub charge_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mode: ModeRecord::default(),
            ambient: AmbientConfig::default(),
            charge_ttl: Duration::from_secs(DEFAULT_CHARGE_TTL_SECS),
        }
    }
}

impl Config {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `MIRROR_MIN_RIPPLES` / `MIRROR_MAX_RIPPLES`: default 2 / 5
    /// - `MIRROR_RIPPLE_DURATION_MS` / `MIRROR_RIPPLE_SPREAD_MS`: default 5000 / 300
    /// - `AMBIENT_ENABLED`: default true
    /// - `AMBIENT_MIN_DELAY_MS` / `AMBIENT_MAX_DELAY_MS`: default 500 / 2000
    /// - `CHARGE_TTL_SECS`: default 60
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ModeRecord::default();
        let mode = ModeRecord {
            min_ripples: parse_or(&lookup, "MIRROR_MIN_RIPPLES", defaults.min_ripples),
            max_ripples: parse_or(&lookup, "MIRROR_MAX_RIPPLES", defaults.max_ripples),
            ripple_duration: parse_or(&lookup, "MIRROR_RIPPLE_DURATION_MS", defaults.ripple_duration),
            ripple_spread: parse_or(&lookup, "MIRROR_RIPPLE_SPREAD_MS", defaults.ripple_spread),
        }
        .normalized();

        let min_delay_ms = parse_or(&lookup, "AMBIENT_MIN_DELAY_MS", DEFAULT_AMBIENT_MIN_DELAY_MS);
        let max_delay_ms = parse_or(&lookup, "AMBIENT_MAX_DELAY_MS", DEFAULT_AMBIENT_MAX_DELAY_MS).max(min_delay_ms);
        let ambient = AmbientConfig {
            enabled: lookup("AMBIENT_ENABLED").map_or(true, |v| parse_flag(&v)),
            min_delay_ms,
            max_delay_ms,
        };

        Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            mode,
            ambient,
            charge_ttl: Duration::from_secs(parse_or(&lookup, "CHARGE_TTL_SECS", DEFAULT_CHARGE_TTL_SECS)),
        }
    }

    /// Charge TTL in milliseconds, saturating.
    #[must_use]
    pub fn charge_ttl_ms(&self) -> i64 {
        i64::try_from(self.charge_ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_flag(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
