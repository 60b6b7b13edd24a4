//! Ambient task: relay-generated ripples and stale-charge expiry.
//!
//! DESIGN
//! ======
//! One background loop serves every mirror. Each pass sleeps a random delay
//! in `[min_delay_ms, max_delay_ms)`, then sweeps all mirrors under a single
//! write lock: mirrors with clients get one ambient burst (when enabled),
//! every mirror has its stale charges expired, and mirrors left with no
//! clients and no charges are evicted.

use std::time::Duration;

use frames::{Frame, now_ms, syscall};
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::services::mirror::{self, MirrorError};
use crate::state::{AppState, MirrorState};

/// Spawn the ambient loop. Returns a handle for shutdown.
pub fn spawn_ambient_task(state: AppState) -> JoinHandle<()> {
    let ambient = state.config.ambient;
    info!(
        enabled = ambient.enabled,
        min_delay_ms = ambient.min_delay_ms,
        max_delay_ms = ambient.max_delay_ms,
        "ambient ripples configured"
    );
    tokio::spawn(async move {
        loop {
            let delay = next_delay(ambient.min_delay_ms, ambient.max_delay_ms, &mut rand::rng());
            tokio::time::sleep(delay).await;
            sweep(&state, now_ms()).await;
        }
    })
}

/// Uniform delay in `[min, max)`, or exactly `min` when the range is empty.
pub fn next_delay(min_ms: u64, max_ms: u64, rng: &mut impl Rng) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rng.random_range(min_ms..max_ms))
}

/// One pass over every mirror. Returns the number of frames broadcast.
pub async fn sweep(state: &AppState, now: i64) -> usize {
    let ttl_ms = state.config.charge_ttl_ms();
    let emit = state.config.ambient.enabled;

    let mut mirrors = state.mirrors.write().await;
    let mut sent = 0;
    for (name, mirror_state) in mirrors.iter_mut() {
        match sweep_mirror(mirror_state, now, ttl_ms, emit) {
            Ok(out) => {
                for frame in &out {
                    mirror::fan_out(mirror_state, frame, None);
                }
                sent += out.len();
            }
            Err(e) => warn!(mirror = %name, error = %e, "ambient sweep failed"),
        }
    }
    mirrors.retain(|name, m| {
        let keep = !m.clients.is_empty() || !m.charges.is_empty();
        if !keep {
            info!(mirror = %name, "evicted idle mirror");
        }
        keep
    });
    sent
}

fn sweep_mirror(mirror_state: &mut MirrorState, now: i64, ttl_ms: i64, emit: bool) -> Result<Vec<Frame>, MirrorError> {
    let mut out = mirror::expire_charges(mirror_state, now, ttl_ms)?;
    if emit && !mirror_state.clients.is_empty() {
        let record = mirror::ambient_ripple(&mirror_state.mode, &mut rand::rng());
        out.push(Frame::request(syscall::RIPPLE_BURST, frames::Data::new()).with_record(&record)?);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "ambient_test.rs"]
mod tests;
