use super::*;
use crate::config::{AmbientConfig, Config};
use crate::state::test_helpers;
use frames::{ChargeKey, RippleRecord};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;

fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Frame> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(frame);
    }
    out
}

fn ambient_state() -> AppState {
    AppState::new(Config { ambient: AmbientConfig { enabled: true, ..AmbientConfig::default() }, ..Config::default() })
}

#[test]
fn delay_stays_in_range() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..100 {
        let d = next_delay(500, 2000, &mut rng);
        assert!(d >= Duration::from_millis(500) && d < Duration::from_millis(2000));
    }
}

#[test]
fn empty_delay_range_uses_min() {
    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(next_delay(700, 700, &mut rng), Duration::from_millis(700));
    assert_eq!(next_delay(700, 100, &mut rng), Duration::from_millis(700));
}

#[tokio::test]
async fn sweep_emits_ambient_burst_to_occupied_mirrors() {
    let state = ambient_state();
    let (_client, mut rx) = test_helpers::attach_client(&state, "lobby", 8).await;

    assert_eq!(sweep(&state, 1_000).await, 1);

    let frames = drain(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].syscall, syscall::RIPPLE_BURST);
    let record: RippleRecord = frames[0].record().expect("burst payload");
    assert_eq!(record.id, ChargeKey::new("mirror", "ambient"));
    assert_eq!(record.color.as_deref(), Some(frames::AMBIENT_COLOR));
}

#[tokio::test]
async fn disabled_ambient_still_expires_charges() {
    let state = test_helpers::test_app_state();
    let (_client, mut rx) = test_helpers::attach_client(&state, "lobby", 8).await;
    {
        let mut mirrors = state.mirrors.write().await;
        let mirror = mirrors.get_mut("lobby").expect("mirror should exist");
        mirror.charges.insert(ChargeKey::new("abc", "mouse"), test_helpers::record_at(1_000, "#56dbb6"));
    }

    sweep(&state, 1_000 + state.config.charge_ttl_ms()).await;

    let syscalls: Vec<String> = drain(&mut rx).into_iter().map(|f| f.syscall).collect();
    assert_eq!(syscalls, vec![syscall::CHARGE_REMOVE.to_owned(), syscall::MIRROR_SCOREBOARD.to_owned()]);

    let mirrors = state.mirrors.read().await;
    let mirror = mirrors.get("lobby").expect("mirror should remain");
    assert!(mirror.charges.is_empty());
    assert_eq!(mirror.scoreboard.cyan.charge_time, state.config.charge_ttl_ms());
}

#[tokio::test]
async fn fresh_charges_survive_sweep() {
    let state = test_helpers::test_app_state();
    let (_client, _rx) = test_helpers::attach_client(&state, "lobby", 8).await;
    {
        let mut mirrors = state.mirrors.write().await;
        let mirror = mirrors.get_mut("lobby").expect("mirror should exist");
        mirror.charges.insert(ChargeKey::new("abc", "mouse"), test_helpers::record_at(1_000, "#56dbb6"));
    }

    assert_eq!(sweep(&state, 2_000).await, 0);
    assert_eq!(state.mirrors.read().await["lobby"].charges.len(), 1);
}

#[tokio::test]
async fn sweep_evicts_idle_mirrors_once_charges_expire() {
    let state = ambient_state();
    {
        let mut mirrors = state.mirrors.write().await;
        let mut idle = MirrorState::default();
        idle.charges.insert(ChargeKey::new("gone", "touch0"), test_helpers::record_at(1, "#80dc1a"));
        mirrors.insert("idle".to_owned(), idle);
    }

    sweep(&state, 10).await;
    assert!(state.mirrors.read().await.contains_key("idle"));

    sweep(&state, 1 + state.config.charge_ttl_ms()).await;
    assert!(!state.mirrors.read().await.contains_key("idle"));
}
