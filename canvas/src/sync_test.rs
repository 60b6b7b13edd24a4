#![allow(clippy::float_cmp)]

use frames::{ChargeRecord, Data, PALETTE, TeamScore};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;

use super::*;
use crate::charge::ChargeState;
use crate::mirror::{MirrorMode, PressEvent};
use crate::press::PressSource;

// =============================================================
// Helpers
// =============================================================

fn surface(seed: u64) -> MirrorSurface {
    MirrorSurface::with_rng(MirrorMode::default(), StdRng::seed_from_u64(seed))
}

fn notify_all(surface: &MirrorSurface, adapter: &mut SyncAdapter, events: Vec<PressEvent>) {
    for event in events {
        surface.notify(event, adapter);
    }
}

fn burst(session: &str, x: Option<f64>, y: Option<f64>, phases: Vec<f64>, color: Option<&str>) -> Frame {
    let record = RippleRecord {
        id: frames::ChargeKey::new(session, "mouse"),
        x,
        y,
        phases,
        color: color.map(str::to_owned),
    };
    Frame::request(syscall::RIPPLE_BURST, Data::new()).with_record(&record).unwrap()
}

fn update(session: &str, x: f64, y: f64, r: f64, t0: i64) -> Frame {
    let entry = ChargeEntry {
        key: frames::ChargeKey::new(session, "mouse"),
        record: ChargeRecord { t0, t: t0, x, y, r, color: "#56dbb6".to_owned() },
    };
    Frame::request(syscall::CHARGE_UPDATE, Data::new()).with_record(&entry).unwrap()
}

fn remove(session: &str) -> Frame {
    let removal = ChargeRemoval { key: frames::ChargeKey::new(session, "mouse") };
    Frame::request(syscall::CHARGE_REMOVE, Data::new()).with_record(&removal).unwrap()
}

// =============================================================
// Outbound
// =============================================================

#[test]
fn press_down_publishes_rounded_burst() {
    let mut s = surface(1);
    let mut adapter = SyncAdapter::default();
    let events = s.press_start(PressSource::Mouse, Point::new(0.123_456_7, 0.987_654_3), 0.0);
    notify_all(&s, &mut adapter, events);

    let [MirrorCommand::Ripple(record)] = adapter.publisher().pending() else {
        panic!("expected one burst, got {:?}", adapter.publisher().pending())
    };
    let charge = &s.charges()[0];
    assert_eq!(record.id, *charge.id());
    assert_eq!(record.x, Some(0.1235));
    assert_eq!(record.y, Some(0.9877));
    assert_eq!(record.phases.len(), charge.phases().len() - 1);
    for (sent, original) in record.phases.iter().zip(&charge.phases()[1..]) {
        assert_eq!(*sent, round_to(*original, 2));
    }
    assert_eq!(record.color.as_deref(), Some(s.color().to_hex().as_str()));
}

#[test]
fn hold_then_up_publishes_one_each() {
    let mut s = surface(2);
    let mut adapter = SyncAdapter::default();
    let mut events = s.press_start(PressSource::Mouse, Point::new(0.5, 0.5), 0.0);
    events.extend(s.tick(250.0));
    events.extend(s.tick(500.0));
    events.extend(s.tick(750.0));
    events.extend(s.press_end(PressSource::Mouse));
    notify_all(&s, &mut adapter, events);

    let syscalls: Vec<&str> = adapter.publisher().pending().iter().map(MirrorCommand::syscall).collect();
    assert_eq!(syscalls, vec![syscall::RIPPLE_EMIT, syscall::CHARGE_HOLD, syscall::CHARGE_UP]);
}

#[test]
fn zero_delay_hold_then_quick_up_publishes_one_each() {
    let mode = MirrorMode { press_delay: Some(0.0), ..MirrorMode::default() };
    let mut s = MirrorSurface::with_rng(mode, StdRng::seed_from_u64(7));
    let mut adapter = SyncAdapter::default();
    let mut events = s.press_start(PressSource::Mouse, Point::new(0.5, 0.5), 0.0);
    events.extend(s.tick(0.0));
    events.extend(s.tick(20.0));
    events.extend(s.press_end(PressSource::Mouse));
    notify_all(&s, &mut adapter, events);

    let syscalls: Vec<&str> = adapter.publisher().pending().iter().map(MirrorCommand::syscall).collect();
    assert_eq!(syscalls, vec![syscall::RIPPLE_EMIT, syscall::CHARGE_HOLD, syscall::CHARGE_UP]);
}

#[test]
fn hold_publishes_half_radius_and_color() {
    let mut s = surface(3);
    let mut adapter = SyncAdapter::default();
    s.press_start(PressSource::Mouse, Point::new(0.25, 0.75), 0.0);
    let events = s.tick(500.0);
    notify_all(&s, &mut adapter, events);

    let [MirrorCommand::Charge(ChargeCommand::Hold(hold))] = adapter.publisher().pending() else {
        panic!("expected a hold")
    };
    assert_eq!(hold.x, 0.25);
    assert_eq!(hold.y, 0.75);
    assert_eq!(hold.r, 20.0);
    assert_eq!(hold.color, s.color().to_hex());
}

#[test]
fn move_publishes_new_center() {
    let mut s = surface(4);
    let mut adapter = SyncAdapter::default();
    s.press_start(PressSource::Mouse, Point::new(0.25, 0.75), 0.0);
    s.tick(500.0);
    let events = s.press_move(PressSource::Mouse, Point::new(0.6, 0.4));
    notify_all(&s, &mut adapter, events);

    let [MirrorCommand::Charge(ChargeCommand::Move(mv))] = adapter.publisher().pending() else {
        panic!("expected a move")
    };
    assert_eq!((mv.x, mv.y), (0.6, 0.4));
    assert!(mv.color.is_some());
}

#[test]
fn short_tap_publishes_only_burst() {
    let mut s = surface(5);
    let mut adapter = SyncAdapter::default();
    let mut events = s.press_start(PressSource::Mouse, Point::new(0.5, 0.5), 0.0);
    events.extend(s.tick(100.0));
    events.extend(s.press_end(PressSource::Mouse));
    events.extend(s.tick(1000.0));
    notify_all(&s, &mut adapter, events);
    assert_eq!(adapter.publisher().pending().len(), 1);
}

#[test]
fn drain_frames_empties_outbox() {
    let mut s = surface(6);
    let mut adapter = SyncAdapter::default();
    let events = s.press_start(PressSource::Mouse, Point::new(0.5, 0.5), 0.0);
    notify_all(&s, &mut adapter, events);

    let frames = adapter.publisher_mut().drain_frames(1234).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].syscall, syscall::RIPPLE_EMIT);
    assert_eq!(frames[0].ts, 1234);
    assert_eq!(frames[0].status, Status::Request);
    assert!(adapter.publisher().is_empty());
}

// =============================================================
// Inbound bursts
// =============================================================

#[test]
fn remote_burst_creates_ripple_only_charge() {
    let mut s = surface(7);
    let mut adapter = SyncAdapter::default();
    let frame = burst("peer", Some(0.3), Some(0.6), vec![0.5, 0.25], Some("#c200fa"));
    assert_eq!(adapter.handle_frame(&mut s, &frame, 0.0).unwrap(), Inbound::Applied);

    let charge = &s.charges()[0];
    assert_eq!(charge.origin(), ChargeOrigin::RemoteBurst);
    assert_eq!(charge.phases(), &[0.0, 0.5, 0.25]);
    assert_eq!(charge.origin_point(), Point::new(0.3, 0.6));
    assert_eq!(charge.charge_color.value().to_hex(), "#c200fa");
    assert_eq!(charge.charge_radius.value(), 0.0);
    assert_eq!(charge.state(), ChargeState::Instant);
    assert!(s.tick(5000.0).is_empty());
    assert!(!s.charges()[0].is_pressed());
}

#[test]
fn own_burst_is_ignored() {
    let mut s = surface(8);
    let mut adapter = SyncAdapter::default();
    let frame = burst(&s.id().to_owned(), Some(0.3), Some(0.6), vec![], None);
    assert_eq!(adapter.handle_frame(&mut s, &frame, 0.0).unwrap(), Inbound::Ignored(IgnoreReason::SelfEcho));
    assert!(s.charges().is_empty());
}

#[test]
fn hidden_document_skips_bursts() {
    let mut s = surface(9);
    let mut adapter = SyncAdapter::default();
    adapter.set_hidden(true);
    let frame = burst("peer", Some(0.3), Some(0.6), vec![], None);
    assert_eq!(adapter.handle_frame(&mut s, &frame, 0.0).unwrap(), Inbound::Ignored(IgnoreReason::Hidden));
    assert!(s.charges().is_empty());
}

#[test]
fn burst_without_origin_gets_random_one() {
    let mut s = surface(10);
    let mut adapter = SyncAdapter::default();
    adapter.handle_frame(&mut s, &burst("peer", None, None, vec![], None), 0.0).unwrap();
    let origin = s.charges()[0].origin_point();
    assert!((0.0..1.0).contains(&origin.x));
    assert!((0.0..1.0).contains(&origin.y));
}

#[test]
fn burst_without_valid_color_uses_ambient() {
    let mut s = surface(11);
    let mut adapter = SyncAdapter::default();
    adapter.handle_frame(&mut s, &burst("peer", Some(0.1), Some(0.1), vec![], Some("teal")), 0.0).unwrap();
    adapter.handle_frame(&mut s, &burst("peer", Some(0.1), Some(0.1), vec![], None), 0.0).unwrap();
    for charge in s.charges() {
        assert_eq!(charge.ripple_color.value().to_hex(), AMBIENT_COLOR);
    }
}

// =============================================================
// Inbound map
// =============================================================

#[test]
fn update_creates_held_remote_charge() {
    let mut s = surface(12);
    let mut adapter = SyncAdapter::default();
    assert_eq!(adapter.handle_frame(&mut s, &update("peer", 0.2, 0.4, 20.0, 77), 1000.0).unwrap(), Inbound::Applied);

    let key = frames::ChargeKey::new("peer", "mouse");
    let charge = s.remote_charge(&key).unwrap();
    assert!(charge.is_pressed());
    assert_eq!(charge.t0, 77.0);
    assert_eq!(charge.center(), Point::new(0.2, 0.4));
    assert_eq!(charge.phases(), &[0.0]);
    assert_eq!(charge.charge_radius.value(), 0.0);
    assert_eq!(charge.charge_radius.state(), 20.0);

    s.tick(1000.0);
    s.tick(1300.0);
    assert_eq!(s.remote_charge(&key).unwrap().charge_radius.value(), 20.0);
}

#[test]
fn update_retargets_existing_charge() {
    let mut s = surface(13);
    let mut adapter = SyncAdapter::default();
    adapter.handle_frame(&mut s, &update("peer", 0.2, 0.4, 20.0, 10), 0.0).unwrap();
    s.tick(0.0);
    s.tick(300.0);
    adapter.handle_frame(&mut s, &update("peer", 0.6, 0.8, 10.0, 500), 300.0).unwrap();

    assert_eq!(s.charges().len(), 1);
    let key = frames::ChargeKey::new("peer", "mouse");
    let charge = s.remote_charge(&key).unwrap();
    assert_eq!(charge.t0, 500.0);
    assert_eq!(charge.center_x.state(), 0.6);
    assert_eq!(charge.charge_radius.state(), 10.0);

    s.tick(300.0);
    s.tick(450.0);
    let charge = s.remote_charge(&key).unwrap();
    assert!((charge.center_x.value() - 0.4).abs() < 1e-9);
    assert!((charge.charge_radius.value() - 15.0).abs() < 1e-9);
}

#[test]
fn update_without_radius_is_ignored() {
    let mut s = surface(14);
    let mut adapter = SyncAdapter::default();
    let zero = update("peer", 0.2, 0.4, 0.0, 1);
    assert_eq!(adapter.handle_frame(&mut s, &zero, 0.0).unwrap(), Inbound::Ignored(IgnoreReason::NoHold));

    let missing = Frame::request(syscall::CHARGE_UPDATE, Data::new()).with_data("key", json!(["peer", "touch1"]));
    assert_eq!(adapter.handle_frame(&mut s, &missing, 0.0).unwrap(), Inbound::Ignored(IgnoreReason::NoHold));
    assert!(s.charges().is_empty());
}

#[test]
fn own_update_and_remove_are_ignored() {
    let mut s = surface(15);
    let mut adapter = SyncAdapter::default();
    let me = s.id().to_owned();
    assert_eq!(
        adapter.handle_frame(&mut s, &update(&me, 0.2, 0.4, 20.0, 1), 0.0).unwrap(),
        Inbound::Ignored(IgnoreReason::SelfEcho)
    );
    assert_eq!(adapter.handle_frame(&mut s, &remove(&me), 0.0).unwrap(), Inbound::Ignored(IgnoreReason::SelfEcho));
    assert!(s.charges().is_empty());
}

#[test]
fn remove_drops_remote_hold() {
    let mut s = surface(16);
    let mut adapter = SyncAdapter::default();
    adapter.handle_frame(&mut s, &update("peer", 0.2, 0.4, 20.0, 1), 0.0).unwrap();
    assert_eq!(adapter.handle_frame(&mut s, &remove("peer"), 0.0).unwrap(), Inbound::Applied);
    assert!(s.charges().is_empty());
}

// =============================================================
// Resync
// =============================================================

#[test]
fn connect_drops_remote_but_keeps_local() {
    let mut s = surface(17);
    let mut adapter = SyncAdapter::default();
    s.press_start(PressSource::Mouse, Point::new(0.5, 0.5), 0.0);
    adapter.handle_frame(&mut s, &update("peer", 0.2, 0.4, 20.0, 1), 0.0).unwrap();
    adapter.handle_frame(&mut s, &burst("other", Some(0.1), Some(0.1), vec![], None), 0.0).unwrap();
    assert_eq!(s.charges().len(), 3);

    let connected = Frame::request(syscall::SESSION_CONNECTED, Data::new()).with_data("client_id", "c-1");
    assert_eq!(adapter.handle_frame(&mut s, &connected, 0.0).unwrap(), Inbound::Applied);
    assert_eq!(s.charges().len(), 1);
    assert_eq!(s.charges()[0].origin(), ChargeOrigin::Local);
    assert_eq!(adapter.client_id(), Some("c-1"));
}

#[test]
fn disconnect_drops_remote() {
    let mut s = surface(18);
    let mut adapter = SyncAdapter::default();
    adapter.handle_frame(&mut s, &update("p1", 0.2, 0.4, 20.0, 1), 0.0).unwrap();
    adapter.handle_frame(&mut s, &update("p2", 0.2, 0.4, 20.0, 1), 0.0).unwrap();
    assert_eq!(adapter.on_disconnect(&mut s), 2);
    assert!(s.charges().is_empty());
    assert_eq!(adapter.client_id(), None);
}

#[test]
fn reconnect_snapshot_rebuilds_map() {
    let mut s = surface(19);
    let mut adapter = SyncAdapter::default();
    adapter.handle_frame(&mut s, &update("p1", 0.2, 0.4, 20.0, 1), 0.0).unwrap();
    adapter.on_disconnect(&mut s);
    let connected = Frame::request(syscall::SESSION_CONNECTED, Data::new());
    adapter.handle_frame(&mut s, &connected, 10.0).unwrap();
    adapter.handle_frame(&mut s, &update("p1", 0.3, 0.4, 20.0, 1), 10.0).unwrap();
    assert_eq!(s.charges().len(), 1);
}

// =============================================================
// Mode, scoreboard, lifecycle, errors
// =============================================================

#[test]
fn mode_frame_updates_surface() {
    let mut s = surface(20);
    let mut adapter = SyncAdapter::default();
    let record = ModeRecord { min_ripples: 1, max_ripples: 1, ripple_duration: 800.0, ripple_spread: 100.0 };
    let frame = Frame::request(syscall::MIRROR_MODE, Data::new()).with_record(&record).unwrap();
    adapter.handle_frame(&mut s, &frame, 0.0).unwrap();
    assert_eq!(s.mode.min_ripples, 1);
    assert_eq!(s.mode.ripple_duration, 800.0);
    assert_eq!(adapter.mode(), Some(&record));

    s.press_start(PressSource::Mouse, Point::new(0.5, 0.5), 0.0);
    assert_eq!(s.charges()[0].ripples().len(), 1);
}

#[test]
fn scoreboard_frame_is_stored() {
    let mut s = surface(21);
    let mut adapter = SyncAdapter::default();
    let board = Scoreboard { green: TeamScore { ripple_count: 4, charge_time: 900 }, ..Scoreboard::default() };
    let frame = Frame::request(syscall::MIRROR_SCOREBOARD, Data::new()).with_record(&board).unwrap();
    adapter.handle_frame(&mut s, &frame, 0.0).unwrap();
    assert_eq!(adapter.scoreboard(), Some(&board));
}

#[test]
fn closed_adapter_ignores_everything() {
    let mut s = surface(22);
    let mut adapter = SyncAdapter::default();
    adapter.close();
    let frame = burst("peer", Some(0.1), Some(0.1), vec![], None);
    assert_eq!(adapter.handle_frame(&mut s, &frame, 0.0).unwrap(), Inbound::Ignored(IgnoreReason::Closed));
    adapter.open();
    assert_eq!(adapter.handle_frame(&mut s, &frame, 0.0).unwrap(), Inbound::Applied);
}

#[test]
fn error_frames_are_rejected() {
    let mut s = surface(23);
    let mut adapter = SyncAdapter::default();
    let request = Frame::request(syscall::CHARGE_HOLD, Data::new());
    let error = request.error("bad hold");
    assert_eq!(adapter.handle_frame(&mut s, &error, 0.0).unwrap(), Inbound::Ignored(IgnoreReason::Rejected));
}

#[test]
fn unknown_syscall_is_ignored() {
    let mut s = surface(24);
    let mut adapter = SyncAdapter::default();
    let frame = Frame::request("board:join", Data::new());
    assert_eq!(adapter.handle_frame(&mut s, &frame, 0.0).unwrap(), Inbound::Ignored(IgnoreReason::Unknown));
}

#[test]
fn malformed_payload_is_an_error() {
    let mut s = surface(25);
    let mut adapter = SyncAdapter::default();
    let frame = Frame::request(syscall::RIPPLE_BURST, Data::new()).with_data("id", "not-a-key");
    assert!(adapter.handle_frame(&mut s, &frame, 0.0).is_err());
}

// =============================================================
// Two clients
// =============================================================

/// Relay stand-in: rebroadcast an emitted burst under the burst syscall.
fn relay_burst(frame: &Frame) -> Frame {
    let mut out = frame.clone();
    out.syscall = syscall::RIPPLE_BURST.to_owned();
    out
}

#[test]
fn burst_round_trip_between_clients() {
    let mut a = surface(100);
    let mut b = surface(200);
    let mut a_sync = SyncAdapter::default();
    let mut b_sync = SyncAdapter::default();

    let events = a.press_start(PressSource::Mouse, Point::new(0.42, 0.58), 0.0);
    notify_all(&a, &mut a_sync, events);
    let sent = a_sync.publisher_mut().drain_frames(0).unwrap();
    let record: RippleRecord = sent[0].record().unwrap();
    assert_eq!(record.phases.len(), a.charges()[0].phases().len() - 1);

    let delivered = relay_burst(&sent[0]);
    assert_eq!(a_sync.handle_frame(&mut a, &delivered, 0.0).unwrap(), Inbound::Ignored(IgnoreReason::SelfEcho));
    assert_eq!(b_sync.handle_frame(&mut b, &delivered, 0.0).unwrap(), Inbound::Applied);

    let local = &a.charges()[0];
    let remote = &b.charges()[0];
    assert!((remote.origin_point().x - local.origin_point().x).abs() <= 1e-4);
    assert!((remote.origin_point().y - local.origin_point().y).abs() <= 1e-4);
    assert_eq!(remote.ripples().len(), local.ripples().len());
    assert_eq!(remote.phases()[0], 0.0);
    assert!(PALETTE.contains(&remote.charge_color.value().to_hex().as_str()));
}
