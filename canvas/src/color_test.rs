#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

// --- Parsing ---

#[test]
fn parse_six_digit_hex() {
    let c: Color = "#80dc1a".parse().unwrap();
    assert_eq!(c, Color::rgb(128.0, 220.0, 26.0));
}

#[test]
fn parse_three_digit_hex_expands_nibbles() {
    let c: Color = "#f0a".parse().unwrap();
    assert_eq!(c, Color::rgb(255.0, 0.0, 170.0));
}

#[test]
fn parse_is_case_insensitive() {
    let lower: Color = "#c200fa".parse().unwrap();
    let upper: Color = "#C200FA".parse().unwrap();
    assert_eq!(lower, upper);
}

#[test]
fn parse_rejects_missing_hash() {
    assert_eq!("80dc1a".parse::<Color>(), Err(ColorError("80dc1a".to_owned())));
}

#[test]
fn parse_rejects_bad_length_and_digits() {
    assert!("#80dc1".parse::<Color>().is_err());
    assert!("#zzzzzz".parse::<Color>().is_err());
    assert!("#".parse::<Color>().is_err());
}

#[test]
fn parse_rejects_non_ascii_without_panicking() {
    assert!("#éé".parse::<Color>().is_err());
}

// --- Formatting ---

#[test]
fn to_hex_round_trips_palette() {
    for hex in ["#80dc1a", "#56dbb6", "#c200fa", "#00a6ed"] {
        let c: Color = hex.parse().unwrap();
        assert_eq!(c.to_hex(), hex);
    }
}

#[test]
fn to_hex_clamps_out_of_range_channels() {
    let c = Color::rgb(300.0, -5.0, 127.6);
    assert_eq!(c.to_hex(), "#ff0080");
}

#[test]
fn to_css_opaque_is_hex() {
    assert_eq!(Color::rgb(0.0, 166.0, 237.0).to_css(), "#00a6ed");
}

#[test]
fn to_css_translucent_is_rgba() {
    let c = Color::rgb(128.0, 220.0, 26.0).alpha(0.25);
    assert_eq!(c.to_css(), "rgba(128,220,26,0.25)");
}

#[test]
fn display_matches_to_css() {
    let c = Color::rgb(1.0, 2.0, 3.0).alpha(0.5);
    assert_eq!(c.to_string(), c.to_css());
}

// --- Darker / alpha / mix ---

#[test]
fn darker_zero_is_identity() {
    let c = Color::rgb(100.0, 150.0, 200.0);
    assert_eq!(c.darker(0.0), c);
}

#[test]
fn darker_one_scales_by_point_seven() {
    let c = Color::rgb(100.0, 200.0, 10.0).darker(1.0);
    assert!(approx_eq(c.r, 70.0));
    assert!(approx_eq(c.g, 140.0));
    assert!(approx_eq(c.b, 7.0));
}

#[test]
fn darker_preserves_alpha() {
    let c = Color::rgb(100.0, 100.0, 100.0).alpha(0.3).darker(2.0);
    assert_eq!(c.a, 0.3);
}

#[test]
fn mix_endpoints_and_midpoint() {
    let a = Color::rgb(0.0, 0.0, 0.0).alpha(0.0);
    let b = Color::rgb(200.0, 100.0, 50.0);
    assert_eq!(a.mix(b, 0.0), a);
    assert_eq!(a.mix(b, 1.0), b);
    let mid = a.mix(b, 0.5);
    assert!(approx_eq(mid.r, 100.0));
    assert!(approx_eq(mid.g, 50.0));
    assert!(approx_eq(mid.b, 25.0));
    assert!(approx_eq(mid.a, 0.5));
}

#[test]
fn default_is_opaque_black() {
    assert_eq!(Color::default(), Color::rgb(0.0, 0.0, 0.0));
    assert_eq!(Color::default().a, 1.0);
}
