use std::collections::HashMap;

use super::*;

fn config_from(pairs: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    Config::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn empty_environment_uses_defaults() {
    let config = config_from(&[]);
    assert_eq!(config, Config::default());
    assert_eq!(config.port, 3000);
    assert_eq!(config.mode.min_ripples, 2);
    assert_eq!(config.mode.max_ripples, 5);
    assert!(config.ambient.enabled);
    assert_eq!(config.charge_ttl, Duration::from_secs(60));
    assert_eq!(config.charge_ttl_ms(), 60_000);
}

#[test]
fn overrides_are_parsed() {
    let config = config_from(&[
        ("PORT", "8080"),
        ("MIRROR_MIN_RIPPLES", "3"),
        ("MIRROR_MAX_RIPPLES", "7"),
        ("MIRROR_RIPPLE_DURATION_MS", "2500"),
        ("MIRROR_RIPPLE_SPREAD_MS", "150"),
        ("AMBIENT_MIN_DELAY_MS", "100"),
        ("AMBIENT_MAX_DELAY_MS", "200"),
        ("CHARGE_TTL_SECS", "5"),
    ]);
    assert_eq!(config.port, 8080);
    assert_eq!(config.mode.min_ripples, 3);
    assert_eq!(config.mode.max_ripples, 7);
    assert!((config.mode.ripple_duration - 2500.0).abs() < f64::EPSILON);
    assert!((config.mode.ripple_spread - 150.0).abs() < f64::EPSILON);
    assert_eq!(config.ambient.min_delay_ms, 100);
    assert_eq!(config.ambient.max_delay_ms, 200);
    assert_eq!(config.charge_ttl_ms(), 5000);
}

#[test]
fn garbage_values_fall_back() {
    let config = config_from(&[("PORT", "nope"), ("CHARGE_TTL_SECS", "-1")]);
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.charge_ttl, Duration::from_secs(DEFAULT_CHARGE_TTL_SECS));
}

#[test]
fn ripple_range_is_normalized() {
    let config = config_from(&[("MIRROR_MIN_RIPPLES", "0"), ("MIRROR_MAX_RIPPLES", "0")]);
    assert_eq!(config.mode.min_ripples, 1);
    assert_eq!(config.mode.max_ripples, 1);

    let config = config_from(&[("MIRROR_MIN_RIPPLES", "6"), ("MIRROR_MAX_RIPPLES", "2")]);
    assert_eq!(config.mode.max_ripples, 6);
}

#[test]
fn ambient_delay_range_never_inverts() {
    let config = config_from(&[("AMBIENT_MIN_DELAY_MS", "3000")]);
    assert_eq!(config.ambient.max_delay_ms, 3000);
}

#[test]
fn ambient_flag_variants() {
    for off in ["0", "false", "OFF", "no"] {
        assert!(!config_from(&[("AMBIENT_ENABLED", off)]).ambient.enabled, "{off}");
    }
    for on in ["1", "true", "yes"] {
        assert!(config_from(&[("AMBIENT_ENABLED", on)]).ambient.enabled, "{on}");
    }
}
