use std::path::PathBuf;

use touch_explorer::{load_config, ConfigError, ExplorerConfig};

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn fixture(name: &str) -> PathBuf {
    repo_root().join("tests").join("fixtures").join(name)
}

#[test]
fn shipped_config_matches_defaults() {
    let config = load_config(&repo_root().join("config/explorer.toml"))
        .expect("shipped config should load");
    assert_eq!(config, ExplorerConfig::default());
}

#[test]
fn tuned_fixture_overrides_only_named_keys() {
    let config = load_config(&fixture("valid_tuned.toml")).expect("fixture should load");

    assert_eq!(config.touch_slop_px, 12.0);
    assert_eq!(config.double_tap_slop_px, 140.0);
    assert_eq!(config.double_tap_timeout_ms, 250);
    assert_eq!(config.long_press_timeout_ms, 650);
    assert_eq!(config.min_gesture_velocity_px_per_ms, 1.2);
    assert_eq!(config.tap_timeout_ms, ExplorerConfig::default().tap_timeout_ms);
    assert!(config.touch_exploration_enabled);
}

#[test]
fn exploration_can_be_disabled() {
    let config =
        load_config(&fixture("valid_exploration_disabled.toml")).expect("fixture should load");
    assert!(!config.touch_exploration_enabled);
}

#[test]
fn semantic_validation_rejects_invalid_ranges() {
    let cases = [
        (
            "invalid/touch_slop_zero.toml",
            "exploration.touch_slop_px must be > 0",
        ),
        (
            "invalid/double_tap_slop_below_touch_slop.toml",
            "exploration.double_tap_slop_px must be >= exploration.touch_slop_px",
        ),
        (
            "invalid/long_press_not_after_tap.toml",
            "timeouts.long_press_ms must be > timeouts.tap_ms",
        ),
        (
            "invalid/gesture_duration_too_short.toml",
            "gestures.max_duration_ms must be > timeouts.double_tap_ms",
        ),
        (
            "invalid/segment_below_slop.toml",
            "gestures.min_segment_px must be >= exploration.touch_slop_px",
        ),
        (
            "invalid/angle_out_of_range.toml",
            "dragging.angle_cos must be within (-1, 1)",
        ),
    ];

    for (name, expected) in cases {
        let err = load_config(&fixture(name)).expect_err("fixture should fail validation");
        match err {
            ConfigError::Validation(msg) => {
                assert!(msg.contains(expected), "{name}: got `{msg}`")
            }
            other => panic!("{name}: expected validation error, got {other}"),
        }
    }
}

#[test]
fn schema_errors_are_parse_errors() {
    for name in ["invalid/unknown_key.toml", "invalid/wrong_type.toml"] {
        let err = load_config(&fixture(name)).expect_err("fixture should fail to parse");
        assert!(matches!(err, ConfigError::Parse(_)), "{name}: got {err}");
    }
}

#[test]
fn missing_file_is_io_error() {
    let err = load_config(&fixture("does_not_exist.toml")).expect_err("missing file");
    assert!(matches!(err, ConfigError::Io { .. }));
}
