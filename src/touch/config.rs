use std::{fs, path::Path};

use serde::Deserialize;

use super::error::ConfigError;

pub const DEFAULT_TOUCH_SLOP_PX: f32 = 8.0;
pub const DEFAULT_DOUBLE_TAP_SLOP_PX: f32 = 100.0;
pub const DEFAULT_TAP_TIMEOUT_MS: u64 = 180;
pub const DEFAULT_DOUBLE_TAP_TIMEOUT_MS: u64 = 300;
pub const DEFAULT_LONG_PRESS_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_MIN_GESTURE_VELOCITY_PX_PER_MS: f32 = 0.8;
pub const DEFAULT_MAX_GESTURE_DURATION_MS: u64 = 2_000;
pub const DEFAULT_MIN_GESTURE_SEGMENT_PX: f32 = 40.0;
pub const DEFAULT_DRAGGING_ANGLE_COS: f32 = 0.525;

/// Runtime thresholds of the explorer. Build one with `Default` or from TOML
/// through [`parse_config`]/[`load_config`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExplorerConfig {
    pub touch_exploration_enabled: bool,
    pub touch_slop_px: f32,
    pub double_tap_slop_px: f32,
    /// Longest press of a second-finger tap.
    pub tap_timeout_ms: u64,
    /// Window between taps; also the delay before a held finger starts
    /// exploring.
    pub double_tap_timeout_ms: u64,
    pub long_press_timeout_ms: u64,
    pub min_gesture_velocity_px_per_ms: f32,
    pub max_gesture_duration_ms: u64,
    pub min_gesture_segment_px: f32,
    pub dragging_angle_cos: f32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            touch_exploration_enabled: true,
            touch_slop_px: DEFAULT_TOUCH_SLOP_PX,
            double_tap_slop_px: DEFAULT_DOUBLE_TAP_SLOP_PX,
            tap_timeout_ms: DEFAULT_TAP_TIMEOUT_MS,
            double_tap_timeout_ms: DEFAULT_DOUBLE_TAP_TIMEOUT_MS,
            long_press_timeout_ms: DEFAULT_LONG_PRESS_TIMEOUT_MS,
            min_gesture_velocity_px_per_ms: DEFAULT_MIN_GESTURE_VELOCITY_PX_PER_MS,
            max_gesture_duration_ms: DEFAULT_MAX_GESTURE_DURATION_MS,
            min_gesture_segment_px: DEFAULT_MIN_GESTURE_SEGMENT_PX,
            dragging_angle_cos: DEFAULT_DRAGGING_ANGLE_COS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    exploration: ExplorationSection,
    #[serde(default)]
    timeouts: TimeoutsSection,
    #[serde(default)]
    gestures: GesturesSection,
    #[serde(default)]
    dragging: DraggingSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ExplorationSection {
    enabled: bool,
    touch_slop_px: f32,
    double_tap_slop_px: f32,
}

impl Default for ExplorationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            touch_slop_px: DEFAULT_TOUCH_SLOP_PX,
            double_tap_slop_px: DEFAULT_DOUBLE_TAP_SLOP_PX,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TimeoutsSection {
    tap_ms: u64,
    double_tap_ms: u64,
    long_press_ms: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            tap_ms: DEFAULT_TAP_TIMEOUT_MS,
            double_tap_ms: DEFAULT_DOUBLE_TAP_TIMEOUT_MS,
            long_press_ms: DEFAULT_LONG_PRESS_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GesturesSection {
    min_velocity_px_per_ms: f32,
    max_duration_ms: u64,
    min_segment_px: f32,
}

impl Default for GesturesSection {
    fn default() -> Self {
        Self {
            min_velocity_px_per_ms: DEFAULT_MIN_GESTURE_VELOCITY_PX_PER_MS,
            max_duration_ms: DEFAULT_MAX_GESTURE_DURATION_MS,
            min_segment_px: DEFAULT_MIN_GESTURE_SEGMENT_PX,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DraggingSection {
    angle_cos: f32,
}

impl Default for DraggingSection {
    fn default() -> Self {
        Self {
            angle_cos: DEFAULT_DRAGGING_ANGLE_COS,
        }
    }
}

impl From<ConfigFile> for ExplorerConfig {
    fn from(file: ConfigFile) -> Self {
        Self {
            touch_exploration_enabled: file.exploration.enabled,
            touch_slop_px: file.exploration.touch_slop_px,
            double_tap_slop_px: file.exploration.double_tap_slop_px,
            tap_timeout_ms: file.timeouts.tap_ms,
            double_tap_timeout_ms: file.timeouts.double_tap_ms,
            long_press_timeout_ms: file.timeouts.long_press_ms,
            min_gesture_velocity_px_per_ms: file.gestures.min_velocity_px_per_ms,
            max_gesture_duration_ms: file.gestures.max_duration_ms,
            min_gesture_segment_px: file.gestures.min_segment_px,
            dragging_angle_cos: file.dragging.angle_cos,
        }
    }
}

pub fn load_config(path: &Path) -> Result<ExplorerConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<ExplorerConfig, ConfigError> {
    let file: ConfigFile =
        toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
    let config = ExplorerConfig::from(file);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ExplorerConfig) -> Result<(), ConfigError> {
    if !(config.touch_slop_px > 0.0) {
        return Err(validation("exploration.touch_slop_px must be > 0"));
    }
    if config.double_tap_slop_px < config.touch_slop_px {
        return Err(validation(
            "exploration.double_tap_slop_px must be >= exploration.touch_slop_px",
        ));
    }
    if config.tap_timeout_ms == 0 {
        return Err(validation("timeouts.tap_ms must be > 0"));
    }
    if config.double_tap_timeout_ms == 0 {
        return Err(validation("timeouts.double_tap_ms must be > 0"));
    }
    if config.long_press_timeout_ms <= config.tap_timeout_ms {
        return Err(validation("timeouts.long_press_ms must be > timeouts.tap_ms"));
    }
    if !(config.min_gesture_velocity_px_per_ms > 0.0) {
        return Err(validation("gestures.min_velocity_px_per_ms must be > 0"));
    }
    if config.max_gesture_duration_ms <= config.double_tap_timeout_ms {
        return Err(validation(
            "gestures.max_duration_ms must be > timeouts.double_tap_ms",
        ));
    }
    if config.min_gesture_segment_px < config.touch_slop_px {
        return Err(validation(
            "gestures.min_segment_px must be >= exploration.touch_slop_px",
        ));
    }
    if !(config.dragging_angle_cos > -1.0 && config.dragging_angle_cos < 1.0) {
        return Err(validation("dragging.angle_cos must be within (-1, 1)"));
    }
    Ok(())
}

fn validation(message: &str) -> ConfigError {
    ConfigError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        validate_config(&ExplorerConfig::default()).expect("defaults should validate");
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse_config("").expect("empty config should parse");
        assert_eq!(config, ExplorerConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [exploration]
            enabled = false

            [timeouts]
            double_tap_ms = 250
            "#,
        )
        .expect("config should parse");

        assert!(!config.touch_exploration_enabled);
        assert_eq!(config.double_tap_timeout_ms, 250);
        assert_eq!(config.long_press_timeout_ms, DEFAULT_LONG_PRESS_TIMEOUT_MS);
    }

    #[test]
    fn long_press_must_outlast_tap() {
        let err = parse_config(
            r#"
            [timeouts]
            tap_ms = 600
            "#,
        )
        .expect_err("config should fail validation");
        match err {
            ConfigError::Validation(msg) => {
                assert!(msg.contains("timeouts.long_press_ms"), "got `{msg}`")
            }
            other => panic!("expected validation error, got {other}"),
        }
    }
}
