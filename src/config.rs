//! Capture configuration resolved from CLI flags and persisted defaults.
//!
//! Precedence is explicit CLI flag, then the persisted config file, then the
//! built-in default. Once resolved, [`CaptureOptions`] is immutable for the
//! session's lifetime.

use crate::capture::DEFAULT_AUTO_CAPTURE_DELAY;
use crate::pose::GestureKind;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const CONFIG_FILE: &str = "config.toml";
const CONFIG_DIR_ENV: &str = "POSEGATE_CONFIG_DIR";

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_CAPTURE_LABEL: &str = "Capture";

/// Command-line flags for the capture driver.
#[derive(Debug, Parser, Clone)]
#[command(about = "Gesture-gated camera capture", author, version)]
pub struct AppConfig {
    /// Gesture that must be held before a capture is allowed
    #[arg(long = "gesture", value_enum)]
    pub gesture: Option<GestureKind>,

    /// Auto-capture delay once a valid pose is held (ms)
    #[arg(long = "auto-capture-delay-ms")]
    pub auto_capture_delay_ms: Option<u64>,

    /// Capture frame width in pixels
    #[arg(long = "width", default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Capture frame height in pixels
    #[arg(long = "height", default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    /// Disable the mirrored preview used for front cameras
    #[arg(long = "no-mirror", default_value_t = false)]
    pub no_mirror: bool,

    /// Disable the landmark overlay on the preview
    #[arg(long = "no-overlay", default_value_t = false)]
    pub no_overlay: bool,

    /// Capture button label shown by the embedding UI
    #[arg(long = "capture-label")]
    pub capture_label: Option<String>,

    /// Replay script (JSONL) used instead of a live camera
    #[arg(long = "replay")]
    pub replay: Option<PathBuf>,

    /// Enable debug logging to the trace file
    #[arg(long = "logs", default_value_t = false)]
    pub logs: bool,

    /// Disable all logging
    #[arg(long = "no-logs", default_value_t = false)]
    pub no_logs: bool,
}

/// Persistent user preferences (`~/.config/posegate/config.toml`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserConfig {
    pub gesture: Option<GestureKind>,
    pub auto_capture_delay_ms: Option<u64>,
    pub capture_label: Option<String>,
    pub mirror: Option<bool>,
    pub overlay: Option<bool>,
}

/// Resolve the config directory, honoring the env override.
fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::config_dir().map(|dir| dir.join("posegate"))
}

/// Resolve the full config file path.
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Load persisted preferences. Missing or malformed files fall back to
/// defaults so a bad config never blocks a session.
#[must_use]
pub fn load_user_config() -> UserConfig {
    let Some(path) = config_file_path() else {
        return UserConfig::default();
    };
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(_) => return UserConfig::default(),
    };
    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            debug!("ignoring malformed config at {}: {err}", path.display());
            UserConfig::default()
        }
    }
}

/// Immutable session configuration after CLI/file/default resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    pub gesture: GestureKind,
    pub auto_capture_delay: Duration,
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
    pub overlay: bool,
    pub capture_label: String,
}

impl CaptureOptions {
    #[must_use]
    pub fn resolve(cli: &AppConfig, persisted: &UserConfig) -> Self {
        let delay_ms = cli
            .auto_capture_delay_ms
            .or(persisted.auto_capture_delay_ms)
            .unwrap_or(DEFAULT_AUTO_CAPTURE_DELAY.as_millis() as u64);
        Self {
            gesture: cli.gesture.or(persisted.gesture).unwrap_or_default(),
            auto_capture_delay: Duration::from_millis(delay_ms),
            width: cli.width,
            height: cli.height,
            mirror: !cli.no_mirror && persisted.mirror.unwrap_or(true),
            overlay: !cli.no_overlay && persisted.overlay.unwrap_or(true),
            capture_label: cli
                .capture_label
                .clone()
                .or_else(|| persisted.capture_label.clone())
                .unwrap_or_else(|| DEFAULT_CAPTURE_LABEL.to_string()),
        }
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            gesture: GestureKind::default(),
            auto_capture_delay: DEFAULT_AUTO_CAPTURE_DELAY,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            mirror: true,
            overlay: true,
            capture_label: DEFAULT_CAPTURE_LABEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> AppConfig {
        let mut full = vec!["posegate"];
        full.extend_from_slice(args);
        AppConfig::parse_from(full)
    }

    #[test]
    fn resolve_uses_built_in_defaults_when_nothing_is_set() {
        let options = CaptureOptions::resolve(&cli(&[]), &UserConfig::default());
        assert_eq!(options, CaptureOptions::default());
    }

    #[test]
    fn cli_flags_override_persisted_values() {
        let persisted = UserConfig {
            gesture: Some(GestureKind::OpenPalm),
            auto_capture_delay_ms: Some(3000),
            capture_label: Some("Persisted".to_string()),
            mirror: Some(true),
            overlay: Some(true),
        };
        let options = CaptureOptions::resolve(
            &cli(&[
                "--gesture",
                "v-sign",
                "--auto-capture-delay-ms",
                "500",
                "--capture-label",
                "Snap",
                "--no-mirror",
            ]),
            &persisted,
        );
        assert_eq!(options.gesture, GestureKind::VSign);
        assert_eq!(options.auto_capture_delay, Duration::from_millis(500));
        assert_eq!(options.capture_label, "Snap");
        assert!(!options.mirror);
        assert!(options.overlay);
    }

    #[test]
    fn persisted_values_fill_unset_cli_flags() {
        let persisted = UserConfig {
            gesture: Some(GestureKind::OneFinger),
            auto_capture_delay_ms: Some(800),
            capture_label: None,
            mirror: Some(false),
            overlay: None,
        };
        let options = CaptureOptions::resolve(&cli(&[]), &persisted);
        assert_eq!(options.gesture, GestureKind::OneFinger);
        assert_eq!(options.auto_capture_delay, Duration::from_millis(800));
        assert_eq!(options.capture_label, "Capture");
        assert!(!options.mirror);
        assert!(options.overlay);
    }

    #[test]
    fn user_config_parses_from_toml() {
        let parsed: UserConfig = toml::from_str(
            r#"
gesture = "three_fingers"
auto_capture_delay_ms = 2000
mirror = false
"#,
        )
        .expect("parse user config");
        assert_eq!(parsed.gesture, Some(GestureKind::ThreeFingers));
        assert_eq!(parsed.auto_capture_delay_ms, Some(2000));
        assert_eq!(parsed.mirror, Some(false));
        assert_eq!(parsed.capture_label, None);
    }

    #[test]
    fn malformed_toml_falls_back_to_defaults() {
        let parsed: Result<UserConfig, _> = toml::from_str("gesture = 12");
        assert!(parsed.is_err());
        // load_user_config maps this case to defaults; the parse result above
        // is the branch it guards.
    }

    #[test]
    fn width_and_height_default_to_vga() {
        let config = cli(&[]);
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
    }
}
