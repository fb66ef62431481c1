//! Run configuration and the builder that assembles it.
//!
//! A [`Config`] is built once per run from the lines of a number file and
//! the numeric layout fields entered by the user. Numeric fields arrive as
//! raw text; anything missing or unparseable falls back to the base
//! [`Profile`], whose own defaults are the documented layout of a 10x6
//! ticket grid.

use crate::error::{GtError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_X_START: i32 = 152;
pub const DEFAULT_Y_START: i32 = 620;
pub const DEFAULT_DX: i32 = 120;
pub const DEFAULT_DY: i32 = 110;
pub const DEFAULT_COLS: i32 = 10;
pub const DEFAULT_DELAY_BETWEEN_SEC: i32 = 10;
pub const DEFAULT_TAP_DELAY_MS: i64 = 250;

/// Number of rows on the ticket grid. Valid numbers are `1..=cols * GRID_ROWS`.
pub const GRID_ROWS: i32 = 6;

/// Lower bound for the pause between two taps of the same line.
pub const MIN_TAP_DELAY_MS: i64 = 50;

/// Numeric layout of the grid, as entered by the user.
///
/// Profiles can be stored as JSON so a layout measured once for a device
/// can be reused:
///
/// ```json
/// {
///   "x_start": 152,
///   "y_start": 620,
///   "dx": 120,
///   "dy": 110,
///   "cols": 10,
///   "delay_between_sec": 10,
///   "tap_delay_ms": 250
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "default_x_start")]
    pub x_start: i32,

    #[serde(default = "default_y_start")]
    pub y_start: i32,

    #[serde(default = "default_dx")]
    pub dx: i32,

    #[serde(default = "default_dy")]
    pub dy: i32,

    #[serde(default = "default_cols")]
    pub cols: i32,

    #[serde(default = "default_delay_between_sec")]
    pub delay_between_sec: i32,

    #[serde(default = "default_tap_delay_ms")]
    pub tap_delay_ms: i64,
}

fn default_x_start() -> i32 {
    DEFAULT_X_START
}

fn default_y_start() -> i32 {
    DEFAULT_Y_START
}

fn default_dx() -> i32 {
    DEFAULT_DX
}

fn default_dy() -> i32 {
    DEFAULT_DY
}

fn default_cols() -> i32 {
    DEFAULT_COLS
}

fn default_delay_between_sec() -> i32 {
    DEFAULT_DELAY_BETWEEN_SEC
}

fn default_tap_delay_ms() -> i64 {
    DEFAULT_TAP_DELAY_MS
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            x_start: DEFAULT_X_START,
            y_start: DEFAULT_Y_START,
            dx: DEFAULT_DX,
            dy: DEFAULT_DY,
            cols: DEFAULT_COLS,
            delay_between_sec: DEFAULT_DELAY_BETWEEN_SEC,
            tap_delay_ms: DEFAULT_TAP_DELAY_MS,
        }
    }
}

impl Profile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| GtError::config_load(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&content)
            .map_err(|e| GtError::config_load(path.display().to_string(), e.to_string()))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| GtError::config_save(path.display().to_string(), e.to_string()))
    }
}

/// Immutable configuration for one run of the tap pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number lines, trimmed and non-blank, in file order.
    pub lines: Vec<String>,
    /// Screen position of grid cell 1.
    pub x_start: i32,
    pub y_start: i32,
    /// Pixel stride between columns and rows.
    pub dx: i32,
    pub dy: i32,
    pub cols: i32,
    /// Pause after a line's confirm tap, in seconds.
    pub delay_between_sec: i32,
    /// Pause between taps of one line, in milliseconds.
    pub tap_delay_ms: i64,
    /// Confirm button tapped once after each line.
    pub confirm_x: i32,
    pub confirm_y: i32,
}

impl Config {
    /// Builds a config from a profile, deriving the confirm button position.
    ///
    /// The confirm button sits in the first column, one row stride below the
    /// last grid row.
    pub fn from_profile(lines: Vec<String>, profile: &Profile) -> Self {
        Self {
            lines,
            x_start: profile.x_start,
            y_start: profile.y_start,
            dx: profile.dx,
            dy: profile.dy,
            cols: profile.cols,
            delay_between_sec: profile.delay_between_sec,
            tap_delay_ms: profile.tap_delay_ms,
            confirm_x: profile.x_start,
            confirm_y: profile
                .y_start
                .saturating_add(profile.dy.saturating_mul(GRID_ROWS)),
        }
    }

    /// Checks that the config can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.cols <= 0 {
            return Err(GtError::config_validation(format!(
                "cols must be greater than 0, got {}",
                self.cols
            )));
        }

        if self.lines.is_empty() {
            return Err(GtError::config_validation("no lines to process"));
        }

        Ok(())
    }

    /// Pause between taps, never shorter than [`MIN_TAP_DELAY_MS`].
    pub fn tap_delay(&self) -> Duration {
        Duration::from_millis(self.tap_delay_ms.max(MIN_TAP_DELAY_MS) as u64)
    }

    /// Pause after each line; negative values count as zero.
    pub fn delay_between(&self) -> Duration {
        Duration::from_secs(self.delay_between_sec.max(0) as u64)
    }
}

/// Collects raw user input and turns it into a [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    base: Profile,
    source_name: String,
    lines: Vec<String>,
    x_start: Option<String>,
    y_start: Option<String>,
    dx: Option<String>,
    dy: Option<String>,
    cols: Option<String>,
    delay_between_sec: Option<String>,
    tap_delay_ms: Option<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values used for fields that are missing or unparseable.
    pub fn base_profile(mut self, profile: Profile) -> Self {
        self.base = profile;
        self
    }

    /// Uses the lines of `text`, trimmed, with blank lines dropped.
    pub fn lines_from_text(mut self, text: &str) -> Self {
        self.source_name = "input".to_string();
        self.lines = parse_lines(text);
        self
    }

    /// Reads the lines of a number file.
    pub fn lines_from_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        self.lines = read_lines(path)?;
        self.source_name = path.display().to_string();
        Ok(self)
    }

    pub fn x_start(mut self, raw: impl Into<String>) -> Self {
        self.x_start = Some(raw.into());
        self
    }

    pub fn y_start(mut self, raw: impl Into<String>) -> Self {
        self.y_start = Some(raw.into());
        self
    }

    pub fn dx(mut self, raw: impl Into<String>) -> Self {
        self.dx = Some(raw.into());
        self
    }

    pub fn dy(mut self, raw: impl Into<String>) -> Self {
        self.dy = Some(raw.into());
        self
    }

    pub fn cols(mut self, raw: impl Into<String>) -> Self {
        self.cols = Some(raw.into());
        self
    }

    pub fn delay_between_sec(mut self, raw: impl Into<String>) -> Self {
        self.delay_between_sec = Some(raw.into());
        self
    }

    pub fn tap_delay_ms(mut self, raw: impl Into<String>) -> Self {
        self.tap_delay_ms = Some(raw.into());
        self
    }

    /// Resolves every numeric field against the base profile.
    pub fn profile(&self) -> Profile {
        let base = &self.base;
        Profile {
            x_start: resolve("x_start", self.x_start.as_deref(), base.x_start),
            y_start: resolve("y_start", self.y_start.as_deref(), base.y_start),
            dx: resolve("dx", self.dx.as_deref(), base.dx),
            dy: resolve("dy", self.dy.as_deref(), base.dy),
            cols: resolve("cols", self.cols.as_deref(), base.cols),
            delay_between_sec: resolve(
                "delay_between_sec",
                self.delay_between_sec.as_deref(),
                base.delay_between_sec,
            ),
            tap_delay_ms: resolve("tap_delay_ms", self.tap_delay_ms.as_deref(), base.tap_delay_ms),
        }
    }

    /// Builds the config. Fails only when there are no lines to process.
    pub fn build(self) -> Result<Config> {
        if self.lines.is_empty() {
            let name = if self.source_name.is_empty() {
                "input"
            } else {
                self.source_name.as_str()
            };
            return Err(GtError::empty_input(name));
        }

        let profile = self.profile();
        Ok(Config::from_profile(self.lines, &profile))
    }
}

fn resolve<T>(field: &str, raw: Option<&str>, fallback: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    let Some(raw) = raw else {
        debug!(field, %fallback, "field not set, using default");
        return fallback;
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(field, value = raw, %fallback, "unparseable value, using default");
            fallback
        }
    }
}

/// Splits `text` into trimmed, non-blank lines, keeping their order.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads a number file into trimmed, non-blank lines.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let bytes = fs::read(path)?;
    Ok(parse_lines(&String::from_utf8_lossy(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let config = ConfigBuilder::new().lines_from_text("1 2 3").build().unwrap();

        assert_eq!(config.x_start, 152);
        assert_eq!(config.y_start, 620);
        assert_eq!(config.dx, 120);
        assert_eq!(config.dy, 110);
        assert_eq!(config.cols, 10);
        assert_eq!(config.delay_between_sec, 10);
        assert_eq!(config.tap_delay_ms, 250);
    }

    #[test]
    fn test_unparseable_field_falls_back() {
        let config = ConfigBuilder::new()
            .lines_from_text("1")
            .x_start("abc")
            .y_start(" 700 ")
            .tap_delay_ms("")
            .build()
            .unwrap();

        assert_eq!(config.x_start, 152);
        assert_eq!(config.y_start, 700);
        assert_eq!(config.tap_delay_ms, 250);
    }

    #[test]
    fn test_confirm_position_is_derived() {
        let config = ConfigBuilder::new()
            .lines_from_text("1")
            .x_start("100")
            .y_start("500")
            .dy("90")
            .build()
            .unwrap();

        assert_eq!(config.confirm_x, 100);
        assert_eq!(config.confirm_y, 500 + 90 * 6);

        let config = ConfigBuilder::new().lines_from_text("1").build().unwrap();
        assert_eq!(config.confirm_x, 152);
        assert_eq!(config.confirm_y, 1280);
    }

    #[test]
    fn test_base_profile_used_as_fallback() {
        let base = Profile {
            cols: 8,
            ..Profile::default()
        };
        let config = ConfigBuilder::new()
            .base_profile(base)
            .lines_from_text("1")
            .cols("eight")
            .build()
            .unwrap();

        assert_eq!(config.cols, 8);
    }

    #[test]
    fn test_empty_lines_is_error() {
        let result = ConfigBuilder::new().lines_from_text("\n   \n\t\n").build();
        assert!(matches!(result, Err(GtError::EmptyInput { .. })));
    }

    #[test]
    fn test_parse_lines_trims_and_drops_blanks() {
        let lines = parse_lines("  5 12 23 \n\n\t\n1,2,3\r\n");
        assert_eq!(lines, vec!["5 12 23".to_string(), "1,2,3".to_string()]);
    }

    #[test]
    fn test_read_lines_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numbers.txt");
        fs::write(&path, b"1 2 3\n5 12 23 # bilet \xe3\n").unwrap();

        let lines = read_lines(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1 2 3");
        assert!(lines[1].starts_with("5 12 23 # bilet"));
        assert_eq!(
            crate::grid::parse_numbers(&lines[1], 60),
            vec![5, 12, 23]
        );
    }

    #[test]
    fn test_validate_rejects_non_positive_cols() {
        let config = ConfigBuilder::new()
            .lines_from_text("1")
            .cols("0")
            .build()
            .unwrap();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new()
            .lines_from_text("1")
            .cols("-3")
            .build()
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delay_clamping() {
        let mut config = ConfigBuilder::new().lines_from_text("1").build().unwrap();

        config.tap_delay_ms = 10;
        assert_eq!(config.tap_delay(), Duration::from_millis(50));
        config.tap_delay_ms = -100;
        assert_eq!(config.tap_delay(), Duration::from_millis(50));
        config.tap_delay_ms = 300;
        assert_eq!(config.tap_delay(), Duration::from_millis(300));

        config.delay_between_sec = -5;
        assert_eq!(config.delay_between(), Duration::ZERO);
        config.delay_between_sec = 2;
        assert_eq!(config.delay_between(), Duration::from_secs(2));
    }
}
