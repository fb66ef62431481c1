//! # Grid Tapper
//!
//! Taps a numeric grid on a touch screen, such as a lottery ticket entry
//! form, from a text file with one combination of numbers per line.
//!
//! ## Features
//!
//! - Numbers separated by commas, semicolons or whitespace
//! - Row-major mapping of numbers onto a configurable grid layout
//! - A confirm tap after every line, with pacing between taps and lines
//! - Cancellable at any time, including in the middle of a pause
//! - Android devices through `adb`, or a dry run that only logs the taps
//! - Reusable JSON layout profiles
//!
//! ## Example
//!
//! ```no_run
//! use grid_tapper::{AdbTapper, ConfigBuilder, TapRunner};
//! use std::sync::Arc;
//!
//! # async fn demo() -> grid_tapper::Result<()> {
//! let config = ConfigBuilder::new()
//!     .lines_from_text("5, 12, 23, 41, 59")
//!     .tap_delay_ms("300")
//!     .build()?;
//!
//! let runner = TapRunner::new(Arc::new(AdbTapper::new()));
//! runner.start(config)?;
//! runner.wait().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Profiles
//!
//! Grid layouts can be kept in JSON files:
//!
//! ```json
//! {
//!   "x_start": 152,
//!   "y_start": 620,
//!   "dx": 120,
//!   "dy": 110,
//!   "cols": 10
//! }
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod hotkey;
pub mod runner;
pub mod tapper;

pub use config::{Config, ConfigBuilder, Profile};
pub use error::{GtError, Result};
pub use grid::{Grid, Point};
pub use hotkey::StopHotkey;
pub use runner::{RunState, RunSummary, TapRunner};
pub use tapper::{AdbTapper, DryRunTapper, TapDispatcher};
