//! Global hotkey that stops a running tap sequence.
//!
//! The tapped screen usually has focus while a run is active, so a global
//! hotkey is the convenient way to abort it from the desktop.

use crate::error::{GtError, Result};
use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

pub const DEFAULT_STOP_HOTKEY: &str = "ctrl+alt+s";

pub struct StopHotkey {
    _manager: GlobalHotKeyManager,
    hotkey: HotKey,
    label: String,
}

impl StopHotkey {
    /// Registers `hotkey_str` (e.g. `"ctrl+alt+s"`) system wide.
    pub fn register(hotkey_str: &str) -> Result<Self> {
        let hotkey = parse_hotkey(hotkey_str)?;

        let manager = GlobalHotKeyManager::new()
            .map_err(|e| GtError::hotkey(format!("failed to create hotkey manager: {}", e)))?;
        manager.register(hotkey).map_err(|e| {
            GtError::hotkey(format!("failed to register hotkey '{}': {}", hotkey_str, e))
        })?;

        info!("Stop hotkey '{}' registered", hotkey_str);
        Ok(Self {
            _manager: manager,
            hotkey,
            label: hotkey_str.to_string(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Starts watching for presses.
    ///
    /// The returned receiver counts presses; it changes every time the
    /// hotkey goes down. The listener ends once the receiver is dropped.
    pub fn listen(&self) -> watch::Receiver<u64> {
        let (press_tx, press_rx) = watch::channel(0u64);
        let id = self.hotkey.id();
        let events = GlobalHotKeyEvent::receiver();

        tokio::task::spawn_blocking(move || {
            while !press_tx.is_closed() {
                let Ok(event) = events.recv_timeout(Duration::from_millis(100)) else {
                    continue;
                };
                if event.id == id && event.state == HotKeyState::Pressed {
                    debug!("stop hotkey pressed");
                    press_tx.send_modify(|presses| *presses += 1);
                }
            }
        });

        press_rx
    }
}

/// Parses a `+`-separated hotkey such as `ctrl+alt+s` or `shift+f5`.
pub fn parse_hotkey(hotkey_str: &str) -> Result<HotKey> {
    let normalized = hotkey_str.trim();
    if normalized.is_empty() {
        return Err(GtError::hotkey("empty hotkey string"));
    }

    normalized
        .parse::<HotKey>()
        .map_err(|e| GtError::hotkey(format!("invalid hotkey '{}': {}", hotkey_str, e)))
}
