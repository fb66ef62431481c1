//! Tap backends.
//!
//! The runner only needs to ask for a tap at a point and learn whether the
//! request was accepted. Completion is never awaited: a tap is handed off
//! and the runner moves on. Backends must still keep taps in request order.

use crate::error::GtError;
use crate::grid::Point;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Something that can put a tap on the screen.
pub trait TapDispatcher: Send + Sync {
    /// Requests a tap at `point` without waiting for it to happen.
    ///
    /// Returns `false` when the tap was refused or could not be issued.
    fn request_tap(&self, point: Point) -> bool;
}

/// Logs taps instead of performing them.
#[derive(Debug, Default)]
pub struct DryRunTapper {
    taps: AtomicU64,
}

impl DryRunTapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of taps requested so far.
    pub fn tap_count(&self) -> u64 {
        self.taps.load(Ordering::Relaxed)
    }
}

impl TapDispatcher for DryRunTapper {
    fn request_tap(&self, point: Point) -> bool {
        let n = self.taps.fetch_add(1, Ordering::Relaxed) + 1;
        info!(tap = n, x = point.x, y = point.y, "dry-run tap");
        true
    }
}

/// Taps an Android device through `adb shell input tap`.
///
/// Taps are queued and run by a single worker task, one `adb` process at a
/// time, so they reach the device in the order they were requested. The
/// worker starts on the first tap and needs a tokio runtime; without one the
/// tap is refused. Failures are only logged.
///
/// If the `adb` executable is missing the worker stops and later taps are
/// refused.
#[derive(Debug, Clone)]
pub struct AdbTapper {
    program: String,
    serial: Option<String>,
    queue: Arc<OnceLock<mpsc::UnboundedSender<(Point, Vec<String>)>>>,
}

impl Default for AdbTapper {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbTapper {
    pub fn new() -> Self {
        Self {
            program: "adb".to_string(),
            serial: None,
            queue: Arc::new(OnceLock::new()),
        }
    }

    /// Targets one device when several are attached.
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Uses another executable in place of `adb`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments passed to the adb executable for a tap at `point`.
    pub fn args(&self, point: Point) -> Vec<String> {
        let mut args = Vec::with_capacity(7);
        if let Some(serial) = &self.serial {
            args.push("-s".to_string());
            args.push(serial.clone());
        }
        args.extend(
            ["shell", "input", "tap"]
                .into_iter()
                .map(str::to_string),
        );
        args.push(point.x.to_string());
        args.push(point.y.to_string());
        args
    }

    fn queue(&self) -> Option<&mpsc::UnboundedSender<(Point, Vec<String>)>> {
        if let Some(queue) = self.queue.get() {
            return Some(queue);
        }

        let Ok(runtime) = Handle::try_current() else {
            error!("adb taps need a tokio runtime");
            return None;
        };

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        if self.queue.set(queue_tx).is_ok() {
            runtime.spawn(run_tap_worker(self.program.clone(), queue_rx));
        }
        self.queue.get()
    }
}

async fn run_tap_worker(
    program: String,
    mut queue: mpsc::UnboundedReceiver<(Point, Vec<String>)>,
) {
    while let Some((point, args)) = queue.recv().await {
        let spawned = Command::new(&program)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let err =
                    GtError::unsupported_platform(format!("'{}' executable not found", program));
                error!(%point, "{}", err);
                return;
            }
            Err(e) => {
                warn!(%point, error = %e, "failed to spawn tap command");
                continue;
            }
        };

        match child.wait().await {
            Ok(status) if status.success() => debug!(%point, "tap completed"),
            Ok(status) => warn!(%point, %status, "tap cancelled by device"),
            Err(e) => warn!(%point, error = %e, "lost track of tap command"),
        }
    }
}

impl TapDispatcher for AdbTapper {
    fn request_tap(&self, point: Point) -> bool {
        let Some(queue) = self.queue() else {
            return false;
        };
        queue.send((point, self.args(point))).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_accepts_and_counts() {
        let tapper = DryRunTapper::new();
        assert!(tapper.request_tap(Point::new(1, 2)));
        assert!(tapper.request_tap(Point::new(3, 4)));
        assert_eq!(tapper.tap_count(), 2);
    }

    #[test]
    fn test_adb_args() {
        let tapper = AdbTapper::new();
        assert_eq!(
            tapper.args(Point::new(392, 840)),
            vec!["shell", "input", "tap", "392", "840"]
        );

        let tapper = AdbTapper::new().with_serial("emulator-5554");
        assert_eq!(
            tapper.args(Point::new(152, 620)),
            vec!["-s", "emulator-5554", "shell", "input", "tap", "152", "620"]
        );
    }

    #[test]
    fn test_adb_without_runtime_is_refused() {
        let tapper = AdbTapper::new();
        assert!(!tapper.request_tap(Point::new(10, 10)));
    }

    #[tokio::test]
    async fn test_adb_missing_program_refuses_later_taps() {
        let tapper = AdbTapper::new().with_program("gtap-no-such-adb-binary-xyz");
        assert!(tapper.request_tap(Point::new(10, 10)));

        let mut refused = false;
        for _ in 0..200 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if !tapper.request_tap(Point::new(10, 10)) {
                refused = true;
                break;
            }
        }
        assert!(refused);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_adb_taps_land_in_request_order() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let log = dir.path().join("taps.log");
        let script = dir.path().join("fake-adb");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nif [ \"$4\" = \"152\" ]; then sleep 0.4; else sleep 0.05; fi\necho \"$4 $5\" >> '{}'\n",
                log.display()
            ),
        )?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;

        let tapper = AdbTapper::new().with_program(script.display().to_string());
        for point in [
            Point::new(152, 620),
            Point::new(272, 620),
            Point::new(392, 620),
            Point::new(152, 1280),
        ] {
            assert!(tapper.request_tap(point));
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        let mut landed = Vec::new();
        for _ in 0..300 {
            landed = std::fs::read_to_string(&log)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect();
            if landed.len() == 4 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(landed, vec!["152 620", "272 620", "392 620", "152 1280"]);
        Ok(())
    }
}
