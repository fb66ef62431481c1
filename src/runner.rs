//! The tap runner: turns number lines into taps on a background task.
//!
//! For every line the runner parses the grid numbers, taps each one with a
//! pause in between, taps the confirm button and waits before the next
//! line. Lines without a single valid number are skipped entirely.
//!
//! A run is cancelled cooperatively. The flag is checked before every line
//! and before every tap, and every pause races against it, so a stop
//! request never lets another tap through.

use crate::config::Config;
use crate::error::{GtError, Result};
use crate::grid::{Grid, Point};
use crate::tapper::TapDispatcher;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Phase of the runner as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run was ever started.
    Idle,
    /// A run is processing lines.
    Running,
    /// The last run completed or was stopped.
    Stopped,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines_total: usize,
    /// Lines whose confirm tap was issued.
    pub lines_processed: usize,
    /// Lines with no number on the grid.
    pub lines_skipped: usize,
    /// Tap requests made, confirm taps included. Rejected requests count too.
    pub taps_requested: usize,
    /// Requests the backend refused or could not issue.
    pub taps_rejected: usize,
    pub cancelled: bool,
}

struct ActiveRun {
    cancel: watch::Sender<bool>,
    done: watch::Receiver<Option<RunSummary>>,
}

impl ActiveRun {
    /// The task is alive and nobody asked it to stop.
    fn is_running(&self) -> bool {
        !self.cancel.is_closed() && !*self.cancel.borrow() && self.done.borrow().is_none()
    }
}

/// Runs at most one tap pipeline at a time.
///
/// # Example
///
/// ```no_run
/// use grid_tapper::{ConfigBuilder, DryRunTapper, TapRunner};
/// use std::sync::Arc;
///
/// # async fn demo() -> grid_tapper::Result<()> {
/// let config = ConfigBuilder::new()
///     .lines_from_file("numbers.txt")?
///     .cols("10")
///     .build()?;
///
/// let runner = TapRunner::new(Arc::new(DryRunTapper::new()));
/// runner.start(config)?;
/// let summary = runner.wait().await;
/// println!("{summary:?}");
/// # Ok(())
/// # }
/// ```
pub struct TapRunner {
    dispatcher: Arc<dyn TapDispatcher>,
    active: Mutex<Option<ActiveRun>>,
}

impl TapRunner {
    pub fn new(dispatcher: Arc<dyn TapDispatcher>) -> Self {
        Self {
            dispatcher,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a run on a new tokio task and returns right away.
    ///
    /// An invalid config is rejected before anything is spawned. Returns
    /// `Ok(false)` without doing anything when a run is already active.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, config: Config) -> Result<bool> {
        if let Err(e) = config.validate() {
            error!("Not starting: {}", e);
            return Err(e);
        }

        let mut active = self.lock();
        if active.as_ref().is_some_and(ActiveRun::is_running) {
            info!("Already running, start ignored");
            return Ok(false);
        }

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(None);
        let dispatcher = Arc::clone(&self.dispatcher);

        tokio::spawn(async move {
            let summary = run_lines(&config, dispatcher.as_ref(), &mut cancel_rx).await;
            let _ = done_tx.send(Some(summary));
            drop(cancel_rx);
        });

        *active = Some(ActiveRun {
            cancel: cancel_tx,
            done: done_rx,
        });
        info!("Run started");
        Ok(true)
    }

    /// Asks the active run to stop. Does nothing when no run is active.
    pub fn stop(&self) {
        let active = self.lock();
        match active.as_ref() {
            Some(run) if run.is_running() => {
                let _ = run.cancel.send(true);
                info!("Stop requested");
            }
            _ => debug!("Stop requested with no active run"),
        }
    }

    pub fn state(&self) -> RunState {
        match self.lock().as_ref() {
            None => RunState::Idle,
            Some(run) if run.is_running() => RunState::Running,
            Some(_) => RunState::Stopped,
        }
    }

    /// Waits for the latest run to end and returns its counters.
    ///
    /// Returns `None` if no run was started or its task died.
    pub async fn wait(&self) -> Option<RunSummary> {
        let mut done = self.lock().as_ref()?.done.clone();

        loop {
            let current = done.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
            if done.changed().await.is_err() {
                let last = done.borrow().clone();
                return last;
            }
        }
    }
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

/// Sleeps for `duration` unless cancelled first. Returns `true` on cancel.
async fn pause(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if duration.is_zero() {
        return is_cancelled(cancel);
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = cancelled(cancel) => true,
    }
}

fn tap(dispatcher: &dyn TapDispatcher, point: Point, summary: &mut RunSummary) {
    summary.taps_requested += 1;
    if !dispatcher.request_tap(point) {
        summary.taps_rejected += 1;
        warn!("{}", GtError::tap_rejected(point.x, point.y));
    }
}

async fn run_lines(
    config: &Config,
    dispatcher: &dyn TapDispatcher,
    cancel: &mut watch::Receiver<bool>,
) -> RunSummary {
    let grid = Grid::from_config(config);
    let confirm = Point::new(config.confirm_x, config.confirm_y);
    let tap_delay = config.tap_delay();
    let delay_between = config.delay_between();
    let total = config.lines.len();

    let mut summary = RunSummary {
        lines_total: total,
        ..RunSummary::default()
    };

    for (index, line) in config.lines.iter().enumerate() {
        let line_no = index + 1;

        if is_cancelled(cancel) {
            return stopped(summary, line_no);
        }

        let numbers = grid.numbers_in(line);
        if numbers.is_empty() {
            warn!("Empty/invalid line at {}", line_no);
            summary.lines_skipped += 1;
            continue;
        }

        info!("Processing line {}/{}: {:?}", line_no, total, numbers);

        for n in numbers {
            if is_cancelled(cancel) {
                return stopped(summary, line_no);
            }

            // numbers_in only yields numbers on the grid
            let Some(point) = grid.point(n) else {
                continue;
            };
            debug!(number = n, %point, "tap");
            tap(dispatcher, point, &mut summary);

            if pause(tap_delay, cancel).await {
                return stopped(summary, line_no);
            }
        }

        debug!(%confirm, "confirm tap");
        tap(dispatcher, confirm, &mut summary);
        summary.lines_processed += 1;

        if pause(delay_between, cancel).await {
            return stopped(summary, line_no);
        }
    }

    info!(
        "Finished all {} lines ({} skipped, {} taps)",
        total, summary.lines_skipped, summary.taps_requested
    );
    summary
}

fn stopped(mut summary: RunSummary, line_no: usize) -> RunSummary {
    summary.cancelled = true;
    info!("Run stopped at line {}/{}", line_no, summary.lines_total);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[derive(Default)]
    struct Recorder {
        taps: Mutex<Vec<Point>>,
    }

    impl Recorder {
        fn taps(&self) -> Vec<Point> {
            self.taps.lock().unwrap().clone()
        }
    }

    impl TapDispatcher for Recorder {
        fn request_tap(&self, point: Point) -> bool {
            self.taps.lock().unwrap().push(point);
            true
        }
    }

    fn config(text: &str) -> Config {
        ConfigBuilder::new()
            .lines_from_text(text)
            .delay_between_sec("1")
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_taps_in_order_with_confirm() {
        let recorder = Arc::new(Recorder::default());
        let runner = TapRunner::new(recorder.clone());

        assert!(runner.start(config("23 1")).unwrap());
        let summary = runner.wait().await.unwrap();

        assert_eq!(
            recorder.taps(),
            vec![
                Point::new(392, 840),
                Point::new(152, 620),
                Point::new(152, 1280)
            ]
        );
        assert_eq!(summary.lines_processed, 1);
        assert_eq!(summary.taps_requested, 3);
        assert!(!summary.cancelled);
        assert_eq!(runner.state(), RunState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_run_is_noop() {
        let runner = TapRunner::new(Arc::new(Recorder::default()));
        runner.stop();
        runner.stop();
        assert_eq!(runner.state(), RunState::Idle);
        assert_eq!(runner.wait().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_cols_not_started() {
        let recorder = Arc::new(Recorder::default());
        let runner = TapRunner::new(recorder.clone());

        let mut cfg = config("1 2 3");
        cfg.cols = 0;
        assert!(runner.start(cfg).is_err());
        assert_eq!(runner.state(), RunState::Idle);
        assert!(recorder.taps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_returns_early_on_cancel() {
        let (tx, mut rx) = watch::channel(false);
        let started = tokio::time::Instant::now();

        let handle = tokio::spawn(async move { pause(Duration::from_secs(60), &mut rx).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        assert!(handle.await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
