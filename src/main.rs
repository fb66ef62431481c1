use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use grid_tapper::hotkey::DEFAULT_STOP_HOTKEY;
use grid_tapper::{
    AdbTapper, ConfigBuilder, DryRunTapper, GtError, Profile, RunSummary, StopHotkey,
    TapDispatcher, TapRunner,
};
use std::future::pending;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Log taps without touching any device
    DryRun,
    /// Tap an Android device with `adb shell input tap`
    Adb,
}

/// Tap number grids on a touch screen from a file of number lines.
#[derive(Parser, Debug)]
#[command(name = "gtap", version, about, long_about = None)]
struct Cli {
    /// Text file with one combination of numbers per line
    file: PathBuf,

    /// X position of grid cell 1, in pixels
    #[arg(long, allow_hyphen_values = true)]
    x_start: Option<String>,

    /// Y position of grid cell 1, in pixels
    #[arg(long, allow_hyphen_values = true)]
    y_start: Option<String>,

    /// Horizontal distance between columns, in pixels
    #[arg(long, allow_hyphen_values = true)]
    dx: Option<String>,

    /// Vertical distance between rows, in pixels
    #[arg(long, allow_hyphen_values = true)]
    dy: Option<String>,

    /// Number of grid columns
    #[arg(long, allow_hyphen_values = true)]
    cols: Option<String>,

    /// Pause after each line, in seconds
    #[arg(long, allow_hyphen_values = true)]
    delay_between: Option<String>,

    /// Pause between taps, in milliseconds (at least 50)
    #[arg(long, allow_hyphen_values = true)]
    tap_delay: Option<String>,

    /// Load the grid layout from a JSON profile
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Save the resulting grid layout to a JSON profile
    #[arg(long)]
    save_profile: Option<PathBuf>,

    /// Where taps go
    #[arg(long, value_enum, default_value_t = Backend::DryRun)]
    backend: Backend,

    /// adb serial of the target device
    #[arg(long)]
    device: Option<String>,

    /// Global hotkey that stops the run
    #[arg(long, default_value = DEFAULT_STOP_HOTKEY)]
    hotkey: String,

    /// Do not register a global stop hotkey
    #[arg(long)]
    no_hotkey: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn status(message: impl AsRef<str>) {
    println!("{} {}", "▶".green().bold(), message.as_ref());
}

fn failure(message: impl AsRef<str>) {
    eprintln!("{} {}", "✖".red().bold(), message.as_ref());
}

fn builder_from(cli: &Cli) -> Result<ConfigBuilder> {
    let base = match &cli.profile {
        Some(path) => Profile::from_file(path)?,
        None => Profile::default(),
    };

    let mut builder = ConfigBuilder::new()
        .base_profile(base)
        .lines_from_file(&cli.file)
        .with_context(|| format!("could not read '{}'", cli.file.display()))?;

    if let Some(raw) = &cli.x_start {
        builder = builder.x_start(raw);
    }
    if let Some(raw) = &cli.y_start {
        builder = builder.y_start(raw);
    }
    if let Some(raw) = &cli.dx {
        builder = builder.dx(raw);
    }
    if let Some(raw) = &cli.dy {
        builder = builder.dy(raw);
    }
    if let Some(raw) = &cli.cols {
        builder = builder.cols(raw);
    }
    if let Some(raw) = &cli.delay_between {
        builder = builder.delay_between_sec(raw);
    }
    if let Some(raw) = &cli.tap_delay {
        builder = builder.tap_delay_ms(raw);
    }

    Ok(builder)
}

fn dispatcher_for(cli: &Cli) -> Arc<dyn TapDispatcher> {
    match cli.backend {
        Backend::DryRun => Arc::new(DryRunTapper::new()),
        Backend::Adb => {
            let tapper = match &cli.device {
                Some(serial) => AdbTapper::new().with_serial(serial),
                None => AdbTapper::new(),
            };
            Arc::new(tapper)
        }
    }
}

async fn hotkey_pressed(presses: &mut Option<watch::Receiver<u64>>) {
    match presses {
        Some(rx) => {
            if rx.changed().await.is_err() {
                pending::<()>().await;
            }
        }
        None => pending::<()>().await,
    }
}

fn print_summary(summary: &RunSummary) {
    let outcome = if summary.cancelled {
        "stopped".yellow().bold()
    } else {
        "finished".green().bold()
    };
    println!(
        "Run {}: {}/{} lines tapped, {} skipped, {} taps ({} rejected)",
        outcome,
        summary.lines_processed,
        summary.lines_total,
        summary.lines_skipped,
        summary.taps_requested,
        summary.taps_rejected
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let builder = match builder_from(&cli) {
        Ok(builder) => builder,
        Err(e) => {
            failure(format!("{:#}", e));
            std::process::exit(1);
        }
    };

    if let Some(path) = &cli.save_profile {
        builder.profile().save_to_file(path)?;
        status(format!("Profile saved to {}", path.display()));
    }

    let config = match builder.build() {
        Ok(config) => config,
        Err(GtError::EmptyInput { .. }) => {
            failure("File empty or invalid.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let runner = TapRunner::new(dispatcher_for(&cli));
    if let Err(e) = runner.start(config) {
        failure(e.to_string());
        std::process::exit(1);
    }

    let hotkey = if cli.no_hotkey {
        None
    } else {
        match StopHotkey::register(&cli.hotkey) {
            Ok(hotkey) => Some(hotkey),
            Err(e) => {
                warn!("{}; use Ctrl+C to stop", e);
                None
            }
        }
    };
    let mut presses = hotkey.as_ref().map(StopHotkey::listen);

    match &hotkey {
        Some(hotkey) => status(format!(
            "Start requested. Press {} or Ctrl+C to stop.",
            hotkey.label()
        )),
        None => status("Start requested. Press Ctrl+C to stop."),
    }

    let wait = runner.wait();
    tokio::pin!(wait);

    let summary = loop {
        tokio::select! {
            summary = &mut wait => break summary,
            _ = tokio::signal::ctrl_c() => {
                status("Stop requested.");
                runner.stop();
            }
            _ = hotkey_pressed(&mut presses) => {
                status("Stop requested.");
                runner.stop();
            }
        }
    };

    match summary {
        Some(summary) => print_summary(&summary),
        None => failure("Run ended unexpectedly."),
    }

    Ok(())
}
