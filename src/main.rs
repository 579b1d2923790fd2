use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use barline::duration::parse_duration;
use barline::{ClockUnit, Controller, TextUnit};

#[derive(Parser, Debug)]
#[command(name = "barline")]
#[command(about = "Status line generator speaking the i3bar/swaybar JSON protocol")]
struct Args {
    /// Refresh interval between status line updates (e.g. "1s", "500ms")
    #[arg(short, long, default_value = "1s")]
    interval: String,

    /// Per-unit read timeout; a read exceeding it degrades that unit for
    /// the tick (e.g. "5s")
    #[arg(long, default_value = "5s")]
    timeout: String,

    /// Spaces added around each unit's text
    #[arg(short, long, default_value = "1")]
    padding: usize,

    /// Clock format (chrono strftime)
    #[arg(long, default_value = "%a %H:%M:%S")]
    clock_format: String,

    /// Static label shown at the start of the line
    #[arg(long, default_value = "barline")]
    label: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the bar protocol; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let interval = parse_duration(&args.interval)?;
    let timeout = parse_duration(&args.timeout)?;

    let (controller, shutdown) = Controller::builder()
        .unit(TextUnit::new("label", &args.label))
        .unit(ClockUnit::new(&args.clock_format))
        .default_style("separator", true)
        .interval(interval)
        .padding(args.padding)
        .read_timeout(timeout)
        .build()?;

    tokio::spawn(async move {
        shutdown_signal().await;
        debug!("termination signal received");
        shutdown.stop();
    });

    controller.run(tokio::io::stdin(), tokio::io::stdout()).await
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
