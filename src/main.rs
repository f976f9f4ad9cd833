use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use jugglecam::{
    EventBus, EventMetrics, FeedReader, JuggleConfig, JuggleSessionBuilder, KeyboardHandSimulator,
    SessionClock,
};

#[derive(Parser, Debug)]
#[command(name = "jugglecam")]
#[command(about = "Detects alternating juggling motion in a hand-tracking feed and triggers an action")]
#[command(version)]
#[command(long_about = "Reads per-frame hand positions produced by an external hand tracker, \
classifies each hand's vertical motion and fires the configured action once both hands \
alternate upward swings quickly enough.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "jugglecam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// JSON-lines hand feed ("-" for stdin)
    #[arg(short, long, value_name = "PATH", default_value = "-", help = "Hand observation feed, one JSON frame per line")]
    feed: String,

    /// Simulate hands from the keyboard instead of reading a feed
    #[arg(short, long, conflicts_with = "feed", help = "Simulate hands with the keyboard (L/R swing, Q quit)")]
    keyboard: bool,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("# Jugglecam Configuration File");
        println!("{}", JuggleConfig::default().to_toml()?);
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting jugglecam v{}", env!("CARGO_PKG_VERSION"));

    let config = JuggleConfig::load_from_file(&args.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let event_bus = Arc::new(if args.debug {
        EventBus::with_debug_logging(config.system.event_bus_capacity)
    } else {
        EventBus::new(config.system.event_bus_capacity)
    });

    let metrics_task = spawn_metrics_collector(&event_bus);

    let mut session = JuggleSessionBuilder::new()
        .config(config)
        .event_bus(Arc::clone(&event_bus))
        .build()
        .map_err(|e| {
            error!("Failed to create session: {}", e);
            e
        })?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            ctrl_c_cancel.cancel();
        }
    });

    let clock = SessionClock::start();
    let stats = if args.keyboard {
        let simulator = KeyboardHandSimulator::new(Arc::clone(&event_bus), clock);
        let mut feed = simulator.start()?;
        let stats = session.run(&mut feed, cancel.clone()).await;
        simulator.stop().await?;
        stats?
    } else if args.feed == "-" {
        let mut feed = FeedReader::stdin(clock);
        session.run(&mut feed, cancel.clone()).await?
    } else {
        let mut feed = FeedReader::open(&args.feed, clock).await?;
        session.run(&mut feed, cancel.clone()).await?
    };

    if let Err(e) = session.shutdown().await {
        warn!("Action did not finish cleanly: {}", e);
    }

    info!(
        "Processed {} frames, {} triggers, {} rejected observations, {} malformed frames",
        stats.frames_processed, stats.triggers, stats.observations_rejected, stats.malformed_frames
    );

    // Closing the bus lets the collector drain and report
    drop(session);
    drop(event_bus);
    match metrics_task.await {
        Ok(metrics) => metrics.print_summary(),
        Err(e) => warn!("Metrics collector failed: {}", e),
    }

    Ok(())
}

fn spawn_metrics_collector(event_bus: &EventBus) -> tokio::task::JoinHandle<EventMetrics> {
    let mut receiver = event_bus.subscribe();
    tokio::spawn(async move {
        let mut metrics = EventMetrics::default();
        loop {
            match receiver.recv().await {
                Ok(event) => metrics.record_event(&event),
                Err(RecvError::Lagged(skipped)) => metrics.record_lag(skipped),
                Err(RecvError::Closed) => break,
            }
        }
        metrics
    })
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jugglecam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}
