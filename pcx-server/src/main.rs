//! PC MetricsX
//!
//! Simulates gaming PC telemetry, logs and publishes it, serves the query
//! API, and recommends fan curves from recorded data.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pcx_core::log_format::load_readings;
use pcx_core::model::Preference;
use pcx_core::{summarize, TelemetryError};
use pcx_server::api;
use pcx_server::config::AppConfig;
use pcx_server::driver::Driver;
use pcx_server::recommender::Recommender;
use pcx_server::sinks::create_sinks;
use pcx_server::state::{AppState, RECOMMENDATION_WINDOW};
use pcx_sim::PcSimulator;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "pcx")]
#[command(about = "Gaming PC telemetry simulator and fan-curve advisor")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config dir>/pc-metricsx/config.json if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulator with the configured sinks and query API
    Run(RunArgs),

    /// Summarize a sensor log and print a fan-curve recommendation
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Fixed RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many readings
    #[arg(long)]
    ticks: Option<u64>,

    /// Query API bind address
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Disable the query API
    #[arg(long, conflicts_with = "listen")]
    no_api: bool,

    /// Suppress console status lines
    #[arg(long)]
    quiet: bool,

    /// Sensor log path
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Seed the query window from the existing log before it is truncated
    #[arg(long)]
    resume: bool,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Sensor log to read
    log: PathBuf,

    /// balanced, best_temps or most_quiet
    #[arg(short, long, default_value = "balanced")]
    preference: Preference,

    /// Number of most recent readings to summarize
    #[arg(long, default_value_t = RECOMMENDATION_WINDOW)]
    last: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Run(args) => run(config, args).await,
        Commands::Analyze(args) => analyze(&config, args).await,
    }
}

async fn run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(listen) = args.listen {
        config.listen_addr = Some(listen);
    }
    if args.no_api {
        config.listen_addr = None;
    }
    if args.quiet {
        config.console_output = false;
    }
    if let Some(path) = args.log_file {
        config.log_file = path;
    }
    config.validate()?;

    info!(device_id = %config.device_id, "Starting PC MetricsX");

    let state = AppState::new(
        Recommender::from_config(&config.advisory),
        config.history_capacity,
    );
    if args.resume && config.log_file.exists() {
        if let Err(e) = state.load_history(&config.log_file).await {
            tracing::warn!("could not resume history: {}", e);
        }
    }

    let sinks = create_sinks(&config)?;

    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, "simulator seeded");
    let simulator = PcSimulator::new(
        config.simulation.clone(),
        config.device_id.clone(),
        seed,
        Utc::now(),
        config.tick_period(),
    )?;

    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    let server = match config.listen_addr {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("cannot bind query API on {}", addr))?;
            info!("Query API listening on http://{}", addr);
            let app = api::create_router(state.clone());
            let token = shutdown.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .await
            }))
        }
        None => None,
    };

    let driver = Driver::new(Box::new(simulator), sinks, state, config.tick_period());
    let stats = driver.run(shutdown.clone(), args.ticks).await?;

    shutdown.cancel();
    if let Some(handle) = server {
        handle.await??;
    }

    info!(
        readings = stats.readings,
        sink_failures = stats.sink_failures,
        "PC MetricsX stopped"
    );
    Ok(())
}

async fn analyze(config: &AppConfig, args: AnalyzeArgs) -> Result<()> {
    let parsed = load_readings(&args.log)
        .with_context(|| format!("cannot read sensor log {}", args.log.display()))?;
    if !parsed.complete {
        info!("log is not closed, using its complete records");
    }

    let skip = parsed.entries.len().saturating_sub(args.last);
    let summary = match summarize(&parsed.entries[skip..]) {
        Ok(summary) => summary,
        Err(TelemetryError::EmptyInput) => {
            bail!("insufficient data: {} has no readings", args.log.display())
        }
        Err(e) => return Err(e.into()),
    };

    let recommender = Recommender::from_config(&config.advisory);
    let recommendation = recommender.recommend(&summary, args.preference).await;
    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    Ok(())
}
