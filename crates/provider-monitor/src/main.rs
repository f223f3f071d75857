use anyhow::Result;
use clap::{Parser, Subcommand};
use ftso_provider_monitor::{
    agent::ProcessAgent,
    alert::TelegramNotifier,
    monitor::Monitor,
    settings::Settings,
    thresholds::evaluate,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "ftso-provider-monitor",
    about = "Watches a Flare FTSO provider's explorer metrics and alerts on Telegram",
    version,
    after_help = r#"Configuration:
    Configuration can be provided via:
    1. Environment variables: PROVIDER_ADDRESS, NETWORK, TELEGRAM_BOT_TOKEN,
       TELEGRAM_CHAT_ID, MONITORING_INTERVAL, MIN_AVAILABILITY_6H, ...
    2. Environment variables with MONITOR__ prefix (e.g., MONITOR__AGENT__COMMAND)
    3. .env file in the current directory
    4. Config file with -c option

Examples:
    # Monitor the provider from PROVIDER_ADDRESS every 15 minutes
    ftso-provider-monitor

    # Fetch and print one provider's metrics without alerting
    ftso-provider-monitor check --address 0x1234..."#
)]
pub struct Cli {
    /// Path to the configuration file (TOML format)
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the configured provider until interrupted (default)
    Run,
    /// Fetch metrics once, print them with any threshold violations, and exit
    Check {
        /// Provider address; defaults to the configured one
        #[arg(long)]
        address: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(&settings.log_level);

    for ignored in settings.ignored_env() {
        warn!(%ignored, "ignoring unparsable environment override; using default");
    }

    if let Some(metrics) = &settings.metrics {
        PrometheusBuilder::new()
            .with_http_listener(metrics.addr)
            .install()?;
        export_build_info();
    }

    let agent = ProcessAgent::new(&settings.agent);
    let notifier = TelegramNotifier::new(&settings.telegram)?;
    if !notifier.is_configured() {
        warn!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set; alerts will only be logged");
    }

    let monitor = Monitor::new(&settings, agent, notifier);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("{settings}");
            let shutdown = shutdown_listener()?;
            monitor.run(shutdown).await?;
            info!("FTSO provider monitor shutting down");
        }
        Commands::Check { address } => {
            let snapshot = monitor.fetcher().fetch(address.as_deref()).await?;
            println!("Scraping results:\n{snapshot}");

            let violations = evaluate(&snapshot, monitor.thresholds());
            if violations.is_empty() {
                println!("\nAll provider metrics are within acceptable thresholds");
            } else {
                println!();
                for violation in violations {
                    println!("{violation}");
                }
            }
        }
    }

    Ok(())
}

fn init_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn shutdown_listener() -> Result<CancellationToken> {
    let cancellation_token = CancellationToken::new();
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            tokio::select! {
                _ = sigterm.recv() => cancellation_token.cancel(),
                _ = signal::ctrl_c() => cancellation_token.cancel(),
            }
            info!("shutdown signal received");
        }
    });

    Ok(cancellation_token)
}

fn export_build_info() {
    let version = option_env!("BUILD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    let build_commit = option_env!("BUILD_COMMIT").unwrap_or("UNKNOWN");
    let pkg_version = env!("CARGO_PKG_VERSION");

    metrics::gauge!(
        "ftso_monitor_build_info",
        "version" => version,
        "commit" => build_commit,
        "pkg_version" => pkg_version
    )
    .set(1);
}
