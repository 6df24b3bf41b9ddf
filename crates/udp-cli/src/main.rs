mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use udp_core::{
    alert, alert_channel, build_client, AlertDispatcher, BatchChecker, CheckConfig, CheckReport,
    Notifier, Scheduler, StreamSpec, StreamStatus, TelegramNotifier, UdpProbe, WebhookNotifier,
};

use crate::config::AppConfig;

const NOTIFY_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    if GIT_HASH.is_empty() {
        VERSION
    } else {
        // Called once by clap; lives for the program's lifetime.
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// UDP stream monitor: alert when unicast or multicast streams stop delivering data.
#[derive(Parser)]
#[command(name = "udp-monitor", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check all configured streams now and on a fixed interval until stopped.
    Run {
        /// Path to TOML config file.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run a single check cycle and print the result.
    Check {
        /// Stream locators (e.g. udp://@239.1.1.1:5000). Used instead of the
        /// config file's streams when given.
        locators: Vec<String>,

        /// Path to TOML config file. Alerts go to its notifiers.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Per-probe data wait in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Probe attempts per stream.
        #[arg(long)]
        attempts: Option<u32>,

        /// Delay between attempts in milliseconds.
        #[arg(long)]
        retry_delay_ms: Option<u64>,

        /// Only check that the port can be bound (and group joined); do not wait for data.
        #[arg(long, default_value_t = false)]
        bind_only: bool,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_daemon(config).await,
        Commands::Check {
            locators,
            config,
            timeout_ms,
            attempts,
            retry_delay_ms,
            bind_only,
            json,
        } => {
            fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .with_writer(std::io::stderr)
                .init();
            let overrides = CheckOverrides {
                timeout_ms,
                attempts,
                retry_delay_ms,
                bind_only,
            };
            run_check(locators, config, overrides, json).await
        }
    }
}

async fn run_daemon(config_path: PathBuf) -> ExitCode {
    let app_config = match AppConfig::load(&config_path) {
        Ok(c) => {
            init_tracing(&c.general.log_format);
            tracing::info!(path = %config_path.display(), "Loaded config file");
            c
        }
        Err(e) => {
            init_tracing("pretty");
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let notifiers = match build_notifiers(&app_config) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up notifiers");
            return ExitCode::FAILURE;
        }
    };
    if notifiers.is_empty() {
        tracing::warn!("No notifiers configured; alerts will only be logged");
    }

    let (alert_tx, alert_rx) = alert_channel();
    let mut dispatcher = tokio::spawn(AlertDispatcher::new(alert_rx, notifiers).run());

    let checker = BatchChecker::new(
        app_config.to_stream_specs(),
        app_config.to_check_config(),
        Arc::new(UdpProbe::new()),
        Some(alert_tx),
    );
    let scheduler = Scheduler::new(checker);

    if let Err(e) = scheduler.start().await {
        tracing::error!(error = %e, "Failed to start scheduler");
        return ExitCode::FAILURE;
    }

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping scheduler...");

    scheduler.stop().await;
    // Dropping the scheduler drops the last alert sender and ends the dispatcher.
    drop(scheduler);

    match tokio::time::timeout(Duration::from_secs(5), &mut dispatcher).await {
        Ok(_) => tracing::info!("Alert dispatcher shut down"),
        Err(_) => {
            tracing::warn!("Alert dispatcher did not shut down in time, aborting");
            dispatcher.abort();
        }
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

struct CheckOverrides {
    timeout_ms: Option<u64>,
    attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    bind_only: bool,
}

impl CheckOverrides {
    fn apply(&self, mut c: CheckConfig) -> CheckConfig {
        if let Some(ms) = self.timeout_ms {
            c = c.with_timeout(ms);
        }
        if let Some(n) = self.attempts {
            c = c.with_attempts(n);
        }
        if let Some(ms) = self.retry_delay_ms {
            c = c.with_retry_delay(ms);
        }
        if self.bind_only {
            c = c.with_require_data(false);
        }
        c
    }
}

async fn run_check(
    locators: Vec<String>,
    config_path: Option<PathBuf>,
    overrides: CheckOverrides,
    json: bool,
) -> ExitCode {
    let app_config = match config_path {
        Some(ref path) => match AppConfig::load(path) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let streams: Vec<StreamSpec> = if !locators.is_empty() {
        locators
            .iter()
            .map(|l| StreamSpec::new(l.clone(), l.clone()))
            .collect()
    } else if let Some(ref c) = app_config {
        c.to_stream_specs()
    } else {
        tracing::error!("No streams given; pass locators or --config");
        return ExitCode::FAILURE;
    };

    let base = app_config
        .as_ref()
        .map(AppConfig::to_check_config)
        .unwrap_or_default();
    let check_config = overrides.apply(base);

    let notifiers = match app_config.as_ref().map(build_notifiers).transpose() {
        Ok(n) => n.unwrap_or_default(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up notifiers");
            return ExitCode::FAILURE;
        }
    };

    let (alert_tx, mut alert_rx) = alert_channel();
    let checker = BatchChecker::new(
        streams,
        check_config,
        Arc::new(UdpProbe::new()),
        Some(alert_tx),
    );

    let spinner = ProgressBar::new_spinner();
    if let Ok(s) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(s);
    }
    spinner.set_message(format!("Checking {} stream(s)...", checker.streams().len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let report = checker.check_all().await;
    spinner.finish_and_clear();

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => tracing::error!(error = %e, "Failed to encode report"),
        }
    } else {
        print_report(&report);
    }

    while let Ok(a) = alert_rx.try_recv() {
        alert::deliver(&notifiers, &a).await;
    }

    if report.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn build_notifiers(config: &AppConfig) -> Result<Vec<Box<dyn Notifier>>, String> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
    if config.telegram.is_none() && config.webhook.is_empty() {
        return Ok(notifiers);
    }

    let client = build_client(NOTIFY_CLIENT_TIMEOUT).map_err(|e| e.to_string())?;

    if let Some(ref tg) = config.telegram {
        notifiers.push(Box::new(TelegramNotifier::new(tg.clone(), client.clone())));
    }
    for wh in &config.webhook {
        notifiers.push(Box::new(WebhookNotifier::new(wh.clone(), client.clone())));
    }
    Ok(notifiers)
}

fn print_report(report: &CheckReport) {
    let width = report
        .results
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max(6);

    println!(
        "{}  {}",
        style(format!("{:<width$}  {:<8}", "STREAM", "STATUS")).bold(),
        style("DETAIL").bold()
    );
    for r in &report.results {
        let status = format!("{:<8}", r.status.to_string());
        let status = match r.status {
            StreamStatus::Active => style(status).green(),
            StreamStatus::Inactive => style(status).red().bold(),
            StreamStatus::Invalid => style(status).yellow(),
        };
        let detail = r.detail.as_deref().unwrap_or("");
        println!(
            "{:<width$}  {}  {} {}",
            r.name,
            status,
            detail,
            style(&r.locator).dim()
        );
    }

    let down = report.down_streams().len();
    let summary = format!(
        "{} checked, {} down in {:.1}s",
        report.len(),
        down,
        report.elapsed_ms() as f64 / 1000.0
    );
    println!();
    if down == 0 {
        println!("{}", style(summary).green());
    } else {
        println!("{}", style(summary).red());
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => {
            fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}
