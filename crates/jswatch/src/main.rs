use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use jswatch::config::{load_targets_file, Config};
use jswatch::{log_file_writer, log_filter};
use jswatch::telegram::TelegramNotifier;
use jswatch_core::{
    build_descriptors, ChangeLog, Differ, FsVersionStore, HttpFetcher, Orchestrator, Reporter,
    Resolver,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "jswatch", version, about = "Watch remote JavaScript assets for changes")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, default_value = "jswatch.toml")]
    config: PathBuf,

    /// Extra targets: legacy monitor JSON (`*.json`) or one URL per line.
    #[arg(long)]
    targets: Option<PathBuf>,

    /// Run a single cycle, write the report and exit.
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Log filter (overrides RUST_LOG and the config's log_level).
    #[arg(long)]
    log: Option<String>,

    /// Override check_interval_minutes.
    #[arg(long)]
    interval_minutes: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing config is fine when targets come from --targets alone.
    let mut config = if !cli.config.exists() && cli.targets.is_some() {
        Config::default()
    } else {
        Config::load_from(&cli.config)?
    };
    if let Some(minutes) = cli.interval_minutes {
        config.check_interval_minutes = minutes;
    }

    let env_filter = std::env::var("RUST_LOG").ok();
    let filter = log_filter(cli.log.as_deref(), env_filter.as_deref(), &config.log_level);
    let file_layer = match &config.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file_writer(path)?),
        ),
        None => None,
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&filter).with_context(|| format!("invalid log filter {filter:?}"))?)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    config.validate()?;
    let mut specs = config.targets.clone();
    if let Some(path) = &cli.targets {
        specs.extend(load_targets_file(path)?);
    }
    let targets = build_descriptors(&specs).context("invalid target configuration")?;
    if targets.is_empty() {
        bail!("no targets configured");
    }

    info!(
        targets = targets.len(),
        storage = %config.storage_dir.display(),
        report = %config.report_file.display(),
        "starting jswatch"
    );

    let fetcher = HttpFetcher::new(config.request_timeout(), config.user_agent.as_deref())
        .context("build http client")?;
    let store = FsVersionStore::open(&config.storage_dir)
        .with_context(|| format!("open storage {}", config.storage_dir.display()))?;

    let mut orchestrator = Orchestrator::new(
        Resolver::new(fetcher),
        store,
        Differ::new(config.context_lines, config.normalize),
        Reporter::new(config.report_format),
    )
    .with_report_file(&config.report_file)
    .with_interval(config.interval());
    if config.changelog {
        orchestrator = orchestrator.with_changelog(ChangeLog::new(config.changelog_dir()));
    }
    if let Some(telegram) = &config.telegram {
        orchestrator = orchestrator.with_notifier(Box::new(TelegramNotifier::new(telegram.clone())));
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    if cli.once {
        let entries = orchestrator.run_once(&targets, &cancel).await;
        info!(entries = entries.len(), "single check finished");
    } else {
        orchestrator.run(&targets, cancel).await;
    }

    info!(processed = orchestrator.processed().len(), "jswatch stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        let mut term = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = signal::ctrl_c().await;
                info!("shutdown requested");
                cancel.cancel();
                return;
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
    info!("shutdown requested");
    cancel.cancel();
}
