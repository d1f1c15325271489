//! Updraft CLI - background update checks with a terminal consent prompt.
//!
//! ```text
//! updraft [run]   scheduler until Ctrl-C or an install request, then install-on-quit
//! updraft check   one check; prompt if an update exists
//! ```
//!
//! Arguments are parsed with clap; see [`Cli`].
//!
//! Prompts are written to stderr and answered on stdin. Logs never go to the
//! terminal; see [`init_tracing`].

mod terminal;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use updraft_config::UpdraftConfig;
use updraft_engine::{
    ChannelRegistry, CommandGateway, ConsentPrompt, ConsentSession, GatewayEvent,
    SchedulerSettings, UpdateGateway, UpdateScheduler, check_for_updates,
};

use terminal::TerminalTransport;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Without a log file, stay silent rather than interleave with prompts.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.updraft/logs/updraft.log
    if let Some(config_path) = UpdraftConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("updraft.log"));
    }

    candidates.push(PathBuf::from(".updraft").join("logs").join("updraft.log"));

    candidates
}

#[derive(Parser, Debug)]
#[command(name = "updraft", version)]
#[command(about = "Background update checks with interactive install consent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    fn selected(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Check on a schedule until Ctrl-C or an install request (default)
    Run,
    /// Check once and prompt if an update exists
    Check,
}

struct Host {
    config: UpdraftConfig,
    gateway: Arc<CommandGateway>,
    quit: CancellationToken,
}

impl Host {
    fn new(config: UpdraftConfig) -> Result<Self> {
        let gateway_config = config.gateway.clone().with_context(|| {
            format!(
                "no [gateway] section in {}",
                UpdraftConfig::path().map_or_else(|| "config".to_string(), |p| p.display().to_string())
            )
        })?;
        let quit = CancellationToken::new();
        let gateway = Arc::new(CommandGateway::new(gateway_config, quit.clone()));
        Ok(Self {
            config,
            gateway,
            quit,
        })
    }

    fn consent_session(&self) -> Result<ConsentSession> {
        let registry = ChannelRegistry::new(self.config.updater.channel_prefix.clone());
        let transport =
            TerminalTransport::new(registry.clone()).context("failed to start terminal input")?;
        Ok(ConsentSession::new(
            registry,
            self.gateway.clone(),
            Arc::new(transport),
            ConsentPrompt::from_config(&self.config.notification),
        )
        .with_timeout(self.config.updater.consent_timeout()))
    }

    async fn run(&self) -> Result<()> {
        let scheduler = UpdateScheduler::new(
            SchedulerSettings::from_config(&self.config.updater),
            self.gateway.clone(),
            self.consent_session()?,
        )
        .start();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted, shutting down");
            }
            () = self.quit.cancelled() => {
                tracing::info!("Installer requested exit");
            }
        }

        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }
        self.finish().await;
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        let mut events = self.gateway.subscribe();
        if !check_for_updates(self.gateway.as_ref()).await {
            bail!("update check failed, see the log for details");
        }

        match events.try_recv() {
            Ok(GatewayEvent::UpdateAvailable(release)) => {
                let outcome = self
                    .consent_session()?
                    .request_consent(&release)
                    .await
                    .context("update prompt failed")?;
                println!("{}: {outcome}", release.version());
            }
            Ok(GatewayEvent::UpdateNotAvailable) => println!("No update available"),
            Err(e) => bail!("update check produced no result: {e}"),
        }

        self.finish().await;
        Ok(())
    }

    async fn finish(&self) {
        match self.gateway.install_on_quit().await {
            Ok(true) => tracing::info!("Update installed on exit"),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "Install on exit failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let command = Cli::parse().selected();
    let config = UpdraftConfig::load_or_default()?;
    tracing::info!(mode = %config.updater.mode, ?command, "Starting updraft");

    let host = Host::new(config)?;
    match command {
        Command::Run => host.run().await,
        Command::Check => host.check().await,
    }
}
