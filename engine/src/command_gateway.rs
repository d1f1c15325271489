//! [`UpdateGateway`] backed by shell commands from `[gateway]` config.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use updraft_config::GatewayConfig;
use updraft_types::ReleaseInfo;

use crate::gateway::{EVENT_CHANNEL_CAPACITY, GatewayError, GatewayEvent, GatewayFut, UpdateGateway};
use crate::shell::Shell;

/// Environment variable carrying the release version to download and install
/// commands.
pub const VERSION_ENV_VAR: &str = "UPDRAFT_VERSION";

#[derive(Debug, Default)]
struct DownloadState {
    pending: Option<ReleaseInfo>,
    downloaded: Option<ReleaseInfo>,
}

#[derive(Debug)]
pub struct CommandGateway {
    config: GatewayConfig,
    shell: Shell,
    quit: CancellationToken,
    events: broadcast::Sender<GatewayEvent>,
    state: Mutex<DownloadState>,
    auto_install: AtomicBool,
}

impl CommandGateway {
    /// `quit` is cancelled by [`UpdateGateway::quit_and_install`] to ask the
    /// host to exit.
    #[must_use]
    pub fn new(config: GatewayConfig, quit: CancellationToken) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            shell: Shell::platform(),
            quit,
            events,
            state: Mutex::new(DownloadState::default()),
            auto_install: AtomicBool::new(false),
        }
    }

    /// Latest announced release not yet downloaded. A check that finds
    /// nothing leaves it in place.
    #[must_use]
    pub fn pending_release(&self) -> Option<ReleaseInfo> {
        self.state().pending.clone()
    }

    #[must_use]
    pub fn downloaded_release(&self) -> Option<ReleaseInfo> {
        self.state().downloaded.clone()
    }

    /// Install a downloaded release if the user chose "on quit". Hosts call
    /// this once on their way out. Returns whether an install ran.
    pub async fn install_on_quit(&self) -> Result<bool, GatewayError> {
        if !self.auto_install.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let Some(release) = self.downloaded_release() else {
            return Ok(false);
        };
        tracing::info!(version = release.version(), "Installing update on exit");
        self.run(self.config.install_command(), Some(release.version()))
            .await?;
        Ok(true)
    }

    async fn run(&self, command: String, version: Option<&str>) -> Result<String, GatewayError> {
        let mut cmd = self.shell.command(&command);
        cmd.kill_on_drop(true);
        if let Some(version) = version {
            cmd.env(VERSION_ENV_VAR, version);
        }

        tracing::debug!(%command, "Running gateway command");
        let child = cmd.spawn().map_err(|source| GatewayError::Spawn {
            command: command.clone(),
            source,
        })?;

        let timeout = self.config.command_timeout();
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(GatewayError::Spawn { command, source }),
            Err(_) => return Err(GatewayError::TimedOut { command, timeout }),
        };

        if !output.status.success() {
            return Err(GatewayError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn download(&self, release: ReleaseInfo) -> Result<(), GatewayError> {
        tracing::info!(version = release.version(), "Downloading update");
        self.run(self.config.download_command(), Some(release.version()))
            .await?;

        let mut state = self.state();
        if state.pending.as_ref() == Some(&release) {
            state.pending = None;
        }
        state.downloaded = Some(release);
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, DownloadState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Empty output and `null` both mean "no update".
fn parse_check_output(stdout: &str) -> Result<Option<ReleaseInfo>, GatewayError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<Option<ReleaseInfo>>(trimmed)
        .map_err(|e| GatewayError::InvalidResponse(format!("{e}: {trimmed}")))
}

impl UpdateGateway for CommandGateway {
    fn check_for_updates(&self) -> GatewayFut<'_> {
        Box::pin(async move {
            let stdout = self.run(self.config.check_command(), None).await?;
            let event = match parse_check_output(&stdout)? {
                Some(release) => {
                    self.state().pending = Some(release.clone());
                    GatewayEvent::UpdateAvailable(release)
                }
                None => GatewayEvent::UpdateNotAvailable,
            };
            // No subscribers is not an error for the check itself.
            let _ = self.events.send(event);
            Ok(())
        })
    }

    fn download_update(&self) -> GatewayFut<'_> {
        Box::pin(async move {
            let release = self
                .pending_release()
                .ok_or(GatewayError::NoPendingRelease)?;
            self.download(release).await
        })
    }

    fn download_release<'a>(&'a self, release: &'a ReleaseInfo) -> GatewayFut<'a> {
        Box::pin(self.download(release.clone()))
    }

    fn quit_and_install(&self) {
        let Some(release) = self.downloaded_release() else {
            tracing::warn!("quit_and_install called before any update was downloaded");
            return;
        };

        let command = self.config.install_command();
        let mut cmd = self.shell.detached(&command);
        cmd.env(VERSION_ENV_VAR, release.version());
        match tokio::process::Command::from(cmd).spawn() {
            Ok(_installer) => {
                tracing::info!(version = release.version(), "Installer started, quitting");
                self.quit.cancel();
            }
            Err(e) => {
                tracing::error!(%command, error = %e, "Failed to start installer");
            }
        }
    }

    fn auto_install_on_app_quit(&self) -> bool {
        self.auto_install.load(Ordering::SeqCst)
    }

    fn set_auto_install_on_app_quit(&self, enabled: bool) {
        self.auto_install.store(enabled, Ordering::SeqCst);
    }

    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }
}
