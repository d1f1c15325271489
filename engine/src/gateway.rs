//! Boundary to the engine that actually checks, downloads, and installs updates.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use updraft_types::ReleaseInfo;

/// Capacity of a gateway's event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Gateway operation future type alias.
pub type GatewayFut<'a> = Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send + 'a>>;

/// Out-of-band result of an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    UpdateAvailable(ReleaseInfo),
    UpdateNotAvailable,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
    #[error("unrecognized update check output: {0}")]
    InvalidResponse(String),
    #[error("no update is pending download")]
    NoPendingRelease,
    #[error("{0}")]
    Other(String),
}

/// The update engine as seen by the scheduler and consent sessions.
///
/// `check_for_updates` reports its finding through [`GatewayEvent`]s on the
/// broadcast channel returned by `subscribe`, not through its return value.
/// Hosts must subscribe before the first check.
pub trait UpdateGateway: Send + Sync {
    fn check_for_updates(&self) -> GatewayFut<'_>;

    /// Download the release announced by the last `UpdateAvailable` event.
    fn download_update(&self) -> GatewayFut<'_>;

    /// Download `release`, the one a consent prompt showed the user.
    ///
    /// Gateways that remember every announced release override this so a
    /// later check cannot change what gets downloaded. The default defers to
    /// [`UpdateGateway::download_update`].
    fn download_release<'a>(&'a self, _release: &'a ReleaseInfo) -> GatewayFut<'a> {
        self.download_update()
    }

    /// Hand the downloaded release to the installer and ask the host to exit.
    /// Callers must not assume the process keeps running afterwards.
    fn quit_and_install(&self);

    fn auto_install_on_app_quit(&self) -> bool;

    fn set_auto_install_on_app_quit(&self, enabled: bool);

    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent>;
}
