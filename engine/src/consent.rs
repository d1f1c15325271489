//! One interactive consent exchange per discovered release.
//!
//! ```text
//! allocate 3 ids -> register routes -> send descriptor -> wait for one choice
//!                                                             |
//!        InstallNow:    download, quit_and_install             |
//!        InstallOnQuit: download, auto_install_on_app_quit     v
//!        Declined:      nothing                        routes already retired
//! ```
//!
//! Routes are registered before the descriptor leaves, so no response can
//! arrive ahead of its handler. Dismissing the notification reports on the
//! "No" channel, which makes it indistinguishable from declining.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use updraft_config::NotificationConfig;
use updraft_types::{
    ButtonDescriptor, ConsentOutcome, NotificationDescriptor, ReleaseInfo, Severity,
};

use crate::gateway::{GatewayError, UpdateGateway};
use crate::registry::{ChannelRegistry, ConsentChannels};
use crate::transport::{NotificationTransport, TransportError};

pub const YES_NOW_LABEL: &str = "Yes, now";
pub const YES_ON_QUIT_LABEL: &str = "Yes, on quit";
pub const NO_LABEL: &str = "No";

#[derive(Debug, Error)]
pub enum ConsentError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no response to the update notification within {0:?}")]
    TimedOut(Duration),
    #[error("update notification was withdrawn without a response")]
    Abandoned,
    #[error("update download failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// Wording of the update prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentPrompt {
    pub title: String,
    pub product_name: String,
}

impl Default for ConsentPrompt {
    fn default() -> Self {
        Self::from_config(&NotificationConfig::default())
    }
}

impl ConsentPrompt {
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            title: config.title.clone(),
            product_name: config.product_name.clone(),
        }
    }

    #[must_use]
    pub fn body(&self, release: &ReleaseInfo) -> String {
        format!(
            "Version {} of {} is now available. Would you like to update?",
            release.version(),
            self.product_name
        )
    }

    #[must_use]
    pub fn descriptor(
        &self,
        release: &ReleaseInfo,
        channels: &ConsentChannels,
    ) -> NotificationDescriptor {
        NotificationDescriptor {
            title: self.title.clone(),
            body: self.body(release),
            status: Severity::Info,
            buttons: vec![
                ButtonDescriptor::action(YES_NOW_LABEL, channels.yes_now.clone()),
                ButtonDescriptor::action(YES_ON_QUIT_LABEL, channels.yes_later.clone()),
                ButtonDescriptor::secondary(NO_LABEL, channels.no.clone()),
            ],
            close_channel: channels.no.clone(),
        }
    }
}

/// Runs consent exchanges against one gateway and one transport.
pub struct ConsentSession {
    registry: ChannelRegistry,
    gateway: Arc<dyn UpdateGateway>,
    transport: Arc<dyn NotificationTransport>,
    prompt: ConsentPrompt,
    timeout: Option<Duration>,
}

impl ConsentSession {
    #[must_use]
    pub fn new(
        registry: ChannelRegistry,
        gateway: Arc<dyn UpdateGateway>,
        transport: Arc<dyn NotificationTransport>,
        prompt: ConsentPrompt,
    ) -> Self {
        Self {
            registry,
            gateway,
            transport,
            prompt,
            timeout: None,
        }
    }

    /// Bound the wait for a response. `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Ask the user about `release` and carry out the answer.
    ///
    /// For [`ConsentOutcome::InstallNow`] the gateway is told to quit and
    /// install before this returns; hosts should expect to be shut down.
    pub async fn request_consent(
        &self,
        release: &ReleaseInfo,
    ) -> Result<ConsentOutcome, ConsentError> {
        let channels = self.registry.allocate_consent_channels();
        let mut pending = self.registry.register(channels);
        let descriptor = self.prompt.descriptor(release, pending.channels());

        self.transport.send(descriptor).await?;
        tracing::info!(version = release.version(), "Update notification sent");

        let response = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, pending.wait()).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(
                        version = release.version(),
                        "No response to update notification within {limit:?}"
                    );
                    return Err(ConsentError::TimedOut(limit));
                }
            },
            None => pending.wait().await,
        };
        let choice = response.map_err(|_| ConsentError::Abandoned)?;
        drop(pending);

        let outcome = choice.outcome();
        self.apply(outcome, release).await?;
        Ok(outcome)
    }

    async fn apply(&self, outcome: ConsentOutcome, release: &ReleaseInfo) -> Result<(), ConsentError> {
        match outcome {
            ConsentOutcome::InstallNow => {
                tracing::info!(version = release.version(), "User chose to update immediately");
                self.gateway.download_release(release).await?;
                self.gateway.quit_and_install();
            }
            ConsentOutcome::InstallOnQuit => {
                tracing::info!(version = release.version(), "User chose to update on quit");
                self.gateway.download_release(release).await?;
                self.gateway.set_auto_install_on_app_quit(true);
            }
            ConsentOutcome::Declined => {
                tracing::info!(version = release.version(), "User chose not to update");
            }
        }
        Ok(())
    }
}
