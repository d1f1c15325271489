//! Periodic update checks and the consent sessions they trigger.
//!
//! # Loops
//!
//! [`UpdateScheduler::start`] spawns two tasks that share one cancellation
//! token:
//!
//! - **check loop**: `check_for_updates()`, then sleep for the interval,
//!   forever. Failures are logged and never stop the loop.
//! - **event loop**: turns each `UpdateAvailable` event into one consent
//!   session and awaits it. Events that arrive while a session is open are
//!   discarded, so sessions never overlap.
//!
//! The check loop does not wait for the user. A check that fires while a
//! prompt is open still runs; its event is discarded.
//!
//! ```text
//! Idle -> Checking -> Idle
//!                  \-> (event) AwaitingConsent -> Idle
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use updraft_config::{DEFAULT_CHECK_INTERVAL_SECS, UpdaterConfig};
use updraft_types::ExecutionMode;

use crate::consent::ConsentSession;
use crate::gateway::{GatewayEvent, UpdateGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Checking,
    AwaitingConsent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub mode: ExecutionMode,
    pub interval: Duration,
    pub consent_timeout: Option<Duration>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Production,
            interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            consent_timeout: None,
        }
    }
}

impl SchedulerSettings {
    #[must_use]
    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self {
            mode: config.mode,
            interval: config.check_interval(),
            consent_timeout: config.consent_timeout(),
        }
    }
}

/// Run one update check, logging any failure. Returns whether it succeeded.
pub async fn check_for_updates(gateway: &dyn UpdateGateway) -> bool {
    match gateway.check_for_updates().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Update check failed");
            false
        }
    }
}

pub struct UpdateScheduler {
    settings: SchedulerSettings,
    gateway: Arc<dyn UpdateGateway>,
    consent: ConsentSession,
}

impl UpdateScheduler {
    /// The session's own timeout is replaced by `settings.consent_timeout`.
    #[must_use]
    pub fn new(
        settings: SchedulerSettings,
        gateway: Arc<dyn UpdateGateway>,
        consent: ConsentSession,
    ) -> Self {
        let consent = consent.with_timeout(settings.consent_timeout);
        Self {
            settings,
            gateway,
            consent,
        }
    }

    /// Start both loops on the current Tokio runtime.
    ///
    /// Returns `None` without touching the gateway in development and test
    /// modes.
    #[must_use]
    pub fn start(self) -> Option<SchedulerHandle> {
        if self.settings.mode.suppresses_update_checks() {
            tracing::info!(mode = %self.settings.mode, "Update checks disabled");
            return None;
        }

        self.gateway.set_auto_install_on_app_quit(false);
        let events = self.gateway.subscribe();
        let cancel = CancellationToken::new();
        let (phase_tx, phase_rx) = watch::channel(SchedulerPhase::Idle);
        let phase_tx = Arc::new(phase_tx);

        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            "Starting update checks"
        );

        let check_task = tokio::spawn(run_check_loop(
            Arc::clone(&self.gateway),
            self.settings.interval,
            cancel.clone(),
            Arc::clone(&phase_tx),
        ));
        let event_task = tokio::spawn(run_event_loop(
            events,
            self.consent,
            cancel.clone(),
            phase_tx,
        ));

        Some(SchedulerHandle {
            cancel,
            phase: phase_rx,
            tasks: vec![check_task, event_task],
        })
    }
}

/// Owner of a running scheduler. Dropping it cancels the loops without
/// waiting for them; prefer [`SchedulerHandle::stop`].
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    phase: watch::Receiver<SchedulerPhase>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    #[must_use]
    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<SchedulerPhase> {
        self.phase.clone()
    }

    /// Cancel both loops and wait for them to finish. An open consent
    /// session is dropped and its backchannels retired.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await
                && e.is_panic()
            {
                tracing::error!("Update scheduler task panicked: {e}");
            }
        }
        tracing::info!("Update checks stopped");
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_check_loop(
    gateway: Arc<dyn UpdateGateway>,
    interval: Duration,
    cancel: CancellationToken,
    phase: Arc<watch::Sender<SchedulerPhase>>,
) {
    loop {
        transition(&phase, SchedulerPhase::Idle, SchedulerPhase::Checking);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = check_for_updates(gateway.as_ref()) => {}
        }
        transition(&phase, SchedulerPhase::Checking, SchedulerPhase::Idle);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    tracing::debug!("Update check loop exited");
}

async fn run_event_loop(
    mut events: broadcast::Receiver<GatewayEvent>,
    consent: ConsentSession,
    cancel: CancellationToken,
    phase: Arc<watch::Sender<SchedulerPhase>>,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(GatewayEvent::UpdateAvailable(release)) => {
                tracing::info!(version = release.version(), "Update available");
                phase.send_replace(SchedulerPhase::AwaitingConsent);
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    result = consent.request_consent(&release) => Some(result),
                };
                transition(&phase, SchedulerPhase::AwaitingConsent, SchedulerPhase::Idle);

                match result {
                    None => break,
                    Some(Ok(outcome)) => {
                        tracing::info!(version = release.version(), %outcome, "Update consent resolved");
                    }
                    Some(Err(e)) => {
                        tracing::error!(version = release.version(), error = %e, "Update notification failed");
                    }
                }
                discard_backlog(&mut events);
            }
            Ok(GatewayEvent::UpdateNotAvailable) => {
                tracing::debug!("No update available");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Update events lagged");
            }
            Err(RecvError::Closed) => {
                tracing::debug!("Gateway event stream closed");
                break;
            }
        }
    }
    tracing::debug!("Update event loop exited");
}

/// Drop events that queued up while a consent session was open.
fn discard_backlog(events: &mut broadcast::Receiver<GatewayEvent>) {
    loop {
        match events.try_recv() {
            Ok(GatewayEvent::UpdateAvailable(release)) => {
                tracing::info!(
                    version = release.version(),
                    "Ignoring update event received while a notification was open"
                );
            }
            Ok(GatewayEvent::UpdateNotAvailable) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn transition(phase: &watch::Sender<SchedulerPhase>, from: SchedulerPhase, to: SchedulerPhase) {
    phase.send_if_modified(|current| {
        if *current == from {
            *current = to;
            true
        } else {
            false
        }
    });
}
