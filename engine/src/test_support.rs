//! Scripted gateway shared by the engine's unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use updraft_types::ReleaseInfo;

use crate::gateway::{EVENT_CHANNEL_CAPACITY, GatewayError, GatewayEvent, GatewayFut, UpdateGateway};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Check,
    Download,
    QuitAndInstall,
    SetAutoInstall(bool),
}

#[derive(Debug, Clone)]
pub(crate) enum CheckResult {
    NoUpdate,
    Update(ReleaseInfo),
    Fail(&'static str),
}

pub(crate) struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    checks: Mutex<VecDeque<CheckResult>>,
    events: broadcast::Sender<GatewayEvent>,
    auto_install: AtomicBool,
    fail_downloads: AtomicBool,
}

impl RecordingGateway {
    pub(crate) fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            checks: Mutex::new(VecDeque::new()),
            events,
            auto_install: AtomicBool::new(false),
            fail_downloads: AtomicBool::new(false),
        })
    }

    /// Results for successive checks; once exhausted every check finds nothing.
    pub(crate) fn script_checks(&self, results: impl IntoIterator<Item = CheckResult>) {
        self.checks.lock().unwrap().extend(results);
    }

    pub(crate) fn fail_downloads(&self) {
        self.fail_downloads.store(true, Ordering::SeqCst);
    }

    pub(crate) fn emit(&self, event: GatewayEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl UpdateGateway for RecordingGateway {
    fn check_for_updates(&self) -> GatewayFut<'_> {
        Box::pin(async move {
            self.record(Call::Check);
            let next = self.checks.lock().unwrap().pop_front();
            match next.unwrap_or(CheckResult::NoUpdate) {
                CheckResult::NoUpdate => {
                    self.emit(GatewayEvent::UpdateNotAvailable);
                    Ok(())
                }
                CheckResult::Update(release) => {
                    self.emit(GatewayEvent::UpdateAvailable(release));
                    Ok(())
                }
                CheckResult::Fail(message) => Err(GatewayError::Other(message.to_string())),
            }
        })
    }

    fn download_update(&self) -> GatewayFut<'_> {
        Box::pin(async move {
            self.record(Call::Download);
            if self.fail_downloads.load(Ordering::SeqCst) {
                return Err(GatewayError::Other("download interrupted".to_string()));
            }
            Ok(())
        })
    }

    fn quit_and_install(&self) {
        self.record(Call::QuitAndInstall);
    }

    fn auto_install_on_app_quit(&self) -> bool {
        self.auto_install.load(Ordering::SeqCst)
    }

    fn set_auto_install_on_app_quit(&self, enabled: bool) {
        self.record(Call::SetAutoInstall(enabled));
        self.auto_install.store(enabled, Ordering::SeqCst);
    }

    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }
}

pub(crate) fn release(version: &str) -> ReleaseInfo {
    ReleaseInfo::new(version).unwrap()
}
