//! Scheduler, consent session and command gateway wired together

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use updraft_engine::{
    ChannelRegistry, ChannelTransport, CommandGateway, ConsentOutcome, ConsentPrompt,
    ConsentSession, Delivery, NO_LABEL, NotificationDescriptor, SchedulerHandle, SchedulerPhase,
    SchedulerSettings, UpdateGateway, UpdateScheduler, YES_NOW_LABEL, YES_ON_QUIT_LABEL,
};

use crate::common::{FakeUpdater, token_for, wait_for_file};

const SETTLE: Duration = Duration::from_secs(5);

/// Start a production scheduler with an hour between checks.
fn start(updater: FakeUpdater) -> (SchedulerHandle, Parts) {
    let quit = CancellationToken::new();
    let gateway = Arc::new(CommandGateway::new(updater.gateway_config(), quit.clone()));
    let registry = ChannelRegistry::new("notification:");
    let (transport, surface) = ChannelTransport::new(4);
    let session = ConsentSession::new(
        registry.clone(),
        gateway.clone(),
        Arc::new(transport),
        ConsentPrompt::default(),
    );
    let settings = SchedulerSettings {
        interval: Duration::from_secs(60 * 60),
        ..SchedulerSettings::default()
    };
    let handle = UpdateScheduler::new(settings, gateway.clone(), session)
        .start()
        .expect("production scheduler starts");
    (
        handle,
        Parts {
            updater,
            gateway,
            registry,
            surface,
            quit,
        },
    )
}

struct Parts {
    updater: FakeUpdater,
    gateway: Arc<CommandGateway>,
    registry: ChannelRegistry,
    surface: mpsc::Receiver<NotificationDescriptor>,
    quit: CancellationToken,
}

async fn next_prompt(surface: &mut mpsc::Receiver<NotificationDescriptor>) -> NotificationDescriptor {
    tokio::time::timeout(SETTLE, surface.recv())
        .await
        .expect("prompt shown")
        .expect("surface open")
}

async fn wait_idle(handle: &SchedulerHandle) {
    let mut phase = handle.watch_phase();
    tokio::time::timeout(SETTLE, phase.wait_for(|p| *p == SchedulerPhase::Idle))
        .await
        .expect("scheduler settles")
        .expect("scheduler alive");
}

#[tokio::test]
async fn yes_now_downloads_then_installs_and_quits() {
    let (handle, mut parts) = start(FakeUpdater::offering("5.2.0"));

    let prompt = next_prompt(&mut parts.surface).await;
    assert_eq!(prompt.title, "Updraft Updater");
    assert_eq!(
        prompt.body,
        "Version 5.2.0 of Updraft is now available. Would you like to update?"
    );

    assert_eq!(
        parts.registry.invoke(token_for(&prompt, YES_NOW_LABEL)),
        Delivery::Accepted(updraft_engine::ConsentChoice::YesNow)
    );
    tokio::time::timeout(SETTLE, parts.quit.cancelled())
        .await
        .expect("quit requested");

    let downloaded = std::fs::read_to_string(parts.updater.downloaded_marker()).unwrap();
    assert_eq!(downloaded, "5.2.0");
    let installed = wait_for_file(&parts.updater.installed_marker(), SETTLE).await;
    assert_eq!(installed.as_deref(), Some("5.2.0"));

    handle.stop().await;
    assert_eq!(parts.registry.live_routes(), 0);
}

#[tokio::test]
async fn yes_on_quit_defers_install_to_exit() {
    let (handle, mut parts) = start(FakeUpdater::offering("5.2.0"));

    let prompt = next_prompt(&mut parts.surface).await;
    parts
        .registry
        .invoke(token_for(&prompt, YES_ON_QUIT_LABEL));
    wait_idle(&handle).await;

    assert!(parts.gateway.auto_install_on_app_quit());
    assert!(!parts.quit.is_cancelled());
    assert!(!parts.updater.installed_marker().exists());

    handle.stop().await;
    assert!(parts.gateway.install_on_quit().await.unwrap());
    let installed = std::fs::read_to_string(parts.updater.installed_marker()).unwrap();
    assert_eq!(installed, "5.2.0");
}

#[tokio::test]
async fn declining_touches_nothing() {
    let (handle, mut parts) = start(FakeUpdater::offering("5.2.0"));

    let prompt = next_prompt(&mut parts.surface).await;
    // Dismissing the prompt reports on the "No" channel.
    assert_eq!(prompt.close_channel.as_str(), token_for(&prompt, NO_LABEL));
    parts.registry.invoke(prompt.close_channel.as_str());
    wait_idle(&handle).await;

    assert!(!parts.updater.downloaded_marker().exists());
    assert!(!parts.gateway.auto_install_on_app_quit());
    assert_eq!(
        parts.registry.invoke(token_for(&prompt, YES_NOW_LABEL)),
        Delivery::Unknown
    );

    handle.stop().await;
    assert!(!parts.gateway.install_on_quit().await.unwrap());
}

#[tokio::test]
async fn later_checks_do_not_change_the_consented_release() {
    let (handle, mut parts) = start(FakeUpdater::offering("5.2.0"));
    let prompt = next_prompt(&mut parts.surface).await;

    parts.updater.set_feed(Some("5.2.1"));
    parts.gateway.check_for_updates().await.unwrap();
    parts.updater.set_feed(None);
    parts.gateway.check_for_updates().await.unwrap();

    parts
        .registry
        .invoke(token_for(&prompt, YES_ON_QUIT_LABEL));
    wait_idle(&handle).await;

    let downloaded = std::fs::read_to_string(parts.updater.downloaded_marker()).unwrap();
    assert_eq!(downloaded, "5.2.0");
    assert!(parts.gateway.auto_install_on_app_quit());
    // The 5.2.1 announcement arrived while the prompt was open.
    assert!(parts.surface.try_recv().is_err());

    handle.stop().await;
}

#[tokio::test]
async fn up_to_date_never_prompts() {
    let (handle, mut parts) = start(FakeUpdater::up_to_date());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(parts.surface.try_recv().is_err());
    assert!(parts.gateway.pending_release().is_none());

    handle.stop().await;
}

#[tokio::test]
async fn standalone_session_reports_outcome() {
    let updater = FakeUpdater::offering("6.0.0");
    let quit = CancellationToken::new();
    let gateway = Arc::new(CommandGateway::new(updater.gateway_config(), quit));
    let registry = ChannelRegistry::new("notification:");
    let (transport, mut surface) = ChannelTransport::new(1);
    let session = ConsentSession::new(
        registry.clone(),
        gateway.clone(),
        Arc::new(transport),
        ConsentPrompt::default(),
    );

    let mut events = gateway.subscribe();
    gateway.check_for_updates().await.unwrap();
    let Ok(updraft_engine::GatewayEvent::UpdateAvailable(release)) = events.recv().await else {
        panic!("expected an update");
    };

    let responder = tokio::spawn(async move {
        let prompt = surface.recv().await.unwrap();
        registry.invoke(token_for(&prompt, YES_ON_QUIT_LABEL));
    });
    let outcome = session.request_consent(&release).await.unwrap();
    responder.await.unwrap();

    assert_eq!(outcome, ConsentOutcome::InstallOnQuit);
    assert_eq!(
        gateway.downloaded_release().map(|r| r.version().to_string()),
        Some("6.0.0".to_string())
    );
}
