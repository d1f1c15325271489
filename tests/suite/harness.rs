//! Driving a host process through the test harness

use updraft_harness::{
    AppIdentity, AppTestingPaths, AppUnderTest, LaunchOptions, LogSource, LogWaitError,
    skip_unless, tear_down,
};

const HOST_SCRIPT: &str = r#"
echo "main: checking for updates"
sleep 1
echo "[1234:0102/030405.678901:INFO:CONSOLE(7)] not a renderer line"
echo "[12345:0102/030405.678901:INFO:CONSOLE(7)] renderer: update prompt shown" >&2
echo "main: update available 5.2.0"
exec sleep 60
"#;

fn host() -> LaunchOptions {
    let mut options = LaunchOptions::new("/bin/sh").with_args(["-c", HOST_SCRIPT]);
    options.wait_timeout = std::time::Duration::from_secs(3);
    options
}

#[tokio::test]
async fn waits_on_main_and_renderer_logs_separately() {
    let app = AppUnderTest::launch(&host()).await.unwrap();

    app.wait_for_logs(LogSource::Main, &["checking for updates", "update available 5.2.0"])
        .await
        .unwrap();
    app.wait_for_logs(LogSource::Renderer, &["update prompt shown"])
        .await
        .unwrap();

    let err = app
        .wait_for_logs(LogSource::Renderer, &["not a renderer line"])
        .await
        .unwrap_err();
    let LogWaitError::TimedOut { missing, .. } = err;
    assert_eq!(missing, vec!["not a renderer line".to_string()]);

    tear_down(app).await;
}

#[test]
fn packaged_layout_for_this_platform() {
    skip_unless!(
        cfg!(any(target_os = "linux", target_os = "macos")),
        "packaged layout only defined for linux and macos here"
    );
    let paths = AppTestingPaths::for_current_platform(&AppIdentity::new("Updraft", "updraft"))
        .unwrap();
    assert!(paths.testing_path.starts_with("./dist"));
    assert!(paths.library_path.ends_with("Updraft"));
}
