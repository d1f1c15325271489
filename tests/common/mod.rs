//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use updraft_config::GatewayConfig;
use updraft_engine::NotificationDescriptor;

/// A fake updater engine living in a temp directory.
///
/// The check command prints the feed file, which holds the announced
/// release as JSON or `null`. Download and install commands record the
/// `UPDRAFT_VERSION` they were given in marker files.
pub struct FakeUpdater {
    pub dir: tempfile::TempDir,
}

impl FakeUpdater {
    pub fn offering(version: &str) -> Self {
        let updater = Self::new();
        updater.set_feed(Some(version));
        updater
    }

    pub fn up_to_date() -> Self {
        let updater = Self::new();
        updater.set_feed(None);
        updater
    }

    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Change what the next check announces.
    pub fn set_feed(&self, version: Option<&str>) {
        let contents = match version {
            Some(version) => format!(r#"{{"version":"{version}"}}"#),
            None => "null".to_string(),
        };
        std::fs::write(self.feed(), contents).expect("write feed");
    }

    pub fn feed(&self) -> PathBuf {
        self.dir.path().join("feed")
    }

    pub fn downloaded_marker(&self) -> PathBuf {
        self.dir.path().join("downloaded")
    }

    pub fn installed_marker(&self) -> PathBuf {
        self.dir.path().join("installed")
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            check_command: format!("cat '{}'", self.feed().display()),
            download_command: record_version(&self.downloaded_marker()),
            install_command: record_version(&self.installed_marker()),
            command_timeout_secs: 10,
        }
    }
}

fn record_version(marker: &Path) -> String {
    format!("printf '%s' \"$UPDRAFT_VERSION\" > '{}'", marker.display())
}

/// Poll until `path` exists, for processes we do not wait on.
pub async fn wait_for_file(path: &Path, timeout: Duration) -> Option<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Ok(contents) = std::fs::read_to_string(path)
            && !contents.is_empty()
        {
            return Some(contents);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    None
}

/// Backchannel token of the button labelled `label`.
pub fn token_for<'a>(descriptor: &'a NotificationDescriptor, label: &str) -> &'a str {
    descriptor
        .button(label)
        .unwrap_or_else(|| panic!("no button labelled {label:?}"))
        .backchannel
        .as_str()
}
