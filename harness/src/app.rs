//! Launching and tearing down a packaged host under test.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::logs::{LogBuffer, LogSource, LogWaitError, wait_for_logs_to_contain_within};

pub const START_TIMEOUT: Duration = Duration::from_secs(30);
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(60);
/// Grace period between the polite stop and the forced kill.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("platform {0} is not supported")]
    UnsupportedPlatform(String),
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("failed to remove {path}: {source}")]
    ClearLibrary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} did not start within {timeout:?}")]
    StartTimedOut { path: PathBuf, timeout: Duration },
}

/// Names a packaged host goes by on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    /// Display name, used for the Windows/macOS binaries and the config dir.
    pub product_name: String,
    /// Lower-case executable name used by Linux packages.
    pub linux_executable: String,
}

impl AppIdentity {
    #[must_use]
    pub fn new(product_name: impl Into<String>, linux_executable: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            linux_executable: linux_executable.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTestingPaths {
    /// Packaged executable, relative to the repository root.
    pub testing_path: PathBuf,
    /// Per-user config directory the host writes on first run.
    pub library_path: PathBuf,
}

impl AppTestingPaths {
    pub fn for_current_platform(app: &AppIdentity) -> Result<Self, HarnessError> {
        Self::for_platform(std::env::consts::OS, app, |key| {
            std::env::var_os(key).or_else(|| {
                (key == "HOME")
                    .then(dirs::home_dir)
                    .flatten()
                    .map(PathBuf::into_os_string)
            })
        })
    }

    /// `os` uses [`std::env::consts::OS`] names.
    pub fn for_platform(
        os: &str,
        app: &AppIdentity,
        env: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self, HarnessError> {
        let home = || env("HOME").map(PathBuf::from).ok_or(HarnessError::MissingEnv("HOME"));
        let product = app.product_name.as_str();

        match os {
            "windows" => Ok(Self {
                testing_path: PathBuf::from(format!("./dist/win-unpacked/{product}.exe")),
                library_path: PathBuf::from(env("APPDATA").ok_or(HarnessError::MissingEnv("APPDATA"))?)
                    .join(product),
            }),
            "linux" => {
                let config_home = match env("XDG_CONFIG_HOME") {
                    Some(dir) if !dir.is_empty() => PathBuf::from(dir),
                    _ => home()?.join(".config"),
                };
                Ok(Self {
                    testing_path: PathBuf::from(format!(
                        "./dist/linux-unpacked/{}",
                        app.linux_executable
                    )),
                    library_path: config_home.join(product),
                })
            }
            "macos" => Ok(Self {
                testing_path: PathBuf::from(format!(
                    "./dist/mac/{product}.app/Contents/MacOS/{product}"
                )),
                library_path: home()?.join("Library/Application Support").join(product),
            }),
            other => Err(HarnessError::UnsupportedPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub start_timeout: Duration,
    pub wait_timeout: Duration,
    pub env: Vec<(String, String)>,
}

impl LaunchOptions {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            start_timeout: START_TIMEOUT,
            wait_timeout: WAIT_TIMEOUT,
            env: vec![("CICD".to_string(), "true".to_string())],
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Launch options for the packaged `app`, after removing any config left
/// behind by a previous run.
pub fn setup(app: &AppIdentity) -> Result<LaunchOptions, HarnessError> {
    setup_with(&AppTestingPaths::for_current_platform(app)?)
}

pub fn setup_with(paths: &AppTestingPaths) -> Result<LaunchOptions, HarnessError> {
    remove_library(&paths.library_path)?;
    Ok(LaunchOptions::new(&paths.testing_path))
}

fn remove_library(path: &Path) -> Result<(), HarnessError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(HarnessError::ClearLibrary {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// A running host whose stdout and stderr are collected into a [`LogBuffer`].
#[derive(Debug)]
pub struct AppUnderTest {
    child: Child,
    logs: LogBuffer,
    wait_timeout: Duration,
}

impl AppUnderTest {
    /// Spawn the host and wait, up to the start timeout, for its first line
    /// of output.
    pub async fn launch(options: &LaunchOptions) -> Result<Self, HarnessError> {
        let mut child = Command::new(&options.path)
            .args(&options.args)
            .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HarnessError::Launch {
                path: options.path.clone(),
                source,
            })?;

        let logs = LogBuffer::new();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(collect_lines(stdout, logs.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(collect_lines(stderr, logs.clone()));
        }

        let started = tokio::time::timeout(options.start_timeout, async {
            while logs.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        if started.is_err() {
            if let Err(e) = child.kill().await {
                tracing::error!(
                    path = %options.path.display(),
                    error = %e,
                    "Failed to kill app that never produced output"
                );
            }
            return Err(HarnessError::StartTimedOut {
                path: options.path.clone(),
                timeout: options.start_timeout,
            });
        }

        tracing::debug!(path = %options.path.display(), pid = ?child.id(), "Launched app under test");
        Ok(Self {
            child,
            logs,
            wait_timeout: options.wait_timeout,
        })
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    #[must_use]
    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    /// Wait for `values` in `source` logs, bounded by the launch wait timeout.
    pub async fn wait_for_logs(
        &self,
        source: LogSource,
        values: &[&str],
    ) -> Result<(), LogWaitError> {
        wait_for_logs_to_contain_within(&self.logs, source, values, Some(self.wait_timeout)).await
    }
}

async fn collect_lines(stream: impl AsyncRead + Unpin, logs: LogBuffer) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        logs.push(line);
    }
}

/// Stop the host: ask politely, wait [`STOP_GRACE`], then kill it.
///
/// Failures are logged and swallowed so a broken teardown never masks the
/// test's own result.
pub async fn tear_down(mut app: AppUnderTest) {
    request_stop(&app.child);

    match tokio::time::timeout(STOP_GRACE, app.child.wait()).await {
        Ok(Ok(status)) => {
            tracing::debug!(%status, "App under test exited");
            return;
        }
        Ok(Err(e)) => tracing::error!(error = %e, "Failed to wait for app under test"),
        Err(_) => tracing::warn!("App under test ignored stop request"),
    }

    if let Err(e) = app.child.kill().await {
        tracing::error!(error = %e, "Failed to kill app under test");
    }
}

#[cfg(unix)]
fn request_stop(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill has no memory-safety preconditions; pid came from our child.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == -1 {
        tracing::error!(
            error = %std::io::Error::last_os_error(),
            "Failed to signal app under test"
        );
    }
}

#[cfg(not(unix))]
fn request_stop(_child: &Child) {}
