//! Integration-test helpers for packaged Updraft hosts.
//!
//! Launch the packaged binary with [`setup`] and [`AppUnderTest::launch`],
//! wait on its output with [`wait_for_logs_to_contain`], and always finish
//! with [`tear_down`].

mod app;
mod logs;

pub use app::{
    AppIdentity, AppTestingPaths, AppUnderTest, HarnessError, LaunchOptions, START_TIMEOUT,
    STOP_GRACE, WAIT_TIMEOUT, setup, setup_with, tear_down,
};
pub use logs::{
    LogBuffer, LogFeed, LogSource, LogWaitError, POLL_INTERVAL, wait_for_logs_to_contain,
    wait_for_logs_to_contain_within,
};

/// Return early from a test unless `cond` holds.
///
/// ```ignore
/// #[test]
/// fn installs_on_linux() {
///     updraft_harness::skip_unless!(cfg!(target_os = "linux"), "linux packages only");
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! skip_unless {
    ($cond:expr) => {
        $crate::skip_unless!($cond, stringify!($cond))
    };
    ($cond:expr, $reason:expr) => {
        if !$cond {
            eprintln!("Skipping test: {}", $reason);
            return;
        }
    };
}
