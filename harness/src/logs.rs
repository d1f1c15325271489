//! Waiting on a host's accumulated log output.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

/// Delay between log polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Prefix the renderer process puts on console lines, e.g.
/// `[12345:0102/030405.678901:INFO:CONSOLE(42)]`.
static RENDERER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[0-9]{5}:[0-9]{4}/[0-9]{6}\.[0-9]{6}:[A-Z]+:CONSOLE\([0-9)]+\)\]")
        .expect("valid renderer log prefix regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Renderer,
    Main,
}

impl LogSource {
    /// Which process wrote `line`. Anything without the renderer prefix is
    /// attributed to the main process.
    #[must_use]
    pub fn of(line: &str) -> Self {
        if RENDERER_PREFIX.is_match(line) {
            Self::Renderer
        } else {
            Self::Main
        }
    }

    #[must_use]
    pub fn matches(self, line: &str) -> bool {
        Self::of(line) == self
    }
}

/// An append-only sequence of log lines. Reading never clears it.
pub trait LogFeed: Send + Sync {
    /// Lines at index `cursor` and later.
    fn lines_from(&self, cursor: usize) -> Vec<String>;
}

/// In-memory [`LogFeed`]. Clones share the same lines.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines().push(line.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines().clone()
    }

    fn lines(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LogFeed for LogBuffer {
    fn lines_from(&self, cursor: usize) -> Vec<String> {
        self.lines().get(cursor..).map(<[String]>::to_vec).unwrap_or_default()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogWaitError {
    #[error("logs never contained {missing:?} within {timeout:?}")]
    TimedOut {
        missing: Vec<String>,
        timeout: Duration,
    },
}

/// Wait until every value in `values` has appeared in some `source` line.
///
/// Each line is inspected once; a value may be satisfied by a different
/// line than the others. There is no time limit.
pub async fn wait_for_logs_to_contain(feed: &dyn LogFeed, source: LogSource, values: &[&str]) {
    let mut waiter = LogWaiter::new(values);
    while !waiter.poll(feed, source) {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// [`wait_for_logs_to_contain`] bounded by `timeout`. `None` waits forever.
pub async fn wait_for_logs_to_contain_within(
    feed: &dyn LogFeed,
    source: LogSource,
    values: &[&str],
    timeout: Option<Duration>,
) -> Result<(), LogWaitError> {
    let Some(timeout) = timeout else {
        wait_for_logs_to_contain(feed, source, values).await;
        return Ok(());
    };

    let mut waiter = LogWaiter::new(values);
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if waiter.poll(feed, source) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(LogWaitError::TimedOut {
                missing: waiter.missing.into_iter().collect(),
                timeout,
            });
        }
        tokio::time::sleep_until(deadline.min(tokio::time::Instant::now() + POLL_INTERVAL)).await;
    }
}

struct LogWaiter {
    missing: BTreeSet<String>,
    cursor: usize,
}

impl LogWaiter {
    fn new(values: &[&str]) -> Self {
        Self {
            missing: values.iter().map(|v| (*v).to_string()).collect(),
            cursor: 0,
        }
    }

    /// Scan unseen lines. Returns true once nothing is missing.
    fn poll(&mut self, feed: &dyn LogFeed, source: LogSource) -> bool {
        let fresh = feed.lines_from(self.cursor);
        self.cursor += fresh.len();
        for line in fresh.iter().filter(|line| source.matches(line)) {
            if self.missing.is_empty() {
                break;
            }
            self.missing.retain(|value| !line.contains(value.as_str()));
        }
        self.missing.is_empty()
    }
}
