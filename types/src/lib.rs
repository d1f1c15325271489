//! Core domain types for Updraft.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application: reply channel
//! identifiers, release metadata, the declarative notification descriptor handed to
//! the view layer, and the outcome of a consent exchange.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod ids;
mod notification;
mod release;

pub use ids::ChannelId;
pub use notification::{ButtonDescriptor, NotificationDescriptor, Severity};
pub use release::{InvalidRelease, ReleaseInfo};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("value must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Consent & Execution Mode
// ============================================================================

/// What the user decided when asked about an available update.
///
/// Exactly one outcome is produced per consent exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsentOutcome {
    /// Download now, then quit and install immediately.
    InstallNow,
    /// Download now, install when the application next exits.
    InstallOnQuit,
    /// Do nothing. Dismissing the notification also lands here.
    Declined,
}

impl ConsentOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InstallNow => "install_now",
            Self::InstallOnQuit => "install_on_quit",
            Self::Declined => "declined",
        }
    }

    /// Whether this outcome requires the update to be downloaded.
    #[must_use]
    pub const fn downloads(self) -> bool {
        matches!(self, Self::InstallNow | Self::InstallOnQuit)
    }
}

impl fmt::Display for ConsentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the host process was launched.
///
/// Background update checks only run in `Production`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Production,
    Development,
    Test,
}

impl ExecutionMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        }
    }

    /// Parse a mode name, accepting a few common aliases.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "release" => Some(Self::Production),
            "development" | "dev" => Some(Self::Development),
            "test" | "testing" => Some(Self::Test),
            _ => None,
        }
    }

    /// Whether the update scheduler must stay off in this mode.
    #[must_use]
    pub const fn suppresses_update_checks(self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
