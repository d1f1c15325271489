use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NonEmptyString;

#[derive(Debug, Error)]
#[error("release version must not be empty")]
pub struct InvalidRelease;

/// Metadata for a release discovered by the update gateway.
///
/// Field names follow the camelCase JSON most updater engines emit
/// (`{"version": "5.2.0", "releaseName": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    version: NonEmptyString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    release_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    release_date: Option<String>,
}

impl ReleaseInfo {
    pub fn new(version: impl Into<String>) -> Result<Self, InvalidRelease> {
        let version = NonEmptyString::new(version.into().trim()).map_err(|_| InvalidRelease)?;
        Ok(Self {
            version,
            release_name: None,
            release_notes: None,
            release_date: None,
        })
    }

    #[must_use]
    pub fn with_release_name(mut self, name: impl Into<String>) -> Self {
        self.release_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_release_notes(mut self, notes: impl Into<String>) -> Self {
        self.release_notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn with_release_date(mut self, date: impl Into<String>) -> Self {
        self.release_date = Some(date.into());
        self
    }

    #[must_use]
    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    #[must_use]
    pub fn release_name(&self) -> Option<&str> {
        self.release_name.as_deref()
    }

    #[must_use]
    pub fn release_notes(&self) -> Option<&str> {
        self.release_notes.as_deref()
    }

    #[must_use]
    pub fn release_date(&self) -> Option<&str> {
        self.release_date.as_deref()
    }
}
