//! Declarative notification descriptors.
//!
//! A descriptor tells the view layer what to show and which backchannel to
//! invoke for each button. It carries no behavior; the view layer serializes
//! it as camelCase JSON (`closeChannel`).

use serde::Serialize;

use crate::ChannelId;

/// Visual severity of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonDescriptor {
    pub label: String,
    pub backchannel: ChannelId,
    /// Primary, action-taking button.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub action: bool,
    /// Visually de-emphasized.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub secondary: bool,
}

impl ButtonDescriptor {
    #[must_use]
    pub fn action(label: impl Into<String>, backchannel: ChannelId) -> Self {
        Self {
            label: label.into(),
            backchannel,
            action: true,
            secondary: false,
        }
    }

    #[must_use]
    pub fn secondary(label: impl Into<String>, backchannel: ChannelId) -> Self {
        Self {
            label: label.into(),
            backchannel,
            action: false,
            secondary: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDescriptor {
    pub title: String,
    pub body: String,
    pub status: Severity,
    pub buttons: Vec<ButtonDescriptor>,
    /// Invoked when the notification is dismissed without a choice.
    pub close_channel: ChannelId,
}

impl NotificationDescriptor {
    /// Find a button by its exact label.
    #[must_use]
    pub fn button(&self, label: &str) -> Option<&ButtonDescriptor> {
        self.buttons.iter().find(|b| b.label == label)
    }

    /// Every channel this descriptor can report on, close channel included.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.buttons
            .iter()
            .map(|b| &b.backchannel)
            .chain(std::iter::once(&self.close_channel))
    }
}
