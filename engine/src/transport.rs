//! Delivery of notification descriptors to the user-facing surface.
//!
//! A transport only delivers. Responses travel the other way through
//! [`ChannelRegistry::invoke`](crate::ChannelRegistry::invoke), keyed by the
//! backchannel tokens inside the descriptor.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::mpsc;
use updraft_types::NotificationDescriptor;

/// Transport send future type alias.
pub type TransportFut<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("notification surface is unavailable")]
    Unavailable,
    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}

pub trait NotificationTransport: Send + Sync {
    fn send(&self, descriptor: NotificationDescriptor) -> TransportFut<'_>;
}

/// Transport that hands descriptors to an in-process view layer over a channel.
///
/// The receiving side renders the descriptor and reports the chosen button
/// through the registry.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<NotificationDescriptor>,
}

impl ChannelTransport {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<NotificationDescriptor>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl NotificationTransport for ChannelTransport {
    fn send(&self, descriptor: NotificationDescriptor) -> TransportFut<'_> {
        Box::pin(async move {
            self.tx
                .send(descriptor)
                .await
                .map_err(|_| TransportError::Unavailable)
        })
    }
}
