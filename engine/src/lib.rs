//! Update coordination for Updraft.
//!
//! The engine decides *when* to look for updates and *how* to ask the user
//! about them. Checking, downloading and installing belong to an
//! [`UpdateGateway`]; showing the prompt belongs to a
//! [`NotificationTransport`]. Responses come back through the
//! [`ChannelRegistry`] by backchannel token.

mod command_gateway;
mod consent;
mod gateway;
mod registry;
mod scheduler;
mod shell;
mod transport;

#[cfg(test)]
mod test_support;

pub use command_gateway::{CommandGateway, VERSION_ENV_VAR};
pub use consent::{
    ConsentError, ConsentPrompt, ConsentSession, NO_LABEL, YES_NOW_LABEL, YES_ON_QUIT_LABEL,
};
pub use gateway::{EVENT_CHANNEL_CAPACITY, GatewayError, GatewayEvent, GatewayFut, UpdateGateway};
pub use registry::{
    Abandoned, ChannelRegistry, ConsentChannels, ConsentChoice, Delivery, PendingConsent,
};
pub use scheduler::{
    SchedulerHandle, SchedulerPhase, SchedulerSettings, UpdateScheduler, check_for_updates,
};
pub use shell::Shell;
pub use transport::{ChannelTransport, NotificationTransport, TransportError, TransportFut};

pub use updraft_types::{
    ButtonDescriptor, ChannelId, ConsentOutcome, ExecutionMode, NotificationDescriptor,
    ReleaseInfo, Severity,
};
