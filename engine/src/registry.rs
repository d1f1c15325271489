//! Backchannel registry: issues reply addresses and routes responses.
//!
//! Every notification button carries a [`ChannelId`]. The view layer reports a
//! click by handing that token back to [`ChannelRegistry::invoke`]; the
//! registry maps it to the pending consent request it belongs to.
//!
//! A pending request owns three routes. The first delivery removes all three
//! before the choice is handed over, so a request resolves at most once and a
//! retired token can never reach a closed request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use updraft_types::{ChannelId, ConsentOutcome};

/// Which button of a consent prompt was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsentChoice {
    YesNow,
    YesLater,
    No,
}

impl ConsentChoice {
    #[must_use]
    pub const fn outcome(self) -> ConsentOutcome {
        match self {
            Self::YesNow => ConsentOutcome::InstallNow,
            Self::YesLater => ConsentOutcome::InstallOnQuit,
            Self::No => ConsentOutcome::Declined,
        }
    }
}

/// The three reply addresses of one consent prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentChannels {
    pub yes_now: ChannelId,
    pub yes_later: ChannelId,
    pub no: ChannelId,
}

impl ConsentChannels {
    fn routes(&self) -> [(&ChannelId, ConsentChoice); 3] {
        [
            (&self.yes_now, ConsentChoice::YesNow),
            (&self.yes_later, ConsentChoice::YesLater),
            (&self.no, ConsentChoice::No),
        ]
    }
}

/// Result of handing a token to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// First response for a live request; the choice was delivered.
    Accepted(ConsentChoice),
    /// Token never issued, already retired, or its request is gone.
    Unknown,
}

struct PendingRequest {
    tokens: [String; 3],
    reply: oneshot::Sender<ConsentChoice>,
}

#[derive(Default)]
struct RouteTable {
    /// token -> (request key, choice)
    routes: HashMap<String, (u64, ConsentChoice)>,
    pending: HashMap<u64, PendingRequest>,
}

impl RouteTable {
    fn remove_request(&mut self, request: u64) -> Option<PendingRequest> {
        let pending = self.pending.remove(&request)?;
        for token in &pending.tokens {
            self.routes.remove(token);
        }
        Some(pending)
    }
}

struct RegistryInner {
    prefix: String,
    next_sequence: AtomicU64,
    next_request: AtomicU64,
    table: Mutex<RouteTable>,
}

/// Process-wide source of backchannel ids and router for their responses.
///
/// Cheap to clone; clones share the same counter and route table. Construct
/// one at startup and hand clones to sessions and transports.
#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("prefix", &self.inner.prefix)
            .field("issued", &self.inner.next_sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ChannelRegistry {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                prefix: prefix.into(),
                next_sequence: AtomicU64::new(0),
                next_request: AtomicU64::new(0),
                table: Mutex::new(RouteTable::default()),
            }),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Issue a fresh id. Never repeats for the lifetime of the registry.
    #[must_use]
    pub fn next_id(&self) -> ChannelId {
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::Relaxed);
        ChannelId::new(&self.inner.prefix, sequence)
    }

    /// Issue the three ids of a consent prompt, in button order.
    #[must_use]
    pub fn allocate_consent_channels(&self) -> ConsentChannels {
        ConsentChannels {
            yes_now: self.next_id(),
            yes_later: self.next_id(),
            no: self.next_id(),
        }
    }

    /// Install routes for `channels`. Responses become deliverable immediately.
    ///
    /// The routes live until the first delivery or until the returned handle
    /// is dropped, whichever comes first.
    #[must_use]
    pub fn register(&self, channels: ConsentChannels) -> PendingConsent {
        let request = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        {
            let mut table = self.table();
            for (channel, choice) in channels.routes() {
                table
                    .routes
                    .insert(channel.as_str().to_string(), (request, choice));
            }
            let tokens = channels.routes().map(|(channel, _)| channel.as_str().to_string());
            table
                .pending
                .insert(request, PendingRequest { tokens, reply });
        }
        tracing::debug!(
            request,
            yes_now = %channels.yes_now,
            yes_later = %channels.yes_later,
            no = %channels.no,
            "Registered consent backchannels"
        );
        PendingConsent {
            registry: self.clone(),
            request,
            channels,
            receiver,
        }
    }

    /// Deliver a response for `token`.
    ///
    /// Only the first response for a request has any effect; its sibling routes
    /// are removed before the choice is handed over.
    pub fn invoke(&self, token: &str) -> Delivery {
        let (pending, choice) = {
            let mut table = self.table();
            let Some(&(request, choice)) = table.routes.get(token) else {
                tracing::debug!(token, "Ignoring response for unknown backchannel");
                return Delivery::Unknown;
            };
            (table.remove_request(request), choice)
        };

        let Some(pending) = pending else {
            return Delivery::Unknown;
        };
        if pending.reply.send(choice).is_err() {
            tracing::debug!(token, "Consent request was dropped before the response arrived");
            return Delivery::Unknown;
        }
        Delivery::Accepted(choice)
    }

    /// Number of outstanding routes.
    #[must_use]
    pub fn live_routes(&self) -> usize {
        self.table().routes.len()
    }

    fn deregister(&self, request: u64) {
        if self.table().remove_request(request).is_some() {
            tracing::debug!(request, "Deregistered unanswered consent backchannels");
        }
    }

    fn table(&self) -> MutexGuard<'_, RouteTable> {
        self.inner
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered consent request waiting for its one response.
///
/// Dropping it deregisters any routes that are still live.
#[derive(Debug)]
pub struct PendingConsent {
    registry: ChannelRegistry,
    request: u64,
    channels: ConsentChannels,
    receiver: oneshot::Receiver<ConsentChoice>,
}

/// The request was deregistered without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abandoned;

impl PendingConsent {
    #[must_use]
    pub fn channels(&self) -> &ConsentChannels {
        &self.channels
    }

    /// Wait for the response. Cancel-safe: dropping the future leaves the
    /// request registered until the handle itself is dropped.
    pub async fn wait(&mut self) -> Result<ConsentChoice, Abandoned> {
        (&mut self.receiver).await.map_err(|_| Abandoned)
    }
}

impl Drop for PendingConsent {
    fn drop(&mut self) {
        self.registry.deregister(self.request);
    }
}
