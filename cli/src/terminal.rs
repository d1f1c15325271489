//! Consent prompts on the controlling terminal.
//!
//! The prompt goes to stderr; answers are read from stdin. Typing the
//! button number or its label picks that button. An empty line, `q`, or end
//! of input dismisses the prompt, which reports on the close channel.
//!
//! Stdin is read by one dedicated thread for the life of the transport. Each
//! line answers whichever prompt is showing when it arrives, so an answer
//! typed after a prompt expired never reaches a later prompt. The thread is
//! never joined and does not hold up process exit.

use std::fmt::Write as _;
use std::io::{self, BufRead};
use std::sync::{Arc, Mutex, MutexGuard};

use updraft_engine::{
    ChannelId, ChannelRegistry, Delivery, NotificationDescriptor, NotificationTransport,
    TransportFut,
};

#[derive(Debug, Clone)]
pub struct TerminalTransport {
    router: Arc<PromptRouter>,
}

impl TerminalTransport {
    /// Start the stdin reader thread.
    pub fn new(registry: ChannelRegistry) -> io::Result<Self> {
        let router = Arc::new(PromptRouter::new(registry));
        let reader = Arc::clone(&router);
        std::thread::Builder::new()
            .name("updraft-stdin".to_string())
            .spawn(move || reader.read_lines(io::stdin().lock()))?;
        Ok(Self { router })
    }
}

impl NotificationTransport for TerminalTransport {
    fn send(&self, descriptor: NotificationDescriptor) -> TransportFut<'_> {
        Box::pin(async move {
            eprint!("{}", render(&descriptor));
            self.router.show(descriptor);
            Ok(())
        })
    }
}

/// What became of one line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Delivered,
    /// Not a choice on the showing prompt, which has this many buttons.
    Unrecognized(usize),
    /// The prompt was retired before the answer arrived.
    Expired,
    NoPrompt,
}

#[derive(Debug, Default)]
struct PromptState {
    showing: Option<NotificationDescriptor>,
    input_closed: bool,
}

/// Hands lines of input to the prompt currently showing.
#[derive(Debug)]
pub struct PromptRouter {
    registry: ChannelRegistry,
    state: Mutex<PromptState>,
}

impl PromptRouter {
    #[must_use]
    pub fn new(registry: ChannelRegistry) -> Self {
        Self {
            registry,
            state: Mutex::new(PromptState::default()),
        }
    }

    /// Make `descriptor` the prompt that answers go to. Once input has ended
    /// it is dismissed straight away.
    pub fn show(&self, descriptor: NotificationDescriptor) {
        let mut state = self.state();
        if state.input_closed {
            drop(state);
            self.deliver(&descriptor.close_channel);
            return;
        }
        state.showing = Some(descriptor);
    }

    #[must_use]
    pub fn answer(&self, line: &str) -> Answer {
        let mut state = self.state();
        let Some(descriptor) = state.showing.as_ref() else {
            return Answer::NoPrompt;
        };
        let Some(channel) = resolve_choice(descriptor, line).cloned() else {
            return Answer::Unrecognized(descriptor.buttons.len());
        };
        state.showing = None;
        drop(state);

        if self.deliver(&channel) {
            Answer::Delivered
        } else {
            Answer::Expired
        }
    }

    /// Dismiss the showing prompt and every later one.
    pub fn end_of_input(&self) {
        let showing = {
            let mut state = self.state();
            state.input_closed = true;
            state.showing.take()
        };
        if let Some(descriptor) = showing {
            self.deliver(&descriptor.close_channel);
        }
    }

    /// Answer prompts from `input` until it ends.
    pub fn read_lines(&self, input: impl BufRead) {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read consent choice");
                    break;
                }
            };
            match self.answer(&line) {
                Answer::Delivered => {}
                Answer::Unrecognized(choices) => {
                    eprint!("Unrecognized choice {line:?}. Choose 1-{choices}: ");
                }
                Answer::Expired => eprintln!("That prompt has expired."),
                Answer::NoPrompt => tracing::debug!("Ignoring input with no prompt showing"),
            }
        }
        self.end_of_input();
    }

    fn deliver(&self, channel: &ChannelId) -> bool {
        let delivered = self.registry.invoke(channel.as_str()) != Delivery::Unknown;
        if !delivered {
            tracing::debug!(channel = %channel, "Consent prompt already retired");
        }
        delivered
    }

    fn state(&self) -> MutexGuard<'_, PromptState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

pub fn render(descriptor: &NotificationDescriptor) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n== {} ==", descriptor.title);
    let _ = writeln!(out, "{}", descriptor.body);
    for (i, button) in descriptor.buttons.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {}", i + 1, button.label);
    }
    let _ = write!(out, "Choose 1-{} (Enter to dismiss): ", descriptor.buttons.len());
    out
}

/// Map one line of input to the backchannel it selects. `None` means the
/// input was not understood.
pub fn resolve_choice<'a>(
    descriptor: &'a NotificationDescriptor,
    input: &str,
) -> Option<&'a ChannelId> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("q") {
        return Some(&descriptor.close_channel);
    }
    if let Ok(n) = input.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| descriptor.buttons.get(i))
            .map(|b| &b.backchannel);
    }
    descriptor
        .buttons
        .iter()
        .find(|b| b.label.eq_ignore_ascii_case(input))
        .map(|b| &b.backchannel)
}
