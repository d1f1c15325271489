use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

/// One-shot reply address for a notification button.
///
/// The token is `<prefix><sequence>`; the sequence comes from a strictly
/// increasing counter, so ids order by issuance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId {
    sequence: u64,
    token: String,
}

impl ChannelId {
    #[must_use]
    pub fn new(prefix: &str, sequence: u64) -> Self {
        Self {
            sequence,
            token: format!("{prefix}{sequence}"),
        }
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }
}

impl Ord for ChannelId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence
            .cmp(&other.sequence)
            .then_with(|| self.token.cmp(&other.token))
    }
}

impl PartialOrd for ChannelId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.token
    }
}

// The view layer only ever sees the token.
impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.token)
    }
}
