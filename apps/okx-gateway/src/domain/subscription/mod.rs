//! Subscription Types
//!
//! Channels the gateway understands and the routing key that binds an
//! inbound push to its handler.
//!
//! # Design
//!
//! A routing key is `(channel, instId)`. Account-scoped channels carry an
//! empty instrument ID, so one key covers the whole account stream.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Channel
// =============================================================================

/// Closed set of recognized push channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Public trade prints.
    Trades,
    /// Public top-5 order book.
    Books5,
    /// Private account balances.
    Account,
    /// Private positions.
    Positions,
    /// Private order updates.
    Orders,
}

impl Channel {
    /// Parse a wire channel name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "trades" => Some(Self::Trades),
            "books5" => Some(Self::Books5),
            "account" => Some(Self::Account),
            "positions" => Some(Self::Positions),
            "orders" => Some(Self::Orders),
            _ => None,
        }
    }

    /// Wire channel name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trades => "trades",
            Self::Books5 => "books5",
            Self::Account => "account",
            Self::Positions => "positions",
            Self::Orders => "orders",
        }
    }

    /// Whether pushes on this channel are routed without an instrument ID.
    #[must_use]
    pub const fn is_account_scoped(self) -> bool {
        matches!(self, Self::Account)
    }

    /// All recognized channels.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Trades,
            Self::Books5,
            Self::Account,
            Self::Positions,
            Self::Orders,
        ]
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Routing Key
// =============================================================================

/// `(channel, instId)` pair identifying a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    /// Channel.
    pub channel: Channel,
    /// Instrument ID; empty for account-scoped channels.
    pub inst_id: String,
}

impl RoutingKey {
    /// Build a key, dropping the instrument ID for account-scoped channels.
    #[must_use]
    pub fn new(channel: Channel, inst_id: impl Into<String>) -> Self {
        let inst_id = if channel.is_account_scoped() {
            String::new()
        } else {
            inst_id.into()
        };
        Self { channel, inst_id }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inst_id.is_empty() {
            write!(f, "{}", self.channel)
        } else {
            write!(f, "{}:{}", self.channel, self.inst_id)
        }
    }
}

// =============================================================================
// Subscription Descriptor
// =============================================================================

/// One entry of a batched subscribe command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionArg {
    /// Channel name.
    pub channel: String,
    /// Instrument type (`SPOT`, `SWAP`, `ANY`, ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub inst_type: String,
    /// Underlying.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uly: String,
    /// Instrument ID.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub inst_id: String,
}

impl SubscriptionArg {
    /// Create a descriptor for a channel.
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            channel: channel.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Set the instrument type.
    #[must_use]
    pub fn with_inst_type(mut self, inst_type: impl Into<String>) -> Self {
        self.inst_type = inst_type.into();
        self
    }

    /// Set the underlying.
    #[must_use]
    pub fn with_uly(mut self, uly: impl Into<String>) -> Self {
        self.uly = uly.into();
        self
    }

    /// Set the instrument ID.
    #[must_use]
    pub fn with_inst_id(mut self, inst_id: impl Into<String>) -> Self {
        self.inst_id = inst_id.into();
        self
    }

    /// Routing key of pushes this descriptor produces; `None` for unknown channels.
    #[must_use]
    pub fn routing_key(&self) -> Option<RoutingKey> {
        Channel::from_name(&self.channel).map(|channel| RoutingKey::new(channel, &self.inst_id))
    }
}
