//! Subscription Registry and Dispatch
//!
//! Maps each routing key to the handler registered for it and records the
//! subscription descriptors sent in the batched subscribe command.
//!
//! The registry is filled before the receive loop starts and is read-only
//! afterwards, so dispatch needs no lock.

use std::collections::HashMap;
use std::sync::Arc;

use super::codec::{CodecError, JsonCodec};
use super::messages::{CommandAck, EventMessage, Frame, PushMessage};
use crate::domain::repository::StateRepository;
use crate::domain::subscription::{Channel, RoutingKey, SubscriptionArg};

/// Callback invoked with every push routed to its key.
pub type Handler = Arc<dyn Fn(PushMessage) + Send + Sync>;

/// Errors routing a decoded push.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// Push on a recognized channel with no registered handler.
    #[error("no handler registered for {0}")]
    NoHandler(RoutingKey),
}

/// Errors handling one inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Frame could not be decoded.
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// Frame decoded but could not be routed.
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

// =============================================================================
// Registry
// =============================================================================

/// Routing key to handler map plus subscribe descriptors.
#[derive(Default)]
pub struct SubscriptionRegistry {
    descriptors: Vec<SubscriptionArg>,
    handlers: HashMap<RoutingKey, Handler>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor and bind `handler` to `(channel, inst_id)`.
    ///
    /// A later registration for the same key replaces both the handler and
    /// the descriptor.
    pub fn register(
        &mut self,
        channel: Channel,
        inst_type: &str,
        uly: &str,
        inst_id: &str,
        handler: Handler,
    ) -> RoutingKey {
        let descriptor = SubscriptionArg::new(channel)
            .with_inst_type(inst_type)
            .with_uly(uly)
            .with_inst_id(inst_id);
        let key = RoutingKey::new(channel, inst_id);

        if self.handlers.insert(key.clone(), handler).is_some() {
            tracing::debug!(key = %key, "Replacing handler");
            self.descriptors
                .retain(|d| d.routing_key().as_ref() != Some(&key));
        }
        self.descriptors.push(descriptor);
        key
    }

    /// Descriptors for the batched subscribe command.
    #[must_use]
    pub fn descriptors(&self) -> &[SubscriptionArg] {
        &self.descriptors
    }

    /// Whether a handler is bound to `key`.
    #[must_use]
    pub fn contains(&self, key: &RoutingKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Hand `message` to the handler bound to its routing key.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::NoHandler`] if no handler is bound.
    pub fn dispatch(&self, message: PushMessage) -> Result<RoutingKey, RoutingError> {
        let key = message.routing_key();
        let handler = self
            .handlers
            .get(&key)
            .ok_or_else(|| RoutingError::NoHandler(key.clone()))?;
        handler(message);
        Ok(key)
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("descriptors", &self.descriptors)
            .field("keys", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Router
// =============================================================================

/// Outcome of routing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Push delivered to a handler.
    Dispatched {
        /// Key it was routed under.
        key: RoutingKey,
        /// Number of records in the push.
        records: usize,
    },
    /// Server event, not routed.
    Event(EventMessage),
    /// Command acknowledgement, not routed.
    Ack(CommandAck),
    /// Reply to a text ping.
    Pong,
}

/// Codec plus registry: turns a text frame into a handler call.
#[derive(Debug, Default)]
pub struct Router {
    codec: JsonCodec,
    registry: SubscriptionRegistry,
}

impl Router {
    /// Create a router over a populated registry.
    #[must_use]
    pub const fn new(registry: SubscriptionRegistry) -> Self {
        Self {
            codec: JsonCodec::new(),
            registry,
        }
    }

    /// Registry backing this router.
    #[must_use]
    pub const fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Mutable registry, used while subscriptions are still being added.
    pub fn registry_mut(&mut self) -> &mut SubscriptionRegistry {
        &mut self.registry
    }

    /// Decode and dispatch one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Decode`] for malformed frames or unknown
    /// channels and [`DispatchError::Routing`] for pushes without a handler.
    pub fn route(&self, text: &str) -> Result<Routed, DispatchError> {
        match self.codec.decode(text)? {
            Frame::Push(message) => {
                let records = message.len();
                let key = self.registry.dispatch(message)?;
                Ok(Routed::Dispatched { key, records })
            }
            Frame::Event(event) => Ok(Routed::Event(event)),
            Frame::Ack(ack) => Ok(Routed::Ack(ack)),
            Frame::Pong => Ok(Routed::Pong),
        }
    }
}

/// Handler that applies every push to `repository`.
#[must_use]
pub fn repository_handler(repository: Arc<StateRepository>) -> Handler {
    Arc::new(move |message| match message {
        PushMessage::Trades(push) => repository.on_trades(push.data),
        PushMessage::Depth(push) => repository.on_depth(push.data),
        PushMessage::Account(push) => repository.on_account(push.data),
        PushMessage::Positions(push) => repository.on_positions(push.data),
        PushMessage::Orders(push) => repository.on_orders(push.data),
    })
}

// =============================================================================
// Tests
// =============================================================================
