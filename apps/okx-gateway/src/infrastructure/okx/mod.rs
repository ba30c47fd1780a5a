//! OKX v5 WebSocket Adapters
//!
//! - `messages`: wire models for commands, pushes and control frames
//! - `codec`: envelope-first frame decoding
//! - `auth`: credentials and login signing
//! - `router`: subscription registry and push dispatch
//! - `connection`: one WebSocket session (public or private)

pub mod auth;
pub mod codec;
pub mod connection;
pub mod messages;
pub mod router;

pub use auth::{AuthError, Credentials};
pub use codec::{CodecError, JsonCodec};
pub use connection::{Connection, ConnectionError};
pub use messages::{Frame, PushMessage};
pub use router::{
    DispatchError, Handler, Routed, Router, RoutingError, SubscriptionRegistry, repository_handler,
};
