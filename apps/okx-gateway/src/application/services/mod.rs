//! Application Services
//!
//! Services that drive the venue through the [`CommandSink`] port.
//!
//! - `orders`: place/cancel batches with order table bookkeeping
//! - `scheduler`: delayed cancels on a cancellable timer
//! - `keepalive`: periodic traffic to keep the private session open
//!
//! [`CommandSink`]: crate::application::ports::CommandSink

pub mod keepalive;
pub mod orders;
pub mod scheduler;

pub use keepalive::{KeepaliveDriver, KeepaliveError, KeepalivePolicy, OrderPingPong, TextPing};
pub use orders::{OrderPipeline, SubmitError};
pub use scheduler::{CancelOutcome, CancelScheduler, ScheduledCancel};
