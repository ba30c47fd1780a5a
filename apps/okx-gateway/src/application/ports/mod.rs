//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `CommandSink`: serialized writer for command frames on one connection

use async_trait::async_trait;
use serde::Serialize;

/// Errors writing a command frame.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Command could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// Transport write failed.
    #[error("WebSocket write failed: {0}")]
    Transport(String),

    /// Connection already closed.
    #[error("connection closed")]
    Closed,
}

/// Outbound frame writer.
///
/// Implementations serialize writes: concurrent callers never interleave
/// partial frames.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Write one text frame.
    async fn send_text(&self, frame: String) -> Result<(), SendError>;
}

/// Encode a command as a JSON text frame.
///
/// # Errors
///
/// Returns [`SendError::Encode`] if serialization fails.
pub fn encode_frame<T: Serialize + ?Sized>(command: &T) -> Result<String, SendError> {
    Ok(serde_json::to_string(command)?)
}
