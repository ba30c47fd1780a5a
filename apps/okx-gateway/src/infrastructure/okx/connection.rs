//! OKX WebSocket Connection
//!
//! One transport session to one endpoint (public or private).
//!
//! # Lifecycle
//!
//! 1. [`Connection::open`] performs the WebSocket handshake
//! 2. [`Connection::authenticate`] sends the signed login (private only)
//! 3. [`Connection::subscribe`] registers descriptors and handlers
//! 4. [`Connection::run`] sends one batched subscribe command
//! 5. [`Connection::receive_loop`] reads, decodes and dispatches until closed
//! 6. [`Connection::close`] releases the transport
//!
//! Subscribing needs `&mut self`, so the registry is frozen once the
//! connection is shared behind an `Arc`.
//!
//! # Concurrency
//!
//! The read half belongs to the receive loop. The write half sits behind an
//! async mutex so frames from the pipeline, keepalive and pong replies never
//! interleave. Handlers run inline in the receive loop, one frame at a time.
//!
//! # Reconnection
//!
//! None. A read error is logged and the loop reads again; the loop ends when
//! the server closes the stream. Recovering is left to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::auth::{AuthError, Credentials, login_timestamp};
use super::codec::CodecError;
use super::messages::{CommandAck, EventMessage, SubscribeRequest};
use super::router::{DispatchError, Handler, Routed, Router};
use crate::application::ports::{CommandSink, SendError, encode_frame};
use crate::domain::subscription::{Channel, RoutingKey};
use crate::infrastructure::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur on a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// WebSocket handshake failed.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// Endpoint URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: tungstenite::Error,
    },

    /// Login could not be sent.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Subscribe command could not be sent.
    #[error("subscribe failed: {0}")]
    Subscribe(#[source] SendError),

    /// The receive loop was already started.
    #[error("receive loop already running")]
    AlreadyReceiving,

    /// Connection closed.
    #[error("connection closed")]
    Closed,
}

// =============================================================================
// Connection
// =============================================================================

/// A WebSocket session with its subscription registry.
pub struct Connection {
    label: String,
    url: String,
    writer: tokio::sync::Mutex<Option<WsWrite>>,
    reader: parking_lot::Mutex<Option<WsRead>>,
    router: Router,
    shutdown: CancellationToken,
}

impl Connection {
    /// Connect to `url`. `label` tags logs and metrics (`public`, `private`).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Connect`] if the handshake does not complete.
    pub async fn open(label: impl Into<String>, url: &str) -> Result<Self, ConnectionError> {
        let label = label.into();
        tracing::info!(connection = %label, url = %url, "Connecting");

        let (stream, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|source| ConnectionError::Connect {
                    url: url.to_string(),
                    source,
                })?;

        let (write, read) = stream.split();
        metrics::connection_opened(&label);
        tracing::info!(connection = %label, "Connected");

        Ok(Self {
            label,
            url: url.to_string(),
            writer: tokio::sync::Mutex::new(Some(write)),
            reader: parking_lot::Mutex::new(Some(read)),
            router: Router::default(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Tie the receive loop to an external shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Connection label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the signed login command.
    ///
    /// The server's verdict arrives later as a `login` event.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if signing or writing fails.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let request = credentials.login_request(&login_timestamp())?;
        self.send(&request).await?;
        tracing::info!(connection = %self.label, "Login sent");
        Ok(())
    }

    /// Register a subscription and its handler.
    pub fn subscribe(
        &mut self,
        channel: Channel,
        inst_type: &str,
        uly: &str,
        inst_id: &str,
        handler: Handler,
    ) -> RoutingKey {
        let key = self
            .router
            .registry_mut()
            .register(channel, inst_type, uly, inst_id, handler);
        tracing::debug!(connection = %self.label, key = %key, "Subscription registered");
        key
    }

    /// Send one batched subscribe command for every registered descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Subscribe`] if the write fails.
    pub async fn run(&self) -> Result<(), ConnectionError> {
        let descriptors = self.router.registry().descriptors();
        if descriptors.is_empty() {
            tracing::warn!(connection = %self.label, "No subscriptions registered");
            return Ok(());
        }

        let request = SubscribeRequest::subscribe(descriptors.to_vec());
        self.send(&request)
            .await
            .map_err(ConnectionError::Subscribe)?;

        metrics::set_subscriptions(&self.label, descriptors.len());
        tracing::info!(
            connection = %self.label,
            count = descriptors.len(),
            "Subscribe sent"
        );
        Ok(())
    }

    /// Serialize and write one command.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if encoding or the write fails.
    pub async fn send<T: Serialize + Sync + ?Sized>(&self, command: &T) -> Result<(), SendError> {
        let frame = encode_frame(command)?;
        self.write(Message::Text(frame.into())).await
    }

    async fn write(&self, message: Message) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(SendError::Closed);
        };
        sink.send(message).await.map_err(|e| {
            metrics::record_write_error(&self.label);
            SendError::Transport(e.to_string())
        })
    }

    /// Spawn [`Self::receive_loop`] on the runtime.
    #[must_use]
    pub fn spawn_receive_loop(self: &Arc<Self>) -> JoinHandle<Result<(), ConnectionError>> {
        let connection = Arc::clone(self);
        tokio::spawn(async move { connection.receive_loop().await })
    }

    /// Read, decode and dispatch frames until the stream ends or shutdown.
    ///
    /// Malformed and unroutable frames are logged and dropped. Read errors
    /// are logged and the loop keeps reading.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] when the server closes the stream
    /// and [`ConnectionError::AlreadyReceiving`] if called twice.
    pub async fn receive_loop(&self) -> Result<(), ConnectionError> {
        let mut read = self
            .reader
            .lock()
            .take()
            .ok_or(ConnectionError::AlreadyReceiving)?;

        tracing::info!(connection = %self.label, "Receive loop started");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::info!(connection = %self.label, "Receive loop cancelled");
                    return Ok(());
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(text.as_str());
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = self.write(Message::Pong(data)).await {
                                tracing::warn!(connection = %self.label, error = %e, "Failed to answer ping");
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            tracing::trace!(connection = %self.label, "Pong frame received");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(connection = %self.label, frame = ?frame, "Server sent close frame");
                            metrics::connection_closed(&self.label);
                            return Err(ConnectionError::Closed);
                        }
                        Some(Ok(_)) => {
                            // Binary and raw frames are not part of the protocol
                        }
                        Some(Err(
                            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                        )) => {
                            tracing::info!(connection = %self.label, "Connection closed");
                            metrics::connection_closed(&self.label);
                            return Err(ConnectionError::Closed);
                        }
                        Some(Err(e)) => {
                            metrics::record_read_error(&self.label);
                            tracing::warn!(connection = %self.label, error = %e, "Read error");
                        }
                        None => {
                            tracing::info!(connection = %self.label, "WebSocket stream ended");
                            metrics::connection_closed(&self.label);
                            return Err(ConnectionError::Closed);
                        }
                    }
                }
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match self.router.route(text) {
            Ok(Routed::Dispatched { key, records }) => {
                metrics::record_push(key.channel);
                tracing::trace!(connection = %self.label, key = %key, records, "Push dispatched");
            }
            Ok(Routed::Event(event)) => self.log_event(&event),
            Ok(Routed::Ack(ack)) => self.log_ack(&ack),
            Ok(Routed::Pong) => {
                tracing::trace!(connection = %self.label, "Pong received");
            }
            Err(DispatchError::Decode(CodecError::UnknownChannel(channel))) => {
                metrics::record_unrouted("unknown_channel");
                tracing::debug!(connection = %self.label, channel = %channel, "Dropping push on unknown channel");
            }
            Err(DispatchError::Decode(e)) => {
                metrics::record_decode_error(&self.label);
                tracing::warn!(connection = %self.label, error = %e, "Dropping malformed frame");
            }
            Err(DispatchError::Routing(e)) => {
                metrics::record_unrouted("no_handler");
                tracing::warn!(connection = %self.label, error = %e, "Dropping unroutable push");
            }
        }
    }

    fn log_event(&self, event: &EventMessage) {
        let channel = event.arg.as_ref().map(|a| a.channel.as_str()).unwrap_or_default();
        if event.is_error() {
            tracing::error!(
                connection = %self.label,
                event = %event.event,
                code = %event.code,
                msg = %event.msg,
                "Server reported error"
            );
        } else {
            tracing::info!(
                connection = %self.label,
                event = %event.event,
                channel,
                "Server event"
            );
        }
    }

    fn log_ack(&self, ack: &CommandAck) {
        for entry in ack.data.iter().filter(|e| e.is_rejected()) {
            tracing::warn!(
                connection = %self.label,
                request_id = %ack.id,
                op = %ack.op,
                cl_ord_id = %entry.cl_ord_id,
                code = %entry.s_code,
                msg = %entry.s_msg,
                "Order command rejected"
            );
        }
        tracing::debug!(
            connection = %self.label,
            request_id = %ack.id,
            op = %ack.op,
            code = %ack.code,
            "Command acknowledged"
        );
    }

    /// Stop the receive loop and close the transport. Safe to call twice.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let sink = self.writer.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!(connection = %self.label, error = %e, "Error closing WebSocket");
            }
            metrics::connection_closed(&self.label);
            tracing::info!(connection = %self.label, "Connection closed");
        }
    }
}

#[async_trait]
impl CommandSink for Connection {
    async fn send_text(&self, frame: String) -> Result<(), SendError> {
        self.write(Message::Text(frame.into())).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("label", &self.label)
            .field("url", &self.url)
            .field("registry", self.router.registry())
            .finish_non_exhaustive()
    }
}
