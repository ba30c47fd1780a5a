//! Frame Codec
//!
//! Decodes OKX text frames in two passes: a cheap envelope pass that only
//! reads `arg.channel`, `event` and `op`, then a full pass into the typed
//! payload selected by the channel name.
//!
//! Decode errors never leave the receive loop; the caller logs and drops
//! the frame.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::messages::{CommandAck, EventMessage, Frame, Push, PushMessage};
use crate::domain::subscription::Channel;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Push on a channel outside the recognized set.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// Frame is neither a push, an event nor an acknowledgement.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// Fields inspected before full decoding; everything else is skipped.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    arg: Option<EnvelopeArg>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    op: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeArg {
    #[serde(default)]
    channel: String,
}

/// JSON codec for OKX frames.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownChannel`] for pushes on unrecognized
    /// channels, [`CodecError::Json`] for malformed JSON or payloads, and
    /// [`CodecError::InvalidFormat`] for JSON that matches no frame kind.
    pub fn decode(&self, text: &str) -> Result<Frame, CodecError> {
        let trimmed = text.trim();
        if trimmed == "pong" {
            return Ok(Frame::Pong);
        }

        let envelope: Envelope = serde_json::from_str(trimmed)?;

        if envelope.event.is_some() {
            let event: EventMessage = serde_json::from_str(trimmed)?;
            return Ok(Frame::Event(event));
        }

        if envelope.op.is_some() {
            let ack: CommandAck = serde_json::from_str(trimmed)?;
            return Ok(Frame::Ack(ack));
        }

        let Some(arg) = envelope.arg else {
            return Err(CodecError::InvalidFormat(format!(
                "frame has no arg, event or op: {}",
                preview(trimmed)
            )));
        };

        let channel = Channel::from_name(&arg.channel)
            .ok_or_else(|| CodecError::UnknownChannel(arg.channel.clone()))?;

        Ok(Frame::Push(self.decode_push(channel, trimmed)?))
    }

    /// Decode the payload of a push whose channel is already known.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the payload does not match the channel.
    pub fn decode_push(&self, channel: Channel, text: &str) -> Result<PushMessage, CodecError> {
        let message = match channel {
            Channel::Trades => PushMessage::Trades(parse(text)?),
            Channel::Books5 => PushMessage::Depth(parse(text)?),
            Channel::Account => PushMessage::Account(parse(text)?),
            Channel::Positions => PushMessage::Positions(parse(text)?),
            Channel::Orders => PushMessage::Orders(parse(text)?),
        };
        Ok(message)
    }
}

fn parse<T: DeserializeOwned>(text: &str) -> Result<Push<T>, serde_json::Error> {
    serde_json::from_str(text)
}

fn preview(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(80)
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orders::OrderState;
    use crate::domain::subscription::RoutingKey;

    fn codec() -> JsonCodec {
        JsonCodec::new()
    }

    #[test]
    fn decode_trades_push() {
        let json = r#"{
            "arg": {"channel": "trades", "instId": "DOGE-USDT"},
            "data": [{"instId": "DOGE-USDT", "tradeId": "130639474", "px": "0.0712",
                      "sz": "100", "side": "buy", "ts": "1630048897897"}]
        }"#;
        let Frame::Push(PushMessage::Trades(push)) = codec().decode(json).unwrap() else {
            panic!("expected trades push");
        };
        assert_eq!(push.data[0].trade_id, "130639474");
        assert_eq!(push.data[0].price(), Some(0.0712));
    }

    #[test]
    fn decode_books5_push() {
        let json = r#"{
            "arg": {"channel": "books5", "instId": "DOGE-USDT"},
            "data": [{"asks": [["101", "1", "0", "2"]], "bids": [["100", "1", "0", "3"]],
                      "instId": "DOGE-USDT", "ts": "1597026383085", "checksum": -855196043}]
        }"#;
        let frame = codec().decode(json).unwrap();
        let Frame::Push(push) = frame else {
            panic!("expected push");
        };
        assert_eq!(
            push.routing_key(),
            RoutingKey::new(Channel::Books5, "DOGE-USDT")
        );
        let PushMessage::Depth(depth) = push else {
            panic!("expected depth");
        };
        assert_eq!(depth.data[0].checksum, -855_196_043);
        assert_eq!(depth.data[0].bid_price(0), Some(100.0));
    }

    #[test]
    fn decode_orders_push() {
        let json = r#"{
            "arg": {"channel": "orders", "instType": "SPOT", "instId": "DOGE-USDT", "uid": "1"},
            "data": [{"instId": "DOGE-USDT", "clOrdId": "X", "ordId": "9", "state": "live",
                      "px": "0.07", "sz": "10", "side": "buy", "fee": "0"}]
        }"#;
        let Frame::Push(PushMessage::Orders(push)) = codec().decode(json).unwrap() else {
            panic!("expected orders push");
        };
        assert_eq!(push.data[0].cl_ord_id, "X");
        assert_eq!(push.data[0].state, OrderState::Live);
    }

    #[test]
    fn decode_account_push_without_inst_id() {
        let json = r#"{"arg": {"channel": "account", "uid": "44"}, "data": [{"details": []}]}"#;
        let Frame::Push(push) = codec().decode(json).unwrap() else {
            panic!("expected push");
        };
        assert_eq!(push.routing_key(), RoutingKey::new(Channel::Account, ""));
    }

    #[test]
    fn decode_positions_push() {
        let json = r#"{
            "arg": {"channel": "positions", "instType": "ANY", "uid": "1"},
            "data": [{"posSide": "long", "pos": "1", "instId": "DOGE-USDT-SWAP"}]
        }"#;
        let Frame::Push(PushMessage::Positions(push)) = codec().decode(json).unwrap() else {
            panic!("expected positions push");
        };
        assert_eq!(push.data[0].pos_side, "long");
    }

    #[test]
    fn decode_control_frames() {
        assert_eq!(codec().decode("pong").unwrap(), Frame::Pong);

        let event = codec()
            .decode(r#"{"event":"subscribe","arg":{"channel":"trades","instId":"DOGE-USDT"}}"#)
            .unwrap();
        assert!(matches!(event, Frame::Event(e) if e.event == "subscribe"));

        let ack = codec()
            .decode(r#"{"id":"r1","op":"batch-orders","code":"0","msg":"","data":[]}"#)
            .unwrap();
        assert!(matches!(ack, Frame::Ack(a) if a.id == "r1"));
    }

    #[test]
    fn decode_unknown_channel() {
        let json = r#"{"arg": {"channel": "tickers", "instId": "BTC-USDT"}, "data": [{}]}"#;
        let err = codec().decode(json).unwrap_err();
        assert!(matches!(err, CodecError::UnknownChannel(c) if c == "tickers"));
    }

    #[test]
    fn decode_malformed_frames() {
        assert!(matches!(codec().decode("{not json"), Err(CodecError::Json(_))));
        assert!(matches!(
            codec().decode(r#"{"hello":"world"}"#),
            Err(CodecError::InvalidFormat(_))
        ));
        let wrong_shape = r#"{"arg": {"channel": "trades"}, "data": 5}"#;
        assert!(matches!(codec().decode(wrong_shape), Err(CodecError::Json(_))));
    }
}
