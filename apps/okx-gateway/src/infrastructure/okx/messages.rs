//! OKX WebSocket Message Types
//!
//! Serde models for the OKX v5 WebSocket protocol.
//!
//! # Outbound
//!
//! - Login: `{"op":"login","args":[{apiKey, passphrase, timestamp, sign}]}`
//! - Subscribe: `{"op":"subscribe","args":[{channel, instType, uly, instId}]}`
//! - Batch place/cancel: see [`crate::domain::orders::OrderBatch`]
//!
//! # Inbound
//!
//! - Push: `{"arg":{channel, instId?, uid?, instType?, uly?}, "action"?, "data":[...]}`
//! - Event: `{"event":"login"|"subscribe"|"error", "code"?, "msg"?, "arg"?}`
//! - Command acknowledgement: `{"id", "op", "code", "msg", "data":[{clOrdId, ordId, sCode, sMsg}]}`
//! - The literal text `pong` in reply to `ping`
//!
//! # References
//!
//! - [OKX WebSocket API](https://www.okx.com/docs-v5/en/#overview-websocket)

use serde::{Deserialize, Serialize};

use crate::domain::account::{AccountSnapshot, PositionRecord};
use crate::domain::market::{DepthSnapshot, Trade};
use crate::domain::orders::OrderRecord;
use crate::domain::subscription::{Channel, RoutingKey, SubscriptionArg};

// =============================================================================
// Outbound Requests
// =============================================================================

/// Login arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginArg {
    /// API key.
    pub api_key: String,
    /// API passphrase.
    pub passphrase: String,
    /// Unix seconds used in the signature.
    pub timestamp: String,
    /// Base64 HMAC-SHA256 signature.
    pub sign: String,
}

/// Login command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Always `login`.
    pub op: String,
    /// Single login argument.
    pub args: Vec<LoginArg>,
}

impl LoginRequest {
    /// Wrap a login argument.
    #[must_use]
    pub fn new(arg: LoginArg) -> Self {
        Self {
            op: "login".to_string(),
            args: vec![arg],
        }
    }
}

/// Subscribe command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Always `subscribe`.
    pub op: String,
    /// Subscription descriptors.
    pub args: Vec<SubscriptionArg>,
}

impl SubscribeRequest {
    /// Batched subscribe for all descriptors.
    #[must_use]
    pub fn subscribe(args: Vec<SubscriptionArg>) -> Self {
        Self {
            op: "subscribe".to_string(),
            args,
        }
    }
}

// =============================================================================
// Inbound Push
// =============================================================================

/// Channel parameters echoed on every push and event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushArg {
    /// Channel name.
    #[serde(default)]
    pub channel: String,
    /// Instrument ID.
    #[serde(default)]
    pub inst_id: String,
    /// User ID on private channels.
    #[serde(default)]
    pub uid: String,
    /// Instrument type.
    #[serde(default)]
    pub inst_type: String,
    /// Underlying.
    #[serde(default)]
    pub uly: String,
    /// Currency filter on the account channel.
    #[serde(default)]
    pub ccy: String,
}

/// A decoded push for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Push<T> {
    /// Channel parameters.
    pub arg: PushArg,
    /// `snapshot` or `update` where the channel distinguishes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Payload records.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Push message over the closed channel set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// Trade prints.
    Trades(Push<Trade>),
    /// Top-5 depth snapshots.
    Depth(Push<DepthSnapshot>),
    /// Account snapshots.
    Account(Push<AccountSnapshot>),
    /// Full position list.
    Positions(Push<PositionRecord>),
    /// Order updates.
    Orders(Push<OrderRecord>),
}

impl PushMessage {
    /// Channel of the variant.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::Trades(_) => Channel::Trades,
            Self::Depth(_) => Channel::Books5,
            Self::Account(_) => Channel::Account,
            Self::Positions(_) => Channel::Positions,
            Self::Orders(_) => Channel::Orders,
        }
    }

    /// Channel parameters of the push.
    #[must_use]
    pub const fn arg(&self) -> &PushArg {
        match self {
            Self::Trades(p) => &p.arg,
            Self::Depth(p) => &p.arg,
            Self::Account(p) => &p.arg,
            Self::Positions(p) => &p.arg,
            Self::Orders(p) => &p.arg,
        }
    }

    /// Routing key; account pushes route with an empty instrument ID.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(self.channel(), self.arg().inst_id.clone())
    }

    /// Number of payload records.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Trades(p) => p.data.len(),
            Self::Depth(p) => p.data.len(),
            Self::Account(p) => p.data.len(),
            Self::Positions(p) => p.data.len(),
            Self::Orders(p) => p.data.len(),
        }
    }

    /// Whether the push carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Inbound Control Frames
// =============================================================================

/// Server event (`login`, `subscribe`, `unsubscribe`, `error`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Event name.
    pub event: String,
    /// Result code; `"0"` on success.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub msg: String,
    /// Subscription the event refers to.
    #[serde(default)]
    pub arg: Option<PushArg>,
    /// Connection ID.
    #[serde(default, rename = "connId")]
    pub conn_id: String,
}

impl EventMessage {
    /// Whether the event reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.event == "error" || (!self.code.is_empty() && self.code != "0")
    }
}

/// Per-order outcome inside a command acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckEntry {
    /// Client order ID.
    #[serde(default)]
    pub cl_ord_id: String,
    /// Exchange order ID.
    #[serde(default)]
    pub ord_id: String,
    /// Per-order result code; `"0"` on success.
    #[serde(default)]
    pub s_code: String,
    /// Per-order message.
    #[serde(default)]
    pub s_msg: String,
}

impl AckEntry {
    /// Whether the exchange rejected this entry.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        !self.s_code.is_empty() && self.s_code != "0"
    }
}

/// Acknowledgement of a batched order command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    /// Request ID of the command.
    #[serde(default)]
    pub id: String,
    /// Operation name.
    #[serde(default)]
    pub op: String,
    /// Batch result code; `"0"` when every entry succeeded.
    #[serde(default)]
    pub code: String,
    /// Batch message.
    #[serde(default)]
    pub msg: String,
    /// Per-order outcomes.
    #[serde(default)]
    pub data: Vec<AckEntry>,
}

/// Any decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Channel push.
    Push(PushMessage),
    /// Server event.
    Event(EventMessage),
    /// Command acknowledgement.
    Ack(CommandAck),
    /// Reply to a text `ping`.
    Pong,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_login_request() {
        let request = LoginRequest::new(LoginArg {
            api_key: "key".to_string(),
            passphrase: "pass".to_string(),
            timestamp: "1538054050".to_string(),
            sign: "c2lnbg==".to_string(),
        });
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"op":"login","args":[{"apiKey":"key","passphrase":"pass","timestamp":"1538054050","sign":"c2lnbg=="}]}"#
        );
    }

    #[test]
    fn serialize_subscribe_request() {
        let request = SubscribeRequest::subscribe(vec![
            SubscriptionArg::new(Channel::Trades).with_inst_id("DOGE-USDT"),
            SubscriptionArg::new(Channel::Account),
        ]);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"op":"subscribe","args":[{"channel":"trades","instId":"DOGE-USDT"},{"channel":"account"}]}"#
        );
    }

    #[test]
    fn account_push_routes_without_instrument() {
        let push = PushMessage::Account(Push {
            arg: PushArg {
                channel: "account".to_string(),
                uid: "77".to_string(),
                ..PushArg::default()
            },
            action: None,
            data: vec![],
        });
        assert_eq!(push.routing_key(), RoutingKey::new(Channel::Account, ""));
        assert!(push.is_empty());
    }

    #[test]
    fn deserialize_event() {
        let json = r#"{"event":"error","code":"60009","msg":"Login failed.","connId":"a4d3ae55"}"#;
        let event: EventMessage = serde_json::from_str(json).unwrap();
        assert!(event.is_error());
        assert_eq!(event.conn_id, "a4d3ae55");

        let ok: EventMessage = serde_json::from_str(r#"{"event":"login","code":"0","msg":""}"#).unwrap();
        assert!(!ok.is_error());
    }

    #[test]
    fn deserialize_ack_with_rejection() {
        let json = r#"{
            "id": "1512",
            "op": "batch-orders",
            "code": "2",
            "msg": "",
            "data": [
                {"clOrdId": "a", "ordId": "1", "sCode": "0", "sMsg": ""},
                {"clOrdId": "b", "ordId": "", "sCode": "51008", "sMsg": "Insufficient balance"}
            ]
        }"#;
        let ack: CommandAck = serde_json::from_str(json).unwrap();
        let rejected: Vec<_> = ack.data.iter().filter(|e| e.is_rejected()).collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].cl_ord_id, "b");
    }
}
