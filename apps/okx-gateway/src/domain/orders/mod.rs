//! Order Lifecycle
//!
//! The order table tracks every order the gateway placed that has not yet
//! reached a terminal state, keyed by client order ID.
//!
//! # States
//!
//! ```text
//!            place_batch                 live / partially_filled push
//!   (none) ────────────► Local ─────────────────────────────────────► Live / PartiallyFilled
//!                          │                                             │
//!              cancel_batch│                       canceled / filled push│
//!                          ▼                                             ▼
//!                      (removed)                                     (removed)
//! ```
//!
//! `Local` exists only on this side of the wire: it lets a cancel issued
//! before any acknowledgement resolve without a round trip.

use std::collections::HashMap;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

// =============================================================================
// Order State
// =============================================================================

/// Lifecycle state of a tracked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Optimistic placeholder, not yet acknowledged by the exchange.
    #[serde(skip)]
    Local,
    /// Resting on the book.
    Live,
    /// Partially filled and still resting.
    PartiallyFilled,
    /// Canceled (terminal).
    Canceled,
    /// Fully filled (terminal).
    Filled,
    /// Any state string this gateway does not act on.
    #[default]
    #[serde(other)]
    Unknown,
}

impl OrderState {
    /// Whether the state ends the order's life.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::Filled)
    }

    /// Whether the state keeps the order in the table.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Live | Self::PartiallyFilled)
    }
}

// =============================================================================
// Order Record
// =============================================================================

/// An order as pushed on the private `orders` channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Instrument type.
    #[serde(default)]
    pub inst_type: String,
    /// Instrument ID.
    #[serde(default)]
    pub inst_id: String,
    /// Margin currency.
    #[serde(default)]
    pub ccy: String,
    /// Exchange order ID.
    #[serde(default)]
    pub ord_id: String,
    /// Client order ID.
    #[serde(default)]
    pub cl_ord_id: String,
    /// Order tag.
    #[serde(default)]
    pub tag: String,
    /// Limit price.
    #[serde(default)]
    pub px: String,
    /// Order size.
    #[serde(default)]
    pub sz: String,
    /// Order type (`limit`, `market`, `post_only`, ...).
    #[serde(default)]
    pub ord_type: String,
    /// Side (`buy` or `sell`).
    #[serde(default)]
    pub side: String,
    /// Position side.
    #[serde(default)]
    pub pos_side: String,
    /// Trade mode (`cash`, `cross`, `isolated`).
    #[serde(default)]
    pub td_mode: String,
    /// Last fill price.
    #[serde(default)]
    pub fill_px: String,
    /// Last fill size.
    #[serde(default)]
    pub fill_sz: String,
    /// Accumulated fill size.
    #[serde(default)]
    pub acc_fill_sz: String,
    /// Average fill price.
    #[serde(default)]
    pub avg_px: String,
    /// Exchange-reported state.
    #[serde(default)]
    pub state: OrderState,
    /// Accumulated fee.
    #[serde(default)]
    pub fee: String,
    /// Fee currency.
    #[serde(default)]
    pub fee_ccy: String,
    /// Realized profit and loss.
    #[serde(default)]
    pub pnl: String,
    /// Last update time, Unix milliseconds.
    #[serde(default)]
    pub u_time: String,
    /// Creation time, Unix milliseconds.
    #[serde(default)]
    pub c_time: String,
}

// =============================================================================
// Order Table
// =============================================================================

/// An entry in the order table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOrder {
    /// Client order ID.
    pub cl_ord_id: String,
    /// Current state.
    pub state: OrderState,
    /// Last exchange record; `None` while `Local`.
    pub record: Option<OrderRecord>,
}

impl TrackedOrder {
    fn local(cl_ord_id: &str) -> Self {
        Self {
            cl_ord_id: cl_ord_id.to_string(),
            state: OrderState::Local,
            record: None,
        }
    }

    /// Whether the entry is an unacknowledged placeholder.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.state == OrderState::Local
    }
}

/// Effect of applying one pushed record to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entry inserted or replaced with the pushed record.
    Upserted,
    /// Entry removed (or was already absent).
    Removed,
    /// State not acted on.
    Ignored,
}

/// Client order ID to lifecycle record.
#[derive(Debug, Clone, Default)]
pub struct OrderTable {
    entries: HashMap<String, TrackedOrder>,
}

impl OrderTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an exchange record.
    ///
    /// Open states upsert the full record, terminal states remove the entry,
    /// anything else is ignored.
    pub fn apply(&mut self, record: OrderRecord) -> Transition {
        if record.state.is_open() {
            self.entries.insert(
                record.cl_ord_id.clone(),
                TrackedOrder {
                    cl_ord_id: record.cl_ord_id.clone(),
                    state: record.state,
                    record: Some(record),
                },
            );
            Transition::Upserted
        } else if record.state.is_terminal() {
            self.entries.remove(&record.cl_ord_id);
            Transition::Removed
        } else {
            Transition::Ignored
        }
    }

    /// Insert a `Local` placeholder, replacing any entry under the same ID.
    pub fn insert_local(&mut self, cl_ord_id: &str) {
        self.entries
            .insert(cl_ord_id.to_string(), TrackedOrder::local(cl_ord_id));
    }

    /// Remove the entry only if it is still `Local`.
    ///
    /// Returns `true` when a placeholder was removed.
    pub fn remove_if_local(&mut self, cl_ord_id: &str) -> bool {
        if self.entries.get(cl_ord_id).is_some_and(TrackedOrder::is_local) {
            self.entries.remove(cl_ord_id);
            true
        } else {
            false
        }
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, cl_ord_id: &str) -> Option<&TrackedOrder> {
        self.entries.get(cl_ord_id)
    }

    /// Whether an entry exists.
    #[must_use]
    pub fn contains(&self, cl_ord_id: &str) -> bool {
        self.entries.contains_key(cl_ord_id)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedOrder> {
        self.entries.values()
    }
}

// =============================================================================
// Order Commands
// =============================================================================

/// Operation name of a batched place command.
pub const PLACE_BATCH_OP: &str = "batch-orders";

/// Operation name of a batched cancel command.
pub const CANCEL_BATCH_OP: &str = "batch-cancel-orders";

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Limit order.
    Limit,
    /// Market order.
    Market,
    /// Maker-only limit order.
    PostOnly,
    /// Fill-or-kill.
    Fok,
    /// Immediate-or-cancel.
    Ioc,
}

/// Trade mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    /// Spot, no margin.
    Cash,
    /// Cross margin.
    Cross,
    /// Isolated margin.
    Isolated,
}

/// One order of a place batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    /// Instrument ID.
    pub inst_id: String,
    /// Trade mode.
    pub td_mode: TradeMode,
    /// Margin currency.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ccy: String,
    /// Client order ID.
    pub cl_ord_id: String,
    /// Order tag.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Side.
    pub side: Side,
    /// Position side (`long`, `short`); empty in net mode.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pos_side: String,
    /// Order type.
    pub ord_type: OrderType,
    /// Size.
    pub sz: String,
    /// Limit price; empty for market orders.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub px: String,
    /// Reduce-only flag.
    #[serde(default)]
    pub reduce_only: bool,
    /// Size unit for spot market orders (`base_ccy` or `quote_ccy`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tgt_ccy: String,
}

impl PlaceOrder {
    /// Limit order with the given client order ID.
    #[must_use]
    pub fn limit(
        inst_id: impl Into<String>,
        td_mode: TradeMode,
        cl_ord_id: impl Into<String>,
        side: Side,
        sz: impl Into<String>,
        px: impl Into<String>,
    ) -> Self {
        Self {
            inst_id: inst_id.into(),
            td_mode,
            ccy: String::new(),
            cl_ord_id: cl_ord_id.into(),
            tag: String::new(),
            side,
            pos_side: String::new(),
            ord_type: OrderType::Limit,
            sz: sz.into(),
            px: px.into(),
            reduce_only: false,
            tgt_ccy: String::new(),
        }
    }

    /// Set the position side.
    #[must_use]
    pub fn with_pos_side(mut self, pos_side: impl Into<String>) -> Self {
        self.pos_side = pos_side.into();
        self
    }

    /// Set the order type.
    #[must_use]
    pub const fn with_ord_type(mut self, ord_type: OrderType) -> Self {
        self.ord_type = ord_type;
        self
    }

    /// Set the order tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Mark as reduce-only.
    #[must_use]
    pub const fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    /// Cancel targeting this order by client order ID.
    #[must_use]
    pub fn cancel(&self) -> CancelOrder {
        CancelOrder::by_client_id(self.inst_id.clone(), self.cl_ord_id.clone())
    }
}

/// One target of a cancel batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrder {
    /// Instrument ID.
    pub inst_id: String,
    /// Exchange order ID.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ord_id: String,
    /// Client order ID.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cl_ord_id: String,
}

impl CancelOrder {
    /// Cancel by client order ID.
    #[must_use]
    pub fn by_client_id(inst_id: impl Into<String>, cl_ord_id: impl Into<String>) -> Self {
        Self {
            inst_id: inst_id.into(),
            ord_id: String::new(),
            cl_ord_id: cl_ord_id.into(),
        }
    }
}

/// Batched order command: `{id, op, args}`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderBatch<'a, A> {
    /// Request ID echoed in the acknowledgement.
    pub id: &'a str,
    /// Operation name.
    pub op: &'static str,
    /// Batch entries.
    pub args: &'a [A],
}

// =============================================================================
// Client Order IDs
// =============================================================================

/// Default length of generated client order IDs.
pub const DEFAULT_CL_ORD_ID_LENGTH: usize = 10;

/// Generator for caller-assigned client order IDs.
pub struct ClientOrderId;

impl ClientOrderId {
    /// Random alphanumeric ID of `length` characters.
    #[must_use]
    pub fn generate(length: usize) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
