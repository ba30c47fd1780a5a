//! Account and Position Types
//!
//! Payloads of the private `account` and `positions` channels and the
//! projections the repository derives from them.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Account
// =============================================================================

/// Per-currency balance detail inside an account snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDetail {
    /// Currency, e.g. `USDT`.
    #[serde(default)]
    pub ccy: String,
    /// Total equity of the currency.
    #[serde(default)]
    pub eq: String,
    /// Cash balance.
    #[serde(default)]
    pub cash_bal: String,
    /// Available balance.
    #[serde(default)]
    pub avail_bal: String,
    /// Frozen balance.
    #[serde(default)]
    pub frozen_bal: String,
    /// Amount frozen by open orders.
    #[serde(default)]
    pub ord_frozen: String,
    /// Equity in USD.
    #[serde(default)]
    pub eq_usd: String,
    /// Unrealized profit and loss.
    #[serde(default)]
    pub upl: String,
    /// Last update time, Unix milliseconds.
    #[serde(default)]
    pub u_time: String,
}

impl BalanceDetail {
    /// Cash balance as a decimal.
    ///
    /// Accepts plain and scientific notation. Empty values read as zero;
    /// anything else that does not parse reads as zero with a warning.
    #[must_use]
    pub fn cash_balance(&self) -> Decimal {
        let raw = self.cash_bal.trim();
        if raw.is_empty() {
            return Decimal::ZERO;
        }
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .unwrap_or_else(|e| {
                tracing::warn!(ccy = %self.ccy, cash_bal = %raw, error = %e, "Unparsable cash balance");
                Decimal::ZERO
            })
    }
}

/// Account-level snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    /// Last update time, Unix milliseconds.
    #[serde(default)]
    pub u_time: String,
    /// Total equity in USD.
    #[serde(default)]
    pub total_eq: String,
    /// Isolated margin equity in USD.
    #[serde(default)]
    pub iso_eq: String,
    /// Adjusted equity in USD.
    #[serde(default)]
    pub adj_eq: String,
    /// Margin ratio.
    #[serde(default)]
    pub mgn_ratio: String,
    /// Position notional in USD.
    #[serde(default)]
    pub notional_usd: String,
    /// Per-currency details.
    #[serde(default)]
    pub details: Vec<BalanceDetail>,
}

/// Cash balances of the two tracked currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balances {
    /// Base currency cash balance (the traded token).
    pub base: Decimal,
    /// Quote currency cash balance.
    pub quote: Decimal,
}

impl Balances {
    /// Project the tracked currencies out of the first account snapshot.
    ///
    /// Currencies absent from the snapshot read as zero.
    #[must_use]
    pub fn project(accounts: &[AccountSnapshot], base_ccy: &str, quote_ccy: &str) -> Self {
        let mut balances = Self::default();
        let Some(account) = accounts.first() else {
            return balances;
        };
        for detail in &account.details {
            if detail.ccy == base_ccy {
                balances.base = detail.cash_balance();
            } else if detail.ccy == quote_ccy {
                balances.quote = detail.cash_balance();
            }
        }
        balances
    }
}

// =============================================================================
// Positions
// =============================================================================

/// Direction tag of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSide {
    /// Long leg.
    Long,
    /// Short leg.
    Short,
}

impl PositionSide {
    /// Parse the `posSide` tag; `net` and unknown tags yield `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "long" => Some(Self::Long),
            "short" => Some(Self::Short),
            _ => None,
        }
    }

    /// Wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// A position as pushed on the `positions` channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    /// Instrument type.
    #[serde(default)]
    pub inst_type: String,
    /// Instrument ID.
    #[serde(default)]
    pub inst_id: String,
    /// Margin mode (`cross` or `isolated`).
    #[serde(default)]
    pub mgn_mode: String,
    /// Position ID.
    #[serde(default)]
    pub pos_id: String,
    /// Direction tag (`long`, `short`, `net`).
    #[serde(default)]
    pub pos_side: String,
    /// Position quantity.
    #[serde(default)]
    pub pos: String,
    /// Quantity that can be closed.
    #[serde(default)]
    pub avail_pos: String,
    /// Average open price.
    #[serde(default)]
    pub avg_px: String,
    /// Unrealized profit and loss.
    #[serde(default)]
    pub upl: String,
    /// Unrealized profit and loss ratio.
    #[serde(default)]
    pub upl_ratio: String,
    /// Leverage.
    #[serde(default)]
    pub lever: String,
    /// Estimated liquidation price.
    #[serde(default)]
    pub liq_px: String,
    /// Mark price.
    #[serde(default)]
    pub mark_px: String,
    /// Margin currency.
    #[serde(default)]
    pub ccy: String,
    /// Last update time, Unix milliseconds.
    #[serde(default)]
    pub u_time: String,
}

/// Single-sided projection of a position, as read by strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionView {
    /// Side this view was picked for.
    pub side: PositionSide,
    /// Position quantity.
    pub pos: String,
    /// Quantity that can be closed.
    pub avail_pos: String,
    /// Average open price.
    pub avg_px: String,
    /// Unrealized profit and loss.
    pub upl: String,
    /// Unrealized profit and loss ratio.
    pub upl_ratio: String,
    /// Leverage.
    pub lever: String,
    /// Estimated liquidation price.
    pub liq_px: String,
    /// Mark price.
    pub mark_px: String,
}

impl PositionView {
    fn from_record(side: PositionSide, record: &PositionRecord) -> Self {
        Self {
            side,
            pos: record.pos.clone(),
            avail_pos: record.avail_pos.clone(),
            avg_px: record.avg_px.clone(),
            upl: record.upl.clone(),
            upl_ratio: record.upl_ratio.clone(),
            lever: record.lever.clone(),
            liq_px: record.liq_px.clone(),
            mark_px: record.mark_px.clone(),
        }
    }
}

/// Long and short projections of one positions push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionProjection {
    /// Last `long` entry scanned.
    pub long: Option<PositionView>,
    /// Last `short` entry scanned.
    pub short: Option<PositionView>,
}

impl PositionProjection {
    /// Scan a full position list; later entries for a side replace earlier ones.
    #[must_use]
    pub fn project(positions: &[PositionRecord]) -> Self {
        let mut projection = Self::default();
        for record in positions {
            match PositionSide::from_tag(&record.pos_side) {
                Some(side @ PositionSide::Long) => {
                    projection.long = Some(PositionView::from_record(side, record));
                }
                Some(side @ PositionSide::Short) => {
                    projection.short = Some(PositionView::from_record(side, record));
                }
                None => {}
            }
        }
        projection
    }
}

// =============================================================================
// Tests
// =============================================================================
