//! Market Data Types
//!
//! Trade prints and top-5 order book snapshots as pushed on the public
//! `trades` and `books5` channels, plus the pricing derived from them.
//!
//! # Derived Pricing
//!
//! Every non-empty depth snapshot yields:
//! - A synthetic bid/ask pair blended from the best bid and best ask,
//!   shifted inward by a fixed offset.
//! - A depth-weighted mid price over all five levels.
//!
//! Prices stay as strings on the wire and are parsed on demand.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Weight of the best bid in the synthetic bid (and of the best ask in the ask).
pub const NEAR_WEIGHT: f64 = 0.618;

/// Weight of the opposite side in the synthetic quotes.
pub const FAR_WEIGHT: f64 = 0.382;

/// Per-level weights applied to `ask_i + bid_i` for the depth-weighted mid.
pub const DEPTH_WEIGHTS: [f64; 5] = [0.35, 0.1, 0.03, 0.015, 0.005];

// =============================================================================
// Trade
// =============================================================================

/// A single trade print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Instrument ID, e.g. `DOGE-USDT`.
    #[serde(default)]
    pub inst_id: String,
    /// Exchange trade ID.
    #[serde(default)]
    pub trade_id: String,
    /// Trade price.
    #[serde(default)]
    pub px: String,
    /// Trade size.
    #[serde(default)]
    pub sz: String,
    /// Taker side (`buy` or `sell`).
    #[serde(default)]
    pub side: String,
    /// Trade time, Unix milliseconds.
    #[serde(default)]
    pub ts: String,
}

impl Trade {
    /// Trade price as a float, if it parses.
    #[must_use]
    pub fn price(&self) -> Option<f64> {
        parse_number(&self.px)
    }
}

// =============================================================================
// Depth Snapshot
// =============================================================================

/// One price level as sent by the exchange: `[price, size, deprecated, orders]`.
///
/// Only price and size are guaranteed present.
pub type RawLevel = Vec<String>;

/// Top-5 order book snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Ask levels, best first.
    #[serde(default)]
    pub asks: Vec<RawLevel>,
    /// Bid levels, best first.
    #[serde(default)]
    pub bids: Vec<RawLevel>,
    /// Snapshot time, Unix milliseconds.
    #[serde(default)]
    pub ts: String,
    /// Exchange checksum.
    #[serde(default)]
    pub checksum: i64,
}

impl DepthSnapshot {
    /// Price of the bid at `level` (0 = best).
    #[must_use]
    pub fn bid_price(&self, level: usize) -> Option<f64> {
        level_field(&self.bids, level, 0)
    }

    /// Price of the ask at `level` (0 = best).
    #[must_use]
    pub fn ask_price(&self, level: usize) -> Option<f64> {
        level_field(&self.asks, level, 0)
    }

    /// Size of the bid at `level`.
    #[must_use]
    pub fn bid_size(&self, level: usize) -> Option<f64> {
        level_field(&self.bids, level, 1)
    }

    /// Size of the ask at `level`.
    #[must_use]
    pub fn ask_size(&self, level: usize) -> Option<f64> {
        level_field(&self.asks, level, 1)
    }

    /// Whether both sides carry at least one level.
    #[must_use]
    pub fn has_top_of_book(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }
}

fn level_field(levels: &[RawLevel], level: usize, field: usize) -> Option<f64> {
    levels
        .get(level)
        .and_then(|l| l.get(field))
        .and_then(|v| parse_number(v))
}

/// Parse an exchange decimal string; empty and malformed values yield `None`.
#[must_use]
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Derived Pricing
// =============================================================================

/// Synthetic quotes derived from the top of book.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quotes {
    /// Synthetic bid price.
    pub bid: f64,
    /// Synthetic ask price.
    pub ask: f64,
}

/// Blend the best bid and ask into synthetic quotes.
///
/// `bid = 0.618·bid0 + 0.382·ask0 + offset`, `ask = 0.382·bid0 + 0.618·ask0 − offset`.
/// With `bid0 < ask0` and a small offset the result satisfies `bid < ask`.
#[must_use]
pub fn synthetic_quotes(best_bid: f64, best_ask: f64, offset: f64) -> Quotes {
    Quotes {
        bid: NEAR_WEIGHT.mul_add(best_bid, FAR_WEIGHT * best_ask) + offset,
        ask: FAR_WEIGHT.mul_add(best_bid, NEAR_WEIGHT * best_ask) - offset,
    }
}

/// Synthetic quotes for a snapshot, if level 0 parses on both sides.
#[must_use]
pub fn quotes_for(snapshot: &DepthSnapshot, offset: f64) -> Option<Quotes> {
    Some(synthetic_quotes(
        snapshot.bid_price(0)?,
        snapshot.ask_price(0)?,
        offset,
    ))
}

/// Depth-weighted mid price over five levels.
///
/// Returns `None` unless all five levels parse on both sides.
#[must_use]
pub fn weighted_mid(snapshot: &DepthSnapshot) -> Option<f64> {
    DEPTH_WEIGHTS
        .iter()
        .enumerate()
        .try_fold(0.0_f64, |acc, (level, weight)| {
            let sum = snapshot.ask_price(level)? + snapshot.bid_price(level)?;
            Some(weight.mul_add(sum, acc))
        })
}

// =============================================================================
// Bounded History
// =============================================================================

/// FIFO buffer that keeps only the most recent `capacity` items.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// Create an empty history.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one item, evicting the oldest once over capacity.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Append items in order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.push(item);
        }
    }

    /// Number of retained items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Configured bound.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the history has reached its bound.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Most recent item.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Copy out oldest to newest.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn level(px: &str, sz: &str) -> RawLevel {
        vec![px.to_string(), sz.to_string(), "0".to_string(), "1".to_string()]
    }

    fn five_level_book() -> DepthSnapshot {
        DepthSnapshot {
            asks: (0..5).map(|i| level(&(101 + i).to_string(), "1")).collect(),
            bids: (0..5).map(|i| level(&(100 - i).to_string(), "1")).collect(),
            ts: "1".to_string(),
            checksum: 0,
        }
    }

    #[test]
    fn quotes_blend_top_of_book() {
        let q = synthetic_quotes(100.0, 101.0, 0.0005);
        assert!((q.bid - (0.618 * 100.0 + 0.382 * 101.0 + 0.0005)).abs() < 1e-9);
        assert!((q.ask - (0.382 * 100.0 + 0.618 * 101.0 - 0.0005)).abs() < 1e-9);
        assert!(q.bid < q.ask);
    }

    #[test]
    fn quotes_need_both_sides() {
        let mut book = five_level_book();
        book.asks.clear();
        assert!(quotes_for(&book, 0.0).is_none());
    }

    #[test]
    fn weighted_mid_uses_five_levels() {
        let book = five_level_book();
        let expected = 0.35 * (101.0 + 100.0)
            + 0.1 * (102.0 + 99.0)
            + 0.03 * (103.0 + 98.0)
            + 0.015 * (104.0 + 97.0)
            + 0.005 * (105.0 + 96.0);
        let mid = weighted_mid(&book).unwrap();
        assert!((mid - expected).abs() < 1e-9);
    }

    #[test]
    fn weighted_mid_skips_shallow_books() {
        let mut book = five_level_book();
        book.bids.truncate(3);
        assert!(weighted_mid(&book).is_none());
    }

    #[test]
    fn level_accessors_tolerate_short_rows() {
        let book = DepthSnapshot {
            asks: vec![vec!["101".to_string()]],
            bids: vec![level("100", "2.5")],
            ..DepthSnapshot::default()
        };
        assert_eq!(book.ask_price(0), Some(101.0));
        assert_eq!(book.ask_size(0), None);
        assert_eq!(book.bid_size(0), Some(2.5));
        assert_eq!(book.bid_price(1), None);
    }

    #[test]
    fn parse_number_rejects_garbage() {
        assert_eq!(parse_number("0.0712"), Some(0.0712));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn bounded_history_zero_capacity_retains_nothing() {
        let mut history = BoundedHistory::new(0);
        history.push(1);
        assert!(history.is_empty());
    }

    proptest! {
        #[test]
        fn bounded_history_keeps_most_recent(
            items in proptest::collection::vec(any::<u32>(), 0..200),
            capacity in 1usize..50,
        ) {
            let mut history = BoundedHistory::new(capacity);
            history.extend(items.iter().copied());

            let start = items.len().saturating_sub(capacity);
            prop_assert_eq!(history.to_vec(), items[start..].to_vec());
            prop_assert!(history.len() <= capacity);
        }

        #[test]
        fn quotes_stay_ordered(bid in 0.01f64..10_000.0, spread in 0.0001f64..100.0) {
            let q = synthetic_quotes(bid, bid + spread, 0.0);
            prop_assert!(q.bid < q.ask);
        }
    }
}
