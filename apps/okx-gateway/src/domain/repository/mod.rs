//! State Repository
//!
//! Single source of truth for market, account, position and order state.
//!
//! # Design
//!
//! All state lives in one [`RepositoryState`] behind one mutex. Every
//! handler mutates it inside a single critical section, so derived fields
//! (quotes, mid-price history, balance and position projections) are never
//! observed half-updated. Compound reads go through [`StateRepository::read`]
//! or [`StateRepository::snapshot`] to get the same guarantee.
//!
//! The repository is an owned value shared by `Arc`; receive loops,
//! the order pipeline and drivers all hold a reference to the same instance.

use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::account::{AccountSnapshot, Balances, PositionProjection, PositionRecord, PositionView};
use super::market::{self, BoundedHistory, DepthSnapshot, Quotes, Trade};
use super::orders::{OrderRecord, OrderTable, TrackedOrder, Transition};

// =============================================================================
// Configuration
// =============================================================================

/// Bounds, offsets and tracked symbols for the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    /// Trade history bound.
    pub trade_capacity: usize,
    /// Depth history bound.
    pub depth_capacity: usize,
    /// Mid-price history bound.
    pub mid_price_capacity: usize,
    /// Offset added to the synthetic bid and subtracted from the ask.
    pub quote_offset: f64,
    /// Base (token) currency whose cash balance is tracked.
    pub base_ccy: String,
    /// Quote currency whose cash balance is tracked.
    pub quote_ccy: String,
    /// Instrument reserved for keepalive traffic; its orders are not tracked.
    pub keepalive_inst_id: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            trade_capacity: 100,
            depth_capacity: 10,
            mid_price_capacity: 20,
            quote_offset: 0.0005,
            base_ccy: "DOGE".to_string(),
            quote_ccy: "USDT".to_string(),
            keepalive_inst_id: "ETH-USDT".to_string(),
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Everything guarded by the repository lock.
#[derive(Debug)]
pub struct RepositoryState {
    trades: BoundedHistory<Trade>,
    depth: BoundedHistory<DepthSnapshot>,
    quotes: Option<Quotes>,
    mid_prices: BoundedHistory<f64>,
    accounts: Vec<AccountSnapshot>,
    balances: Balances,
    positions: Vec<PositionRecord>,
    projection: PositionProjection,
    orders: OrderTable,
}

impl RepositoryState {
    fn new(config: &RepositoryConfig) -> Self {
        Self {
            trades: BoundedHistory::new(config.trade_capacity),
            depth: BoundedHistory::new(config.depth_capacity),
            quotes: None,
            mid_prices: BoundedHistory::new(config.mid_price_capacity),
            accounts: Vec::new(),
            balances: Balances::default(),
            positions: Vec::new(),
            projection: PositionProjection::default(),
            orders: OrderTable::new(),
        }
    }

    /// Recent trades, oldest first.
    #[must_use]
    pub const fn trades(&self) -> &BoundedHistory<Trade> {
        &self.trades
    }

    /// Recent depth snapshots, oldest first.
    #[must_use]
    pub const fn depth(&self) -> &BoundedHistory<DepthSnapshot> {
        &self.depth
    }

    /// Synthetic quotes from the latest usable snapshot.
    #[must_use]
    pub const fn quotes(&self) -> Option<Quotes> {
        self.quotes
    }

    /// Depth-weighted mid prices, oldest first.
    #[must_use]
    pub const fn mid_prices(&self) -> &BoundedHistory<f64> {
        &self.mid_prices
    }

    /// Latest account snapshots.
    #[must_use]
    pub fn accounts(&self) -> &[AccountSnapshot] {
        &self.accounts
    }

    /// Projected cash balances.
    #[must_use]
    pub const fn balances(&self) -> Balances {
        self.balances
    }

    /// Latest full position list.
    #[must_use]
    pub fn positions(&self) -> &[PositionRecord] {
        &self.positions
    }

    /// Long/short projections.
    #[must_use]
    pub const fn projection(&self) -> &PositionProjection {
        &self.projection
    }

    /// Order table.
    #[must_use]
    pub const fn orders(&self) -> &OrderTable {
        &self.orders
    }

    /// Whether trade, depth and mid-price histories have filled up.
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.trades.is_full() && self.depth.is_full() && self.mid_prices.is_full()
    }

    fn push_depth(&mut self, snapshot: DepthSnapshot, offset: f64) {
        if snapshot.has_top_of_book() {
            match market::quotes_for(&snapshot, offset) {
                Some(quotes) => self.quotes = Some(quotes),
                None => tracing::warn!(ts = %snapshot.ts, "Unparsable top of book"),
            }
            if let Some(mid) = market::weighted_mid(&snapshot) {
                self.mid_prices.push(mid);
            }
        }
        self.depth.push(snapshot);
    }
}

/// Consistent point-in-time summary read under one lock.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositorySnapshot {
    /// Synthetic quotes.
    pub quotes: Option<Quotes>,
    /// Most recent depth-weighted mid.
    pub latest_mid: Option<f64>,
    /// Projected balances.
    pub balances: Balances,
    /// Long projection.
    pub long: Option<PositionView>,
    /// Short projection.
    pub short: Option<PositionView>,
    /// Number of tracked orders.
    pub open_orders: usize,
    /// Retained trades.
    pub trade_count: usize,
    /// Retained depth snapshots.
    pub depth_count: usize,
    /// Whether histories are full.
    pub warm: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Lock-guarded market/account/order state.
#[derive(Debug)]
pub struct StateRepository {
    config: RepositoryConfig,
    state: Mutex<RepositoryState>,
}

impl StateRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new(config: RepositoryConfig) -> Self {
        let state = Mutex::new(RepositoryState::new(&config));
        Self { config, state }
    }

    /// Repository configuration.
    #[must_use]
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Whether `inst_id` is the keepalive instrument.
    #[must_use]
    pub fn is_keepalive_instrument(&self, inst_id: &str) -> bool {
        !self.config.keepalive_inst_id.is_empty() && inst_id == self.config.keepalive_inst_id
    }

    /// Run a compound read under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&RepositoryState) -> R) -> R {
        let state = self.state.lock();
        f(&state)
    }

    // -------------------------------------------------------------------------
    // Push handlers
    // -------------------------------------------------------------------------

    /// Append trades and evict beyond the bound.
    pub fn on_trades(&self, trades: Vec<Trade>) {
        self.state.lock().trades.extend(trades);
    }

    /// Append depth snapshots, re-deriving quotes and mid price for each.
    pub fn on_depth(&self, snapshots: Vec<DepthSnapshot>) {
        let offset = self.config.quote_offset;
        let mut state = self.state.lock();
        for snapshot in snapshots {
            state.push_depth(snapshot, offset);
        }
    }

    /// Replace account snapshots and re-project tracked balances.
    pub fn on_account(&self, accounts: Vec<AccountSnapshot>) {
        let balances = Balances::project(&accounts, &self.config.base_ccy, &self.config.quote_ccy);
        let mut state = self.state.lock();
        state.accounts = accounts;
        state.balances = balances;
    }

    /// Replace positions and re-derive the long/short projections.
    pub fn on_positions(&self, positions: Vec<PositionRecord>) {
        let projection = PositionProjection::project(&positions);
        let mut state = self.state.lock();
        state.positions = positions;
        state.projection = projection;
    }

    /// Apply order updates, skipping the keepalive instrument.
    pub fn on_orders(&self, orders: Vec<OrderRecord>) {
        let mut state = self.state.lock();
        for record in orders {
            if self.is_keepalive_instrument(&record.inst_id) {
                continue;
            }
            let cl_ord_id = record.cl_ord_id.clone();
            let state_tag = record.state;
            let transition = state.orders.apply(record);
            if transition == Transition::Ignored {
                tracing::debug!(cl_ord_id = %cl_ord_id, state = ?state_tag, "Order update ignored");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Pipeline bookkeeping
    // -------------------------------------------------------------------------

    /// Insert `Local` placeholders. Returns how many were inserted.
    pub fn track_local<'a>(&self, cl_ord_ids: impl IntoIterator<Item = &'a str>) -> usize {
        let mut state = self.state.lock();
        let mut inserted = 0;
        for id in cl_ord_ids {
            state.orders.insert_local(id);
            inserted += 1;
        }
        inserted
    }

    /// Remove entries that are still `Local`. Returns the removed IDs.
    pub fn resolve_local<'a>(&self, cl_ord_ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut state = self.state.lock();
        cl_ord_ids
            .into_iter()
            .filter(|id| state.orders.remove_if_local(id))
            .map(str::to_string)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Recent trades, oldest first.
    #[must_use]
    pub fn trades(&self) -> Vec<Trade> {
        self.read(|s| s.trades.to_vec())
    }

    /// Recent depth snapshots, oldest first.
    #[must_use]
    pub fn depth(&self) -> Vec<DepthSnapshot> {
        self.read(|s| s.depth.to_vec())
    }

    /// Most recent depth snapshot.
    #[must_use]
    pub fn latest_depth(&self) -> Option<DepthSnapshot> {
        self.read(|s| s.depth.latest().cloned())
    }

    /// Synthetic quotes.
    #[must_use]
    pub fn quotes(&self) -> Option<Quotes> {
        self.read(RepositoryState::quotes)
    }

    /// Depth-weighted mid prices, oldest first.
    #[must_use]
    pub fn mid_prices(&self) -> Vec<f64> {
        self.read(|s| s.mid_prices.to_vec())
    }

    /// Projected balances.
    #[must_use]
    pub fn balances(&self) -> Balances {
        self.read(RepositoryState::balances)
    }

    /// Base currency cash balance.
    #[must_use]
    pub fn base_balance(&self) -> Decimal {
        self.balances().base
    }

    /// Quote currency cash balance.
    #[must_use]
    pub fn quote_balance(&self) -> Decimal {
        self.balances().quote
    }

    /// Latest full position list.
    #[must_use]
    pub fn positions(&self) -> Vec<PositionRecord> {
        self.read(|s| s.positions.clone())
    }

    /// Long and short projections together.
    #[must_use]
    pub fn position_projection(&self) -> PositionProjection {
        self.read(|s| s.projection.clone())
    }

    /// Long projection.
    #[must_use]
    pub fn long_position(&self) -> Option<PositionView> {
        self.read(|s| s.projection.long.clone())
    }

    /// Short projection.
    #[must_use]
    pub fn short_position(&self) -> Option<PositionView> {
        self.read(|s| s.projection.short.clone())
    }

    /// One order table entry.
    #[must_use]
    pub fn order(&self, cl_ord_id: &str) -> Option<TrackedOrder> {
        self.read(|s| s.orders.get(cl_ord_id).cloned())
    }

    /// All order table entries.
    #[must_use]
    pub fn orders(&self) -> Vec<TrackedOrder> {
        self.read(|s| s.orders.iter().cloned().collect())
    }

    /// Number of tracked orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.read(|s| s.orders.len())
    }

    /// Whether histories have filled up.
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.read(RepositoryState::is_warm)
    }

    /// Consistent summary of the whole repository.
    #[must_use]
    pub fn snapshot(&self) -> RepositorySnapshot {
        self.read(|s| RepositorySnapshot {
            quotes: s.quotes,
            latest_mid: s.mid_prices.latest().copied(),
            balances: s.balances,
            long: s.projection.long.clone(),
            short: s.projection.short.clone(),
            open_orders: s.orders.len(),
            trade_count: s.trades.len(),
            depth_count: s.depth.len(),
            warm: s.is_warm(),
        })
    }
}

impl Default for StateRepository {
    fn default() -> Self {
        Self::new(RepositoryConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::account::BalanceDetail;
    use super::super::orders::OrderState;
    use super::*;

    fn trade(id: u32) -> Trade {
        Trade {
            inst_id: "DOGE-USDT".to_string(),
            trade_id: id.to_string(),
            px: "0.07".to_string(),
            sz: "10".to_string(),
            side: "buy".to_string(),
            ts: id.to_string(),
        }
    }

    fn level(px: f64) -> Vec<String> {
        vec![px.to_string(), "1".to_string()]
    }

    fn book(best_bid: f64, best_ask: f64, levels: usize) -> DepthSnapshot {
        DepthSnapshot {
            bids: (0..levels).map(|i| level(best_bid - i as f64)).collect(),
            asks: (0..levels).map(|i| level(best_ask + i as f64)).collect(),
            ts: "0".to_string(),
            checksum: 0,
        }
    }

    fn order(cl_ord_id: &str, inst_id: &str, state: OrderState) -> OrderRecord {
        OrderRecord {
            inst_id: inst_id.to_string(),
            cl_ord_id: cl_ord_id.to_string(),
            state,
            ..OrderRecord::default()
        }
    }

    fn small_config() -> RepositoryConfig {
        RepositoryConfig {
            trade_capacity: 3,
            depth_capacity: 2,
            mid_price_capacity: 2,
            ..RepositoryConfig::default()
        }
    }

    #[test]
    fn trade_history_is_bounded() {
        let repo = StateRepository::new(small_config());
        repo.on_trades((1..=5).map(trade).collect());

        let ids: Vec<_> = repo.trades().into_iter().map(|t| t.trade_id).collect();
        assert_eq!(ids, vec!["3", "4", "5"]);
    }

    #[test]
    fn depth_push_derives_quotes_and_mid() {
        let repo = StateRepository::new(small_config());
        repo.on_depth(vec![book(100.0, 101.0, 5)]);

        let quotes = repo.quotes().unwrap();
        assert!((quotes.bid - (0.618 * 100.0 + 0.382 * 101.0 + 0.0005)).abs() < 1e-9);
        assert!((quotes.ask - (0.382 * 100.0 + 0.618 * 101.0 - 0.0005)).abs() < 1e-9);
        assert_eq!(repo.mid_prices().len(), 1);
    }

    #[test]
    fn shallow_book_updates_quotes_but_not_mid() {
        let repo = StateRepository::new(small_config());
        repo.on_depth(vec![book(100.0, 101.0, 1)]);

        assert!(repo.quotes().is_some());
        assert!(repo.mid_prices().is_empty());
        assert_eq!(repo.depth().len(), 1);
    }

    #[test]
    fn empty_book_is_recorded_without_derivation() {
        let repo = StateRepository::new(small_config());
        repo.on_depth(vec![DepthSnapshot::default()]);

        assert!(repo.quotes().is_none());
        assert_eq!(repo.depth().len(), 1);
    }

    #[test]
    fn mid_history_is_bounded() {
        let repo = StateRepository::new(small_config());
        for i in 0..4 {
            repo.on_depth(vec![book(100.0 + f64::from(i), 101.0 + f64::from(i), 5)]);
        }
        assert_eq!(repo.mid_prices().len(), 2);
        assert_eq!(repo.depth().len(), 2);
        assert!((repo.latest_depth().unwrap().bid_price(0).unwrap() - 103.0).abs() < 1e-9);
    }

    #[test]
    fn account_push_projects_balances() {
        let repo = StateRepository::default();
        repo.on_account(vec![AccountSnapshot {
            details: vec![
                BalanceDetail {
                    ccy: "DOGE".to_string(),
                    cash_bal: "250".to_string(),
                    ..BalanceDetail::default()
                },
                BalanceDetail {
                    ccy: "USDT".to_string(),
                    cash_bal: "17.5".to_string(),
                    ..BalanceDetail::default()
                },
            ],
            ..AccountSnapshot::default()
        }]);

        assert_eq!(repo.base_balance(), Decimal::new(250, 0));
        assert_eq!(repo.quote_balance(), Decimal::new(175, 1));

        repo.on_account(Vec::new());
        assert_eq!(repo.balances(), Balances::default());
    }

    #[test]
    fn positions_push_replaces_projection() {
        let repo = StateRepository::default();
        let long = PositionRecord {
            pos_side: "long".to_string(),
            pos: "5".to_string(),
            ..PositionRecord::default()
        };
        repo.on_positions(vec![long]);
        assert!(repo.long_position().is_some());

        repo.on_positions(Vec::new());
        assert!(repo.long_position().is_none());
        assert!(repo.positions().is_empty());
    }

    #[test]
    fn orders_lifecycle() {
        let repo = StateRepository::default();
        repo.on_orders(vec![order("X", "DOGE-USDT", OrderState::Live)]);
        assert_eq!(repo.order("X").map(|o| o.state), Some(OrderState::Live));

        repo.on_orders(vec![order("X", "DOGE-USDT", OrderState::PartiallyFilled)]);
        assert_eq!(
            repo.order("X").map(|o| o.state),
            Some(OrderState::PartiallyFilled)
        );

        repo.on_orders(vec![order("X", "DOGE-USDT", OrderState::Filled)]);
        assert!(repo.order("X").is_none());
    }

    #[test]
    fn keepalive_orders_are_filtered() {
        let repo = StateRepository::default();
        repo.on_orders(vec![order("PING", "ETH-USDT", OrderState::Live)]);
        assert_eq!(repo.order_count(), 0);
    }

    #[test]
    fn local_placeholders_resolve_only_when_local() {
        let repo = StateRepository::default();
        assert_eq!(repo.track_local(["A", "B"]), 2);
        repo.on_orders(vec![order("B", "DOGE-USDT", OrderState::Live)]);

        let removed = repo.resolve_local(["A", "B", "C"]);
        assert_eq!(removed, vec!["A".to_string()]);
        assert!(repo.order("B").is_some());
    }

    #[test]
    fn warm_after_histories_fill() {
        let repo = StateRepository::new(small_config());
        assert!(!repo.is_warm());

        repo.on_trades((0..3).map(trade).collect());
        repo.on_depth(vec![book(100.0, 101.0, 5), book(100.0, 101.0, 5)]);

        let snapshot = repo.snapshot();
        assert!(snapshot.warm);
        assert_eq!(snapshot.trade_count, 3);
        assert_eq!(snapshot.depth_count, 2);
        assert!(snapshot.latest_mid.is_some());
    }
}
