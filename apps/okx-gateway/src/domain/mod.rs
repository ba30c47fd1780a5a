//! Domain Layer - Venue state types and business rules.
//!
//! Market data, account and order types plus the state repository that
//! aggregates them. Nothing here touches the network.

/// Account balances and positions.
pub mod account;

/// Trades, depth snapshots and derived pricing.
pub mod market;

/// Order lifecycle and the order table.
pub mod orders;

/// Lock-guarded aggregate of all venue state.
pub mod repository;

/// Channels and routing keys.
pub mod subscription;
