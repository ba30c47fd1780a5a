//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the order pipeline, the delayed-cancel scheduler and
//! keepalive policies, written against the outbound command port rather
//! than a concrete connection.

/// Port interfaces for external systems.
pub mod ports;

/// Order submission, scheduling and keepalive services.
pub mod services;
