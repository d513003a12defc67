//! Observable values for the reactive pipeline.
//!
//! # Responsibility
//! - Hold the latest published snapshot and replay it to subscribers.
//! - Deliver on each subscriber's own dispatcher.
//!
//! # Invariants
//! - Delivery is level-triggered: a subscriber sees the newest value, never
//!   a backlog of intermediate ones.
//! - Inactive subscribers receive nothing until reactivated.

pub mod live_query;
