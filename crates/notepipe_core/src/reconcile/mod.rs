//! List reconciliation: snapshot diffing and incremental list updates.
//!
//! # Responsibility
//! - Turn two ordered snapshots into a positional edit script.
//! - Apply scripts to a displayed list without redrawing it wholesale.
//!
//! # Invariants
//! - Replaying `diff(old, new)` onto `old` yields exactly `new`.
//! - Item identity drives matching; content equality only suppresses
//!   `Change` operations.

pub mod diff;
pub mod reconciler;
