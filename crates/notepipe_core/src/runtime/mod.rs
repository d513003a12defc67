//! Execution contexts for the reactive pipeline.
//!
//! # Responsibility
//! - Model the interactive thread as a task queue (`Looper`) that other
//!   threads post onto.
//! - Run store mutations on one serialized worker per store.
//! - Provide a detached background context for diff computation.
//!
//! # Invariants
//! - Storage is only touched from an executor worker, never from a looper.
//! - Failures on background threads are logged, never propagated.

pub mod dispatch;
pub mod executor;
