//! Per-user conversation sessions
//!
//! This module provides:
//! - Explicit state machines for the trim and merge conversations
//! - Independent in-memory registries keyed by user
//! - A background sweeper that expires sessions by creation time

mod state;
mod store;

pub use state::{MergeJob, MergeState, MergeStep, TrimJob, TrimState, TrimStep};
pub use store::{spawn_sweeper, Session, SessionStore, Sessions};
