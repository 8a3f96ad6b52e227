//! Session tracking: which conversation a (user, group) pair is currently in.

pub mod sweeper;
pub mod tracker;

pub use sweeper::SessionSweeper;
pub use tracker::{ResolveReason, Resolution, SessionKey, SessionTracker};
