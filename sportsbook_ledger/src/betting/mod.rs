//! Bet lifecycle: placement, settlement and cancellation.
//!
//! ```text
//! Pending --won-->    Won
//! Pending --lost-->   Lost
//! Pending --cancel--> Cancelled
//! ```
//!
//! Terminal states are immutable.

pub mod engine;
pub mod models;

pub use engine::BetEngine;
pub use models::{Bet, BetId, BetOutcome, BetStatus, NewBet, SettlementReport};
