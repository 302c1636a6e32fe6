//! Matches and the priced options bets are placed on.

pub mod catalog;
pub mod models;

pub use catalog::MarketCatalog;
pub use models::{BetOption, Match, MatchId, MatchStatus, NewBetOption, NewMatch, OptionId};
