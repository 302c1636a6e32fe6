//! Accounts and their balances.
//!
//! Balances change only through [`Account::credit`] and [`Account::debit`]
//! on an account locked inside a unit of work; the caller appends the
//! matching audit entry in the same unit.

pub mod models;
pub mod store;

pub use models::{Account, AccountId};
pub use store::AccountStore;
