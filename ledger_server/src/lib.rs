//! HTTP front door for the sportsbook account ledger.
//!
//! The binary wires [`config::ServerConfig`] to a [`sportsbook_ledger::Ledger`]
//! and serves [`api::create_router`]; the pieces are exposed here so tests can
//! drive the router without a socket.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
