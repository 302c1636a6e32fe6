//! Peer-to-peer transfers.

pub mod models;
pub mod service;

pub use models::{NewTransfer, Transfer, TransferDirection, TransferId};
pub use service::TransferService;
