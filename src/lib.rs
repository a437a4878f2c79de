//! Batched payout settlement.
//!
//! Reads a CSV of payout records, scales the amounts to the token's fixed-point
//! precision, and submits them in one `setResult` call to the settlement
//! contract, waiting for the transaction to be confirmed.

pub mod batch;
pub mod config;
pub mod error;
pub mod eth;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod types;
pub mod units;

pub use error::{Error, ErrorKind, Result};
pub use types::*;
