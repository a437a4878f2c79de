// src/eth/mod.rs

use async_trait::async_trait;
use ethers::prelude::*;

use crate::error::Result;
use crate::types::{Confirmation, NormalizedPayout};

pub mod client;
pub mod submit;

pub use submit::{ensure_not_empty, submit, EthChain};

abigen!(
    PayoutSettlement,
    "./abi/PayoutSettlement.json"
);

/// The two network round-trips of a settlement run.
///
/// `broadcast` must send exactly one transaction. `confirmation` may wait
/// indefinitely; [`submit`] bounds it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementChain {
    async fn broadcast(&self, batch: &[NormalizedPayout]) -> Result<TxHash>;

    async fn confirmation(&self, tx_hash: TxHash) -> Result<Confirmation>;
}

impl From<&NormalizedPayout> for SetResultArgs {
    fn from(payout: &NormalizedPayout) -> Self {
        SetResultArgs {
            addr: payout.addr,
            amount: payout.amount,
            won_tickets_amount: payout.won_tickets_amount.clone(),
        }
    }
}
