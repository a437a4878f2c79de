use ethers::types::{Address, TxHash, U256};
use serde::Deserialize;

/// One row of the payout CSV, exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PayoutRecord {
    pub address: String,
    #[serde(rename = "finalTokens")]
    pub final_tokens: String,
    #[serde(rename = "wonTickets")]
    pub won_tickets: String,

    /// 1-based line in the source file, filled in by the loader.
    #[serde(skip)]
    pub line: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPayout {
    pub addr: Address,
    pub amount: U256,
    pub won_tickets_amount: Vec<U256>,
}

/// Argument of the batched settlement call; order matches the source file.
pub type BatchArgument = Vec<NormalizedPayout>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: Option<U256>,
}
