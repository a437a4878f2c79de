use std::time::Duration;

use ethers::types::Address;

use crate::error::{Error, Result};
use crate::units::MAX_SCALE;

pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_DECIMALS: u32 = 18;

/// Everything the submitter needs besides the signing key.
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub confirmation_timeout: Duration,
    pub chain_id: Option<u64>,
    pub confirmations: usize,
    pub poll_interval: Duration,
}

impl SubmitterConfig {
    pub fn new(
        rpc_url: impl Into<String>,
        contract_address: &str,
        confirmation_timeout_ms: u64,
    ) -> Result<Self> {
        let rpc_url = rpc_url.into();
        if rpc_url.trim().is_empty() {
            return Err(Error::Config("RPC url is empty".into()));
        }

        let contract_address = contract_address
            .trim()
            .parse::<Address>()
            .map_err(|e| Error::Config(format!("invalid contract address {contract_address:?}: {e}")))?;

        if confirmation_timeout_ms == 0 {
            return Err(Error::Config("confirmation timeout must be positive".into()));
        }

        Ok(Self {
            rpc_url,
            contract_address,
            confirmation_timeout: Duration::from_millis(confirmation_timeout_ms),
            chain_id: None,
            confirmations: 1,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        })
    }

    pub fn with_chain_id(mut self, chain_id: Option<u64>) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

pub fn check_decimals(decimals: u32) -> Result<u32> {
    if decimals > MAX_SCALE {
        return Err(Error::Config(format!(
            "token decimals {decimals} exceed the maximum of {MAX_SCALE}"
        )));
    }
    Ok(decimals)
}
