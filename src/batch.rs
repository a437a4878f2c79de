use ethers::abi::AbiEncode;
use ethers::types::{Address, Bytes};
use ethers::utils::to_checksum;
use tracing::debug;

use crate::error::{Error, Result};
use crate::eth::{SetResultArgs, SetResultCall};
use crate::types::{BatchArgument, NormalizedPayout, PayoutRecord};
use crate::units::{normalize, normalize_count};

/// Normalizes every record into the `setResult` argument.
///
/// The first record that fails aborts the whole build; there is no partial
/// batch.
pub fn build_batch(records: &[PayoutRecord], scale: u32) -> Result<BatchArgument> {
    records
        .iter()
        .map(|record| normalize_record(record, scale))
        .collect()
}

fn normalize_record(record: &PayoutRecord, scale: u32) -> Result<NormalizedPayout> {
    let addr = parse_address(record)?;

    let amount = normalize(&record.final_tokens, scale).map_err(|source| Error::Number {
        line: record.line,
        field: "finalTokens",
        source,
    })?;

    let won_tickets = normalize_count(&record.won_tickets).map_err(|source| Error::Number {
        line: record.line,
        field: "wonTickets",
        source,
    })?;

    debug!(line = record.line, ?addr, %amount, %won_tickets, "normalized");

    Ok(NormalizedPayout {
        addr,
        amount,
        won_tickets_amount: vec![won_tickets],
    })
}

/// Parses the account identifier. Mixed-case hex must carry a valid EIP-55
/// checksum; all-lower and all-upper spellings are taken as is.
fn parse_address(record: &PayoutRecord) -> Result<Address> {
    let invalid = |reason: String| Error::InvalidAddress {
        line: record.line,
        value: record.address.clone(),
        reason,
    };

    let addr = record
        .address
        .parse::<Address>()
        .map_err(|e| invalid(e.to_string()))?;

    let digits = record
        .address
        .strip_prefix("0x")
        .unwrap_or(&record.address);
    let mixed_case = digits.bytes().any(|b| b.is_ascii_uppercase())
        && digits.bytes().any(|b| b.is_ascii_lowercase());
    if mixed_case && to_checksum(&addr, None)[2..] != *digits {
        return Err(invalid("EIP-55 checksum mismatch".to_string()));
    }

    Ok(addr)
}

/// ABI-encoded calldata of `setResult(batch)`.
pub fn encode_call(batch: &[NormalizedPayout]) -> Bytes {
    SetResultCall {
        data: batch.iter().map(SetResultArgs::from).collect(),
    }
    .encode()
    .into()
}
