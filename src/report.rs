use std::io::{self, Write};

use serde::Serialize;

use crate::error::{ErrorKind, Result};
use crate::types::{Confirmation, NormalizedPayout};
use crate::units::descale;

/// What a run ended with, in the form handed to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    Confirmed {
        tx_id: String,
        block_number: u64,
        confirmed: bool,
    },
    Failed {
        error_kind: ErrorKind,
        detail: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl SubmissionResult {
    pub fn from_run(result: &Result<Confirmation>) -> Self {
        match result {
            Ok(confirmation) => SubmissionResult::Confirmed {
                tx_id: format!("{:?}", confirmation.tx_hash),
                block_number: confirmation.block_number,
                confirmed: true,
            },
            Err(e) => SubmissionResult::Failed {
                error_kind: e.kind(),
                detail: e.to_string(),
                tx_id: e.tx_hash().map(str::to_string),
            },
        }
    }

    /// 0 confirmed, 2 confirmation timeout, 1 anything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            SubmissionResult::Confirmed { .. } => 0,
            SubmissionResult::Failed { error_kind, .. } => error_kind.exit_code(),
        }
    }
}

/// Writes the outcome: success to `out`, failure to `err`.
pub fn report<O: Write, E: Write>(
    result: &SubmissionResult,
    format: Format,
    out: &mut O,
    err: &mut E,
) -> io::Result<u8> {
    match (format, result) {
        (Format::Json, SubmissionResult::Confirmed { .. }) => {
            serde_json::to_writer(&mut *out, result)?;
            writeln!(out)?;
        }
        (Format::Json, SubmissionResult::Failed { .. }) => {
            serde_json::to_writer(&mut *err, result)?;
            writeln!(err)?;
        }
        (Format::Text, SubmissionResult::Confirmed { tx_id, block_number, .. }) => {
            writeln!(out, "Transaction sent: {tx_id}")?;
            writeln!(out, "Transaction confirmed in block {block_number}")?;
        }
        (Format::Text, SubmissionResult::Failed { error_kind, detail, tx_id }) => {
            writeln!(err, "{error_kind}: {detail}")?;
            if let Some(tx_id) = tx_id {
                writeln!(
                    err,
                    "Transaction {tx_id} was broadcast; check its status before resubmitting"
                )?;
            }
        }
    }

    Ok(result.exit_code())
}

/// Human-readable listing of a batch that was built but not sent.
pub fn dry_run<O: Write>(
    batch: &[NormalizedPayout],
    decimals: u32,
    calldata: &[u8],
    out: &mut O,
) -> io::Result<()> {
    writeln!(out, "{} payouts (dry run, nothing sent)", batch.len())?;
    for (i, payout) in batch.iter().enumerate() {
        let tickets: Vec<String> = payout
            .won_tickets_amount
            .iter()
            .map(|count| count.to_string())
            .collect();
        writeln!(
            out,
            "{:>4}  {:?}  {} ({} base units)  tickets [{}]",
            i + 1,
            payout.addr,
            descale(payout.amount, decimals),
            payout.amount,
            tickets.join(", ")
        )?;
    }
    writeln!(out, "calldata: 0x{}", hex::encode(calldata))?;
    Ok(())
}
