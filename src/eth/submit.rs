// src/eth/submit.rs

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::prelude::*;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use super::client::{connect, SignerClient};
use super::{PayoutSettlement, SetResultArgs, SettlementChain};
use crate::config::SubmitterConfig;
use crate::error::{Error, Result};
use crate::pipeline::{enter, Stage};
use crate::types::{Confirmation, NormalizedPayout};

/// Sends `batch` once and waits for its confirmation.
///
/// The wait ends after `wait` or as soon as `cancel` resolves, whichever is
/// first; both report [`Error::ConfirmationTimeout`] for the transaction that
/// was already broadcast. Nothing is ever sent twice.
pub async fn submit<C, F>(
    chain: &C,
    batch: &[NormalizedPayout],
    wait: Duration,
    cancel: F,
) -> Result<Confirmation>
where
    C: SettlementChain + ?Sized,
    F: Future<Output = ()>,
{
    ensure_not_empty(batch)?;

    enter(Stage::Submitting);
    let tx_hash = chain.broadcast(batch).await?;
    let tx_id = format!("{tx_hash:?}");
    info!(tx = %tx_id, payouts = batch.len(), "transaction sent");

    enter(Stage::AwaitingConfirmation);
    let started = Instant::now();

    tokio::select! {
        outcome = tokio::time::timeout(wait, chain.confirmation(tx_hash)) => match outcome {
            Ok(confirmation) => confirmation,
            Err(_) => {
                warn!(tx = %tx_id, ?wait, "no confirmation in time");
                Err(Error::ConfirmationTimeout { tx_hash: tx_id, waited: wait })
            }
        },
        _ = cancel => {
            warn!(tx = %tx_id, "confirmation wait cancelled");
            Err(Error::ConfirmationTimeout { tx_hash: tx_id, waited: started.elapsed() })
        }
    }
}

/// Rejects a batch with no payouts.
pub fn ensure_not_empty(batch: &[NormalizedPayout]) -> Result<()> {
    if batch.is_empty() {
        return Err(Error::submission("refusing to submit an empty batch"));
    }
    Ok(())
}

/// `setResult` on an EVM chain over JSON-RPC.
///
/// Owns the connection; dropping it releases the HTTP client.
pub struct EthChain {
    client: Arc<SignerClient>,
    contract: PayoutSettlement<SignerClient>,
    confirmations: usize,
    poll_interval: Duration,
}

impl EthChain {
    pub async fn connect(config: &SubmitterConfig, credential: &SecretString) -> Result<Self> {
        let client = connect(config, credential).await?;
        let contract = PayoutSettlement::new(config.contract_address, client.clone());

        Ok(Self {
            client,
            contract,
            confirmations: config.confirmations,
            poll_interval: config.poll_interval,
        })
    }

    async fn check_receipt(&self, receipt: TransactionReceipt) -> Result<Option<Confirmation>> {
        ensure_succeeded(&receipt)?;
        if receipt.block_number.is_none() {
            return Ok(None);
        }

        let head = match self.client.get_block_number().await {
            Ok(head) => head,
            Err(e) => {
                warn!("block number lookup failed: {e}");
                return Ok(None);
            }
        };

        Ok(confirmed_at(&receipt, head, self.confirmations))
    }
}

/// A receipt with status 0 means the call reverted on chain.
fn ensure_succeeded(receipt: &TransactionReceipt) -> Result<()> {
    let tx_hash = receipt.transaction_hash;
    if receipt.status == Some(U64::zero()) {
        return Err(Error::Submission {
            tx_hash: Some(format!("{tx_hash:?}")),
            detail: format!(
                "transaction {tx_hash:?} reverted in block {}",
                receipt.block_number.unwrap_or_default()
            ),
        });
    }
    Ok(())
}

/// `Some` once the receipt's block is at least `confirmations` deep below `head`.
fn confirmed_at(
    receipt: &TransactionReceipt,
    head: U64,
    confirmations: usize,
) -> Option<Confirmation> {
    let tx_hash = receipt.transaction_hash;
    let block = receipt.block_number?;

    let depth = head.saturating_sub(block).as_u64() + 1;
    if depth < confirmations as u64 {
        debug!(?tx_hash, depth, "waiting for more confirmations");
        return None;
    }

    Some(Confirmation {
        tx_hash,
        block_number: block.as_u64(),
        gas_used: receipt.gas_used,
    })
}

#[async_trait]
impl SettlementChain for EthChain {
    async fn broadcast(&self, batch: &[NormalizedPayout]) -> Result<TxHash> {
        let args: Vec<SetResultArgs> = batch.iter().map(SetResultArgs::from).collect();
        let call = self.contract.set_result(args);

        let pending = call.send().await.map_err(|e| {
            let detail = match e.decode_revert::<String>() {
                Some(reason) => format!("call reverted: {reason}"),
                None => e.to_string(),
            };
            Error::submission(detail)
        })?;

        Ok(pending.tx_hash())
    }

    async fn confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        loop {
            match self.client.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if let Some(confirmation) = self.check_receipt(receipt).await? {
                        return Ok(confirmation);
                    }
                }
                Ok(None) => debug!(?tx_hash, "not yet included"),
                Err(e) => warn!(?tx_hash, "receipt lookup failed: {e}"),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ErrorKind;
    use crate::eth::MockSettlementChain;

    fn payout(n: u64) -> NormalizedPayout {
        NormalizedPayout {
            addr: Address::from_low_u64_be(n),
            amount: U256::from(n) * U256::exp10(18),
            won_tickets_amount: vec![U256::from(n)],
        }
    }

    fn confirmed(tx_hash: TxHash) -> Confirmation {
        Confirmation {
            tx_hash,
            block_number: 42,
            gas_used: Some(U256::from(21_000u64)),
        }
    }

    fn never() -> std::future::Pending<()> {
        std::future::pending()
    }

    /// Accepts the broadcast and then never sees the receipt.
    #[derive(Default)]
    struct StalledChain {
        broadcasts: AtomicUsize,
    }

    #[async_trait]
    impl SettlementChain for StalledChain {
        async fn broadcast(&self, _batch: &[NormalizedPayout]) -> Result<TxHash> {
            self.broadcasts.fetch_add(1, Ordering::SeqCst);
            Ok(TxHash::repeat_byte(0xab))
        }

        async fn confirmation(&self, _tx_hash: TxHash) -> Result<Confirmation> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("confirmation wait outlived the test")
        }
    }

    #[tokio::test]
    async fn confirms_after_one_broadcast() {
        let tx_hash = TxHash::repeat_byte(0x11);
        let batch = vec![payout(1), payout(2)];

        let mut chain = MockSettlementChain::new();
        chain
            .expect_broadcast()
            .withf(|batch| batch.len() == 2)
            .times(1)
            .returning(move |_| Ok(tx_hash));
        chain
            .expect_confirmation()
            .times(1)
            .returning(|tx_hash| Ok(confirmed(tx_hash)));

        let confirmation = submit(&chain, &batch, Duration::from_secs(5), never())
            .await
            .unwrap();

        assert_eq!(confirmation, confirmed(tx_hash));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_before_broadcast() {
        let mut chain = MockSettlementChain::new();
        chain.expect_broadcast().never();
        chain.expect_confirmation().never();

        let err = submit(&chain, &[], Duration::from_secs(5), never())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Submission);
    }

    #[tokio::test]
    async fn broadcast_failure_is_not_retried() {
        let mut chain = MockSettlementChain::new();
        chain
            .expect_broadcast()
            .times(1)
            .returning(|_| Err(Error::submission("insufficient funds for gas")));
        chain.expect_confirmation().never();

        let err = submit(&chain, &[payout(1)], Duration::from_secs(5), never())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Submission);
        assert!(err.to_string().contains("insufficient funds"));
    }

    #[tokio::test]
    async fn confirmation_failure_keeps_the_hash() {
        let mut chain = MockSettlementChain::new();
        chain
            .expect_broadcast()
            .times(1)
            .returning(|_| Ok(TxHash::repeat_byte(0x22)));
        chain.expect_confirmation().times(1).returning(|tx_hash| {
            Err(Error::Submission {
                tx_hash: Some(format!("{tx_hash:?}")),
                detail: "reverted".into(),
            })
        });

        let err = submit(&chain, &[payout(1)], Duration::from_secs(5), never())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Submission);
        assert_eq!(
            err.tx_hash(),
            Some(format!("{:?}", TxHash::repeat_byte(0x22)).as_str())
        );
    }

    fn receipt(status: u64, block: Option<u64>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: TxHash::repeat_byte(0x33),
            status: Some(U64::from(status)),
            block_number: block.map(U64::from),
            gas_used: Some(U256::from(50_000u64)),
            ..Default::default()
        }
    }

    #[test]
    fn reverted_receipt_is_submission_error() {
        let err = ensure_succeeded(&receipt(0, Some(100))).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Submission);
        assert_eq!(
            err.tx_hash(),
            Some(format!("{:?}", TxHash::repeat_byte(0x33)).as_str())
        );
        assert!(err.to_string().contains("reverted in block 100"));
    }

    #[test]
    fn successful_receipt_passes() {
        assert!(ensure_succeeded(&receipt(1, Some(100))).is_ok());
    }

    #[test]
    fn pending_receipt_is_not_confirmed() {
        assert_eq!(confirmed_at(&receipt(1, None), U64::from(100), 1), None);
    }

    #[test]
    fn shallow_receipt_waits_for_depth() {
        // Included in the head block: depth 1 of 3.
        assert_eq!(confirmed_at(&receipt(1, Some(100)), U64::from(100), 3), None);
        assert_eq!(confirmed_at(&receipt(1, Some(100)), U64::from(101), 3), None);
    }

    #[test]
    fn receipt_at_depth_is_confirmed() {
        let confirmation = confirmed_at(&receipt(1, Some(100)), U64::from(102), 3).unwrap();

        assert_eq!(
            confirmation,
            Confirmation {
                tx_hash: TxHash::repeat_byte(0x33),
                block_number: 100,
                gas_used: Some(U256::from(50_000u64)),
            }
        );
    }

    #[test]
    fn lagging_head_counts_as_one_confirmation() {
        let confirmation = confirmed_at(&receipt(1, Some(100)), U64::from(99), 1);

        assert_eq!(confirmation.map(|c| c.block_number), Some(100));
    }

    #[tokio::test]
    async fn slow_confirmation_times_out_without_rebroadcast() {
        let chain = StalledChain::default();

        let err = submit(&chain, &[payout(1)], Duration::from_millis(50), never())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
        match err {
            Error::ConfirmationTimeout { tx_hash, waited } => {
                assert_eq!(tx_hash, format!("{:?}", TxHash::repeat_byte(0xab)));
                assert_eq!(waited, Duration::from_millis(50));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(chain.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_ends_the_wait() {
        let chain = StalledChain::default();
        let batch = [payout(1)];
        let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();

        let cancel = async move {
            let _ = cancel_rx.await;
        };
        let run = submit(&chain, &batch, Duration::from_secs(3600), cancel);

        let canceller = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = cancel_tx.send(());
        };

        let (result, ()) = tokio::join!(run, canceller);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::ConfirmationTimeout);
        assert_eq!(chain.broadcasts.load(Ordering::SeqCst), 1);
    }
}
