//! One settlement run, start to finish.
//!
//! `Loading -> Normalizing -> Building -> Submitting -> AwaitingConfirmation`
//! ends in `Confirmed` or `Failed`; no stage is ever re-entered.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tracing::{error, info};

use crate::batch::{build_batch, encode_call};
use crate::config::check_decimals;
use crate::error::{Error, Result};
use crate::eth::{submit, SettlementChain};
use crate::loader::load_records;
use crate::types::{BatchArgument, Confirmation, NormalizedPayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Normalizing,
    Building,
    Submitting,
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Normalizing => "normalizing",
            Stage::Building => "building",
            Stage::Submitting => "submitting",
            Stage::AwaitingConfirmation => "awaiting confirmation",
            Stage::Confirmed => "confirmed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub(crate) fn enter(stage: Stage) {
    info!(%stage, "stage");
}

/// Loads `input` and turns it into the call argument, without touching the
/// network.
pub fn prepare(input: &Path, decimals: u32) -> Result<BatchArgument> {
    let scale = check_decimals(decimals)?;

    enter(Stage::Loading);
    let records = load_records(input)?;
    info!("loaded {} payout records from {}", records.len(), input.display());

    enter(Stage::Normalizing);
    let batch = build_batch(&records, scale)?;

    enter(Stage::Building);
    info!(
        payouts = batch.len(),
        calldata_bytes = encode_call(&batch).len(),
        "batch argument ready"
    );

    Ok(batch)
}

/// Submits a prepared batch and logs how the run ended.
pub async fn settle<C, F>(
    batch: &[NormalizedPayout],
    chain: &C,
    confirmation_timeout: Duration,
    cancel: F,
) -> Result<Confirmation>
where
    C: SettlementChain + ?Sized,
    F: Future<Output = ()>,
{
    let outcome = submit(chain, batch, confirmation_timeout, cancel).await;
    finish(&outcome);
    outcome
}

/// Runs the whole pipeline against `chain`.
pub async fn run<C, F>(
    input: &Path,
    decimals: u32,
    chain: &C,
    confirmation_timeout: Duration,
    cancel: F,
) -> Result<Confirmation>
where
    C: SettlementChain + ?Sized,
    F: Future<Output = ()>,
{
    match prepare(input, decimals) {
        Ok(batch) => settle(&batch, chain, confirmation_timeout, cancel).await,
        Err(e) => fail(e),
    }
}

/// Ends a run that stopped before anything was submitted.
pub fn fail(error: Error) -> Result<Confirmation> {
    let outcome = Err(error);
    finish(&outcome);
    outcome
}

fn finish(outcome: &Result<Confirmation>) {
    match outcome {
        Ok(confirmation) => {
            enter(Stage::Confirmed);
            info!(
                tx = ?confirmation.tx_hash,
                block = confirmation.block_number,
                "transaction confirmed"
            );
        }
        Err(e) => {
            enter(Stage::Failed);
            error!(kind = %e.kind(), "{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::ErrorKind;
    use crate::eth::MockSettlementChain;

    #[derive(Clone, Default)]
    struct Logs(Arc<Mutex<Vec<u8>>>);

    impl Logs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Logs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(logs: &Logs) -> tracing::subscriber::DefaultGuard {
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    #[test]
    fn setup_failure_logs_failed_stage() {
        let logs = Logs::default();
        let _guard = capture(&logs);

        let err = fail(Error::Config("PRIVATE_KEY is not set".into())).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        let text = logs.text();
        assert!(text.contains("stage=failed"));
        assert!(text.contains("kind=ConfigError"));
        assert!(text.contains("PRIVATE_KEY is not set"));
    }

    #[tokio::test]
    async fn unreadable_input_fails_without_submitting() {
        let logs = Logs::default();
        let _guard = capture(&logs);

        let mut chain = MockSettlementChain::new();
        chain.expect_broadcast().never();
        chain.expect_confirmation().never();

        let missing = std::env::temp_dir().join("payout-settle-missing-input.csv");
        let err = run(
            &missing,
            18,
            &chain,
            Duration::from_secs(1),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        let text = logs.text();
        assert!(text.contains("stage=loading"));
        assert!(text.contains("stage=failed"));
        assert!(!text.contains("stage=submitting"));
    }
}
