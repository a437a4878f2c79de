use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use payout_settle::batch::encode_call;
use payout_settle::config::{
    SubmitterConfig, DEFAULT_CONFIRMATION_TIMEOUT_MS, DEFAULT_DECIMALS, DEFAULT_POLL_INTERVAL_MS,
};
use payout_settle::eth::{ensure_not_empty, EthChain};
use payout_settle::pipeline;
use payout_settle::report::{self, Format, SubmissionResult};
use payout_settle::BatchArgument;

#[derive(Parser, Debug)]
#[command(name = "payout-settle")]
#[command(about = "Submit a CSV of payouts to the settlement contract in one transaction", long_about = None)]
struct Args {
    /// CSV file with columns address, finalTokens, wonTickets
    input: PathBuf,

    /// JSON-RPC endpoint
    #[arg(long, env = "RPC_URL", required_unless_present = "dry_run")]
    rpc_url: Option<String>,

    /// Settlement contract address
    #[arg(long, env = "CONTRACT_ADDRESS", required_unless_present = "dry_run")]
    contract_address: Option<String>,

    /// How long to wait for the transaction to be confirmed
    #[arg(long, env = "CONFIRMATION_TIMEOUT_MS", default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_MS)]
    confirmation_timeout_ms: u64,

    /// Chain id; queried from the endpoint when omitted
    #[arg(long, env = "CHAIN_ID")]
    chain_id: Option<u64>,

    /// Decimal precision of the payout token
    #[arg(long, env = "TOKEN_DECIMALS", default_value_t = DEFAULT_DECIMALS)]
    decimals: u32,

    /// Blocks on top of the inclusion block, counting it
    #[arg(long, default_value_t = 1)]
    confirmations: usize,

    /// Receipt polling interval
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Build and print the batch without sending anything
    #[arg(long)]
    dry_run: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    if args.dry_run {
        return match dry_run(&args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e:#}");
                ExitCode::FAILURE
            }
        };
    }

    let result = settle(&args).await;

    let format = if args.json { Format::Json } else { Format::Text };
    let outcome = SubmissionResult::from_run(&result);
    match report::report(&outcome, format, &mut io::stdout(), &mut io::stderr()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("cannot write outcome: {e}");
            ExitCode::from(outcome.exit_code())
        }
    }
}

async fn settle(args: &Args) -> payout_settle::Result<payout_settle::Confirmation> {
    let (batch, chain, wait) = match connect(args).await {
        Ok(ready) => ready,
        Err(e) => return pipeline::fail(e),
    };

    pipeline::settle(&batch, &chain, wait, interrupted()).await
}

/// Everything that can fail before the transaction is sent.
async fn connect(args: &Args) -> payout_settle::Result<(BatchArgument, EthChain, Duration)> {
    let config = SubmitterConfig::new(
        args.rpc_url.clone().unwrap_or_default(),
        args.contract_address.as_deref().unwrap_or_default(),
        args.confirmation_timeout_ms,
    )?
    .with_chain_id(args.chain_id)
    .with_confirmations(args.confirmations)
    .with_poll_interval(Duration::from_millis(args.poll_interval_ms));

    let credential = signing_key()?;

    let batch = pipeline::prepare(&args.input, args.decimals)?;
    ensure_not_empty(&batch)?;

    let chain = EthChain::connect(&config, &credential).await?;

    Ok((batch, chain, config.confirmation_timeout))
}

fn signing_key() -> payout_settle::Result<SecretString> {
    std::env::var("PRIVATE_KEY")
        .map(SecretString::new)
        .map_err(|_| payout_settle::Error::Config("PRIVATE_KEY is not set".into()))
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn dry_run(args: &Args) -> anyhow::Result<()> {
    let batch = pipeline::prepare(&args.input, args.decimals)
        .with_context(|| format!("cannot build batch from {}", args.input.display()))?;

    let calldata = encode_call(&batch);
    report::dry_run(&batch, args.decimals, &calldata, &mut io::stdout())?;

    Ok(())
}
