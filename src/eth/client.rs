// src/eth/client.rs

use std::sync::Arc;

use ethers::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::SubmitterConfig;
use crate::error::{Error, Result};

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Opens the RPC connection and binds the signing key to it.
///
/// The chain id is queried from the endpoint unless configured.
pub async fn connect(config: &SubmitterConfig, credential: &SecretString) -> Result<Arc<SignerClient>> {
    let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
        .map_err(|e| Error::Config(format!("invalid RPC url: {e}")))?
        .interval(config.poll_interval);

    let wallet: LocalWallet = credential
        .expose_secret()
        .trim()
        .parse()
        .map_err(|_| Error::Config("signing key is not a valid secp256k1 private key".into()))?;

    let chain_id = match config.chain_id {
        Some(id) => id,
        None => provider
            .get_chainid()
            .await
            .map_err(|e| Error::submission(format!("cannot query chain id: {e}")))?
            .as_u64(),
    };

    let wallet = wallet.with_chain_id(chain_id);
    info!(signer = ?wallet.address(), chain_id, "connected to RPC endpoint");

    Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
}
