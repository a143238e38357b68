//! Building the identity provider for the configured backend

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use chainlist_core::store::rpc::HttpTransport;
use chainlist_core::{
    Backend, Config, IdentityProvider, ListSynchronizer, LocalIdentity, LocalLedger, RpcIdentity,
};

/// Identity reported by the local backend
pub const LOCAL_IDENTITY: &str = "local";

pub fn provider(config: &Config) -> Result<Arc<dyn IdentityProvider>> {
    config.validate()?;

    match config.backend {
        Backend::Local => {
            let path = config.ledger_path();
            debug!("Opening local ledger at {:?}", path);
            let ledger = LocalLedger::open(path.clone())
                .with_context(|| format!("Failed to open local ledger at {:?}", path))?
                .with_finality_delay(config.local_finality());
            Ok(Arc::new(LocalIdentity::new(LOCAL_IDENTITY, ledger)))
        }
        Backend::Rpc => {
            // validate() guarantees a contract address for rpc
            let contract = config
                .contract_address
                .clone()
                .context("No contract address configured")?;
            debug!(url = %config.rpc_url, contract = %contract, "Using JSON-RPC backend");
            let transport = Arc::new(
                HttpTransport::new(config.rpc_url.clone())
                    .context("Failed to set up the JSON-RPC client")?,
            );
            Ok(Arc::new(
                RpcIdentity::new(transport, contract, config.poll_interval())
                    .with_account(config.account.clone()),
            ))
        }
    }
}

/// A synchronizer for the configured backend (not yet connected)
pub fn synchronizer(config: &Config) -> Result<ListSynchronizer> {
    Ok(ListSynchronizer::new(provider(config)?))
}
