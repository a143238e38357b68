//! Identity acquisition
//!
//! An `IdentityProvider` is asked once per connect for access. On success it
//! hands back a `Session`: the identity that was granted and the store bound
//! to it. Access requests are never retried automatically.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{AccessError, StoreError};
use crate::store::rpc::client::{RpcClient, RpcTransport, METHOD_NOT_FOUND, USER_REJECTED};
use crate::store::{ListStore, LocalLedger, RpcLedger};

/// A granted identity and the store it acts on
#[derive(Clone)]
pub struct Session {
    pub identity: String,
    pub store: Arc<dyn ListStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Grants (or refuses) access to an identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn request_access(&self) -> Result<Session, AccessError>;
}

/// Fixed identity over an in-process ledger
pub struct LocalIdentity {
    identity: String,
    ledger: LocalLedger,
}

impl LocalIdentity {
    pub fn new(identity: impl Into<String>, ledger: LocalLedger) -> Self {
        Self {
            identity: identity.into(),
            ledger,
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn request_access(&self) -> Result<Session, AccessError> {
        Ok(Session {
            identity: self.identity.clone(),
            store: Arc::new(self.ledger.clone()),
        })
    }
}

/// Accounts exposed by an Ethereum node
pub struct RpcIdentity {
    transport: Arc<dyn RpcTransport>,
    contract: String,
    account: Option<String>,
    poll_interval: Duration,
}

impl RpcIdentity {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        contract: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            contract: contract.into(),
            account: None,
            poll_interval,
        }
    }

    /// Use this account instead of the first one the node offers
    pub fn with_account(mut self, account: Option<String>) -> Self {
        self.account = account;
        self
    }

    async fn accounts(&self, client: &RpcClient) -> Result<Vec<String>, AccessError> {
        match client.call("eth_requestAccounts", json!([])).await {
            Ok(accounts) => Ok(accounts),
            Err(StoreError::Rpc { code, .. }) if code == METHOD_NOT_FOUND => {
                debug!("eth_requestAccounts not supported, falling back to eth_accounts");
                client
                    .call("eth_accounts", json!([]))
                    .await
                    .map_err(access_error)
            }
            Err(e) => Err(access_error(e)),
        }
    }
}

fn access_error(err: StoreError) -> AccessError {
    match err {
        StoreError::Rpc { code, .. } if code == USER_REJECTED => AccessError::Declined,
        other => AccessError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for RpcIdentity {
    async fn request_access(&self) -> Result<Session, AccessError> {
        let client = RpcClient::new(self.transport.clone());
        let accounts = self.accounts(&client).await?;

        let identity = match &self.account {
            Some(wanted) => accounts
                .iter()
                .find(|a| a.eq_ignore_ascii_case(wanted))
                .cloned()
                .ok_or_else(|| {
                    warn!(account = %wanted, "Configured account is not managed by the node");
                    AccessError::Unavailable(format!(
                        "account {} is not available on the node",
                        wanted
                    ))
                })?,
            None => accounts.into_iter().next().ok_or(AccessError::Declined)?,
        };

        info!(identity = %identity, "Access granted");
        let ledger = RpcLedger::new(
            self.transport.clone(),
            self.contract.clone(),
            identity.clone(),
            self.poll_interval,
        );

        Ok(Session {
            identity,
            store: Arc::new(ledger),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;
    use crate::store::rpc::tests::ScriptedTransport;

    const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
    const FIRST: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const SECOND: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    fn identity(transport: &Arc<ScriptedTransport>) -> RpcIdentity {
        RpcIdentity::new(transport.clone(), CONTRACT, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_local_identity_shares_ledger() {
        let ledger = LocalLedger::with_entries(vec![Entry::new("a")]);
        let session = LocalIdentity::new("local", ledger.clone())
            .request_access()
            .await
            .unwrap();

        assert_eq!(session.identity, "local");
        assert_eq!(session.store.read_all().await.unwrap(), ledger.entries());
    }

    #[tokio::test]
    async fn test_first_account_is_used() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply("eth_requestAccounts", Ok(json!([FIRST, SECOND])));

        let session = identity(&transport).request_access().await.unwrap();
        assert_eq!(session.identity, FIRST);
    }

    #[tokio::test]
    async fn test_falls_back_to_eth_accounts() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply(
            "eth_requestAccounts",
            Err(StoreError::Rpc {
                code: METHOD_NOT_FOUND,
                message: "Method not found".to_string(),
            }),
        );
        transport.reply("eth_accounts", Ok(json!([FIRST])));

        let session = identity(&transport).request_access().await.unwrap();
        assert_eq!(session.identity, FIRST);
        assert_eq!(
            transport.methods(),
            vec!["eth_requestAccounts", "eth_accounts"]
        );
    }

    #[tokio::test]
    async fn test_user_rejection_is_declined() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply(
            "eth_requestAccounts",
            Err(StoreError::Rpc {
                code: USER_REJECTED,
                message: "User rejected the request.".to_string(),
            }),
        );

        let err = identity(&transport).request_access().await.unwrap_err();
        assert_eq!(err, AccessError::Declined);
    }

    #[tokio::test]
    async fn test_no_accounts_is_declined() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply("eth_requestAccounts", Ok(json!([])));

        let err = identity(&transport).request_access().await.unwrap_err();
        assert_eq!(err, AccessError::Declined);
    }

    #[tokio::test]
    async fn test_transport_failure_is_unavailable() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply(
            "eth_requestAccounts",
            Err(StoreError::Transport("connection refused".to_string())),
        );

        let err = identity(&transport).request_access().await.unwrap_err();
        assert!(matches!(err, AccessError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_configured_account_is_matched_case_insensitively() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply("eth_requestAccounts", Ok(json!([FIRST, SECOND])));

        let session = identity(&transport)
            .with_account(Some(SECOND.to_uppercase().replacen("0X", "0x", 1)))
            .request_access()
            .await
            .unwrap();
        assert_eq!(session.identity, SECOND);
    }

    #[tokio::test]
    async fn test_unknown_configured_account() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply("eth_requestAccounts", Ok(json!([FIRST])));

        let err = identity(&transport)
            .with_account(Some(SECOND.to_string()))
            .request_access()
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Unavailable(_)));
    }
}
