use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rocket::tokio::time::timeout;

use crate::error::{Error, Result};
use crate::model::{
    account::Account,
    address::Address,
    participation::{ParticipationRecord, Tally},
    role::SystemRole,
    vote::Vote,
};

use super::{Ledger, Receipt, Revert, Transaction};

/// Shared handle to the ledger. Every call is bounded by a timeout and fails with
/// [`Error::LedgerUnavailable`] when it elapses. Calls are never retried.
#[derive(Clone)]
pub struct LedgerClient {
    ledger: Arc<dyn Ledger>,
    timeout: Duration,
}

impl LedgerClient {
    pub fn new(ledger: Arc<dyn Ledger>, timeout: Duration) -> Self {
        Self { ledger, timeout }
    }

    async fn bounded<T>(&self, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        timeout(self.timeout, call).await.map_err(|_| {
            Error::LedgerUnavailable(format!(
                "{what} timed out after {}ms",
                self.timeout.as_millis()
            ))
        })?
    }

    pub async fn root(&self) -> Result<Address> {
        self.bounded("root", self.ledger.root()).await
    }

    pub async fn account(&self, address: &Address) -> Result<Option<Account>> {
        self.bounded("account", self.ledger.account(address)).await
    }

    /// The system role of `address`; unknown accounts hold none.
    pub async fn role_of(&self, address: &Address) -> Result<SystemRole> {
        Ok(self
            .account(address)
            .await?
            .map(|account| account.role)
            .unwrap_or_default())
    }

    pub async fn admins(&self) -> Result<Vec<Account>> {
        self.bounded("admins", self.ledger.admins()).await
    }

    /// Fetch a vote, failing if it does not exist.
    pub async fn vote(&self, vote: &Address) -> Result<Vote> {
        self.bounded("vote", self.ledger.vote(vote))
            .await?
            .ok_or_else(|| Revert::VoteNotFound(*vote).into())
    }

    pub async fn votes(&self) -> Result<Vec<Vote>> {
        self.bounded("votes", self.ledger.votes()).await
    }

    pub async fn participation(
        &self,
        vote: &Address,
        account: &Address,
    ) -> Result<ParticipationRecord> {
        self.bounded("participation", self.ledger.participation(vote, account))
            .await
    }

    pub async fn votes_of(&self, account: &Address) -> Result<Vec<Address>> {
        self.bounded("votes_of", self.ledger.votes_of(account)).await
    }

    pub async fn tally(&self, vote: &Address) -> Result<Tally> {
        self.bounded("tally", self.ledger.tally(vote)).await
    }

    /// Submit a transaction as `sender` and wait for its receipt.
    pub async fn send(&self, sender: Address, transaction: Transaction) -> Result<Receipt> {
        debug!("Sending {transaction:?} from {sender}");
        let receipt = self
            .bounded("send", self.ledger.send(sender, transaction))
            .await?;
        info!(
            "Transaction {} confirmed at #{}: {:?}",
            receipt.tx_hash, receipt.seq, receipt.event
        );
        Ok(receipt)
    }
}
