//! Reconciliation of the off-chain index with the ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use rocket::tokio::sync::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::LedgerClient;
use crate::model::index::{Admin, Index, IndexStore, VoteRecord};

/// What one reconcile pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    /// Entries whose cached email or nickname had drifted.
    pub updated: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

/// Converges the cached admin roster to the ledger's admin set.
/// Passes are serialized, so overlapping calls each see a consistent roster.
#[derive(Clone)]
pub struct AdminRosterSynchronizer {
    ledger: LedgerClient,
    index: Index,
    pass: Arc<Mutex<()>>,
}

impl AdminRosterSynchronizer {
    pub fn new(ledger: LedgerClient, index: Index) -> Self {
        Self {
            ledger,
            index,
            pass: Arc::new(Mutex::new(())),
        }
    }

    pub async fn sync(&self) -> Result<SyncReport> {
        let _pass = self.pass.lock().await;

        let root = self.ledger.root().await?;
        let ledger_admins: BTreeMap<_, _> = self
            .ledger
            .admins()
            .await?
            .iter()
            .map(|account| (account.address, Admin::from(account)))
            .collect();
        if !ledger_admins.contains_key(&root) {
            return Err(Error::Inconsistent(format!(
                "ledger admin set is missing root {root}"
            )));
        }
        let cached: BTreeMap<_, _> = self
            .index
            .admins()
            .await?
            .into_iter()
            .map(|admin| (admin.wallet_address, admin))
            .collect();

        let mut report = SyncReport::default();
        for (address, admin) in &ledger_admins {
            match cached.get(address) {
                None => {
                    self.index.upsert_admin(admin).await?;
                    report.added += 1;
                }
                Some(entry) if entry != admin => {
                    self.index.upsert_admin(admin).await?;
                    report.updated += 1;
                }
                Some(_) => {}
            }
        }
        for address in cached.keys() {
            // Root never leaves the roster by omission.
            if *address != root
                && !ledger_admins.contains_key(address)
                && self.index.remove_admin(address).await?
            {
                report.removed += 1;
            }
        }

        if report.is_noop() {
            debug!("Admin roster already in sync");
        } else {
            info!(
                "Admin roster synced: {} added, {} removed, {} updated",
                report.added, report.removed, report.updated
            );
        }
        Ok(report)
    }

    /// Run a pass after a confirmed ledger write. The write stands whatever the outcome,
    /// so a failed pass is logged and left for the next one.
    pub async fn sync_after_write(&self) {
        if let Err(e) = self.sync().await {
            error!("Admin roster not synced after ledger write: {e}");
        }
    }
}

/// Insert every ledger vote missing from the pagination index. Returns the number added.
pub async fn rebuild_index(ledger: &LedgerClient, index: &Index) -> Result<usize> {
    let mut added = 0;
    for vote in ledger.votes().await? {
        if !index.contains_vote(&vote.address).await?
            && index.insert_vote(&VoteRecord::from(&vote)).await?
        {
            added += 1;
        }
    }
    if added > 0 {
        info!("Vote index rebuilt, {added} record(s) added");
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ledger::{LocalLedger, Transaction};
    use crate::model::{
        address::Address, index::MemoryIndex, role::SystemRole, vote::VoteSpec,
    };

    fn setup() -> (LedgerClient, Index, AdminRosterSynchronizer) {
        let ledger = LocalLedger::genesis(Address::example(0), "root@example.com".to_string());
        let ledger = LedgerClient::new(Arc::new(ledger), Duration::from_secs(1));
        let index = Index::new(MemoryIndex::default());
        let synchronizer = AdminRosterSynchronizer::new(ledger.clone(), index.clone());
        (ledger, index, synchronizer)
    }

    async fn set_role(ledger: &LedgerClient, target: Address, role: SystemRole) {
        ledger
            .send(Address::example(0), Transaction::SetRole { target, role })
            .await
            .unwrap();
    }

    async fn cached(index: &Index) -> Vec<Address> {
        index
            .admins()
            .await
            .unwrap()
            .into_iter()
            .map(|admin| admin.wallet_address)
            .collect()
    }

    #[rocket::async_test]
    async fn grant_then_revoke() {
        let (ledger, index, synchronizer) = setup();
        let z = Address::example(5);

        set_role(&ledger, z, SystemRole::Admin).await;
        let report = synchronizer.sync().await.unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(cached(&index).await, vec![Address::example(0), z]);

        set_role(&ledger, z, SystemRole::User).await;
        let report = synchronizer.sync().await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(cached(&index).await, vec![Address::example(0)]);
    }

    #[rocket::async_test]
    async fn second_pass_is_noop() {
        let (ledger, _, synchronizer) = setup();
        set_role(&ledger, Address::example(5), SystemRole::Admin).await;
        assert!(!synchronizer.sync().await.unwrap().is_noop());
        assert!(synchronizer.sync().await.unwrap().is_noop());
    }

    #[rocket::async_test]
    async fn stale_and_drifted_entries_are_repaired() {
        let (ledger, index, synchronizer) = setup();
        let admin = Address::example(5);
        set_role(&ledger, admin, SystemRole::Admin).await;
        ledger
            .send(
                admin,
                Transaction::RegisterAccount {
                    email: "a@example.com".to_string(),
                    nickname: "a".to_string(),
                },
            )
            .await
            .unwrap();

        index.upsert_admin(&Admin::example(7)).await.unwrap();
        index
            .upsert_admin(&Admin {
                wallet_address: admin,
                email: "old@example.com".to_string(),
                nickname: "old".to_string(),
            })
            .await
            .unwrap();

        let report = synchronizer.sync().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                added: 1,
                removed: 1,
                updated: 1
            }
        );
        let admins = index.admins().await.unwrap();
        let entry = admins.iter().find(|a| a.wallet_address == admin).unwrap();
        assert_eq!(entry.email, "a@example.com");
    }

    #[rocket::async_test]
    async fn overlapping_passes_converge() {
        let (ledger, index, synchronizer) = setup();
        for n in 10..20 {
            set_role(&ledger, Address::example(n), SystemRole::Admin).await;
        }
        let (a, b) = rocket::tokio::join!(synchronizer.sync(), synchronizer.sync());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.added + b.added, 11);
        assert_eq!(cached(&index).await.len(), 11);
    }

    #[rocket::async_test]
    async fn rebuild_fills_missing_votes_once() {
        let (ledger, index, _) = setup();
        for _ in 0..3 {
            ledger
                .send(
                    Address::example(0),
                    Transaction::CreateVote {
                        spec: VoteSpec::example(),
                    },
                )
                .await
                .unwrap();
        }
        let first = ledger.votes().await.unwrap().remove(0);
        index.insert_vote(&VoteRecord::from(&first)).await.unwrap();

        assert_eq!(rebuild_index(&ledger, &index).await.unwrap(), 2);
        assert_eq!(rebuild_index(&ledger, &index).await.unwrap(), 0);
    }
}
