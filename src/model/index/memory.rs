use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::model::{address::Address, pagination::Pagination};

use super::{Admin, IndexStore, VoteFilter, VoteRecord};

#[derive(Default)]
struct MemoryState {
    admins: BTreeMap<Address, Admin>,
    /// Kept sorted by `seq`.
    votes: Vec<VoteRecord>,
}

/// An index held in process memory, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<MemoryState>,
}

#[rocket::async_trait]
impl IndexStore for MemoryIndex {
    async fn admins(&self) -> Result<Vec<Admin>> {
        Ok(self.state.read().admins.values().cloned().collect())
    }

    async fn upsert_admin(&self, admin: &Admin) -> Result<()> {
        self.state
            .write()
            .admins
            .insert(admin.wallet_address, admin.clone());
        Ok(())
    }

    async fn remove_admin(&self, address: &Address) -> Result<bool> {
        Ok(self.state.write().admins.remove(address).is_some())
    }

    async fn insert_vote(&self, record: &VoteRecord) -> Result<bool> {
        let mut state = self.state.write();
        if state
            .votes
            .iter()
            .any(|r| r.contract_address == record.contract_address)
        {
            return Ok(false);
        }
        let position = state.votes.partition_point(|r| r.seq <= record.seq);
        state.votes.insert(position, record.clone());
        Ok(true)
    }

    async fn contains_vote(&self, vote: &Address) -> Result<bool> {
        Ok(self
            .state
            .read()
            .votes
            .iter()
            .any(|r| r.contract_address == *vote))
    }

    async fn page_votes(
        &self,
        filter: &VoteFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<VoteRecord>, u64)> {
        let state = self.state.read();
        let matching = state.votes.iter().filter(|r| filter.matches(r));
        let count = matching.clone().count() as u64;
        let records = matching
            .skip(pagination.skip() as usize)
            .take(pagination.page_size() as usize)
            .cloned()
            .collect();
        Ok((records, count))
    }
}
