//! The off-chain index: a cache of the admin roster and a pagination index of votes.
//! Everything held here can be rebuilt from the ledger.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::Result;
use crate::ledger::LedgerClient;
use crate::model::{
    address::Address,
    pagination::{Paginated, Pagination},
};

mod admin;
mod memory;
mod mongo;
mod vote_record;

pub use admin::Admin;
pub use memory::MemoryIndex;
pub use mongo::MongoIndex;
pub use vote_record::VoteRecord;

/// Which vote records a listing selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteFilter {
    All,
    ByCreator(Address),
    Among(Vec<Address>),
}

impl VoteFilter {
    pub fn matches(&self, record: &VoteRecord) -> bool {
        match self {
            Self::All => true,
            Self::ByCreator(creator) => record.admin_address == *creator,
            Self::Among(votes) => votes.contains(&record.contract_address),
        }
    }
}

/// Scope of a page query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    ByCreator(Address),
    /// Votes the account holds a participation record in.
    ByParticipant(Address),
}

/// Storage behind the off-chain index.
#[rocket::async_trait]
pub trait IndexStore: Send + Sync {
    /// The cached admin roster, ordered by address.
    async fn admins(&self) -> Result<Vec<Admin>>;

    /// Insert an admin, or overwrite the cached profile if already present.
    async fn upsert_admin(&self, admin: &Admin) -> Result<()>;

    /// Returns whether an entry was removed.
    async fn remove_admin(&self, address: &Address) -> Result<bool>;

    /// Returns false if a record for the same vote already exists.
    async fn insert_vote(&self, record: &VoteRecord) -> Result<bool>;

    async fn contains_vote(&self, vote: &Address) -> Result<bool>;

    /// One page of matching records in creation order, and the total number matching.
    async fn page_votes(
        &self,
        filter: &VoteFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<VoteRecord>, u64)>;
}

/// Shared handle to the configured index store.
#[derive(Clone)]
pub struct Index(Arc<dyn IndexStore>);

impl Index {
    pub fn new(store: impl IndexStore + 'static) -> Self {
        Self(Arc::new(store))
    }

    /// List vote records in `scope`. Pages beyond the last are empty.
    pub async fn page_query(
        &self,
        ledger: &LedgerClient,
        scope: Scope,
        pagination: Pagination,
    ) -> Result<Paginated<VoteRecord>> {
        let filter = match scope {
            Scope::All => VoteFilter::All,
            Scope::ByCreator(creator) => VoteFilter::ByCreator(creator),
            Scope::ByParticipant(account) => VoteFilter::Among(ledger.votes_of(&account).await?),
        };
        let (records, count) = self.page_votes(&filter, &pagination).await?;
        Ok(pagination.result(records, count))
    }
}

impl Deref for Index {
    type Target = dyn IndexStore;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
