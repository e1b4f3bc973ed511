use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{address::Address, vote::Vote};

/// An entry of the vote pagination index. Never the source of truth for vote content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub contract_address: Address,
    pub admin_address: Address,
    pub create_time: DateTime<Utc>,
    /// Ledger creation order; the sort key for every listing.
    pub seq: u64,
}

impl From<&Vote> for VoteRecord {
    fn from(vote: &Vote) -> Self {
        Self {
            contract_address: vote.address,
            admin_address: vote.admin,
            create_time: vote.create_time,
            seq: vote.seq,
        }
    }
}
