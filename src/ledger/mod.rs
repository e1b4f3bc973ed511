//! The ledger collaborator: authoritative state for accounts, votes and participation.
//!
//! Reads are side-effect free. State changes are submitted as [`Transaction`]s on behalf
//! of a sender and either confirm with a [`Receipt`] or revert with a [`Revert`] reason.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    account::Account,
    address::Address,
    participation::{ParticipationRecord, Tally},
    role::{SystemRole, VoteRole},
    vote::{Vote, VoteSpec, VoteState},
};

mod client;
mod local;
mod revert;

pub use client::LedgerClient;
pub use local::{LedgerSnapshot, LocalLedger};
pub use revert::Revert;

/// A state-changing call, sent by a specific account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Transaction {
    RegisterAccount { email: String, nickname: String },
    UpdateNickname { nickname: String },
    SetRole { target: Address, role: SystemRole },
    CreateVote { spec: VoteSpec },
    NextState { vote: Address },
    RegisterCandidate { vote: Address },
    ApproveCandidate { vote: Address, candidate: Address },
    RegisterVoter { vote: Address },
    CastVote { vote: Address, option_id: u32 },
}

/// What a confirmed transaction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    AccountRegistered,
    NicknameUpdated,
    RoleChanged { target: Address, role: SystemRole },
    VoteCreated { vote: Address },
    StateAdvanced { vote: Address, state: VoteState },
    CandidateRegistered { vote: Address, role: VoteRole },
    CandidateApproved { vote: Address, option_id: u32 },
    VoterRegistered { vote: Address },
    BallotCast { vote: Address, option_id: u32 },
}

/// Confirmation of an applied transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
    /// Position of the transaction in the ledger's total order.
    pub seq: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// The call/send interface to the ledger.
#[rocket::async_trait]
pub trait Ledger: Send + Sync {
    /// The permanent root account fixed at genesis.
    async fn root(&self) -> Result<Address>;

    async fn account(&self, address: &Address) -> Result<Option<Account>>;

    /// Every admin-capable account, root included.
    async fn admins(&self) -> Result<Vec<Account>>;

    async fn vote(&self, vote: &Address) -> Result<Option<Vote>>;

    /// Every vote, in creation order.
    async fn votes(&self) -> Result<Vec<Vote>>;

    async fn participation(&self, vote: &Address, account: &Address)
        -> Result<ParticipationRecord>;

    /// Every vote the account holds a participation record in.
    async fn votes_of(&self, account: &Address) -> Result<Vec<Address>>;

    async fn tally(&self, vote: &Address) -> Result<Tally>;

    /// Submit a transaction and wait for it to be confirmed or reverted.
    async fn send(&self, sender: Address, transaction: Transaction) -> Result<Receipt>;
}
