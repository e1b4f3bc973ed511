use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use parking_lot::RwLock;
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::{Error, Result};
use crate::model::{
    account::{Account, AccountBook},
    address::Address,
    participation::{ParticipationBook, ParticipationRecord, Tally},
    role::can_create_vote,
    vote::Vote,
};

use super::{Event, Ledger, Receipt, Revert, Transaction};

/// Serialisable image of the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    accounts: AccountBook,
    participation: ParticipationBook,
    /// Votes in creation order; `Vote::seq` is the index.
    votes: Vec<Vote>,
    /// Deployment nonce per creator.
    nonces: HashMap<Address, u64>,
    tx_count: u64,
}

impl LedgerSnapshot {
    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn accounts(&self) -> &AccountBook {
        &self.accounts
    }

    pub fn tally(&self, vote: &Vote) -> Tally {
        self.participation.tally(vote)
    }

    /// Read a snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Internal(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| Error::Internal(format!("parsing {}: {e}", path.display())))
    }

    /// Write this snapshot to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("encoding ledger snapshot: {e}")))?;
        std::fs::write(path, data)
            .map_err(|e| Error::Internal(format!("writing {}: {e}", path.display())))
    }
}

struct LedgerState {
    snapshot: LedgerSnapshot,
    by_address: HashMap<Address, usize>,
}

fn vote_index(
    by_address: &HashMap<Address, usize>,
    vote: &Address,
) -> std::result::Result<usize, Revert> {
    by_address
        .get(vote)
        .copied()
        .ok_or(Revert::VoteNotFound(*vote))
}

impl LedgerState {
    /// Apply a transaction atomically: on revert nothing has changed.
    fn apply(
        &mut self,
        sender: &Address,
        transaction: Transaction,
        now: DateTime<Utc>,
    ) -> std::result::Result<Event, Revert> {
        let state = &mut self.snapshot;
        let event = match transaction {
            Transaction::RegisterAccount { email, nickname } => {
                state.accounts.register(sender, email, nickname, now)?;
                Event::AccountRegistered
            }
            Transaction::UpdateNickname { nickname } => {
                state.accounts.update_nickname(sender, nickname)?;
                Event::NicknameUpdated
            }
            Transaction::SetRole { target, role } => {
                state.accounts.set_role(sender, &target, role, now)?;
                Event::RoleChanged { target, role }
            }
            Transaction::CreateVote { spec } => {
                if !can_create_vote(state.accounts.role_of(sender)) {
                    return Err(Revert::NotAuthorized(format!(
                        "{sender} may not create votes"
                    )));
                }
                spec.validate()?;
                let nonce = state.nonces.entry(*sender).or_default();
                let mut address = Address::derive(sender, *nonce);
                *nonce += 1;
                while self.by_address.contains_key(&address) {
                    address = Address::derive(sender, *nonce);
                    *nonce += 1;
                }
                let seq = state.votes.len() as u64;
                state.votes.push(Vote::new(address, *sender, spec, now, seq));
                self.by_address.insert(address, seq as usize);
                Event::VoteCreated { vote: address }
            }
            Transaction::NextState { vote } => {
                let index = vote_index(&self.by_address, &vote)?;
                let new_state = state.votes[index].next_state(sender)?;
                Event::StateAdvanced {
                    vote,
                    state: new_state,
                }
            }
            Transaction::RegisterCandidate { vote } => {
                let index = vote_index(&self.by_address, &vote)?;
                let role = state
                    .participation
                    .register_candidate(&mut state.votes[index], sender)?;
                Event::CandidateRegistered { vote, role }
            }
            Transaction::ApproveCandidate { vote, candidate } => {
                let index = vote_index(&self.by_address, &vote)?;
                let option_id = state.participation.approve_candidate(
                    &mut state.votes[index],
                    sender,
                    &candidate,
                )?;
                Event::CandidateApproved { vote, option_id }
            }
            Transaction::RegisterVoter { vote } => {
                let index = vote_index(&self.by_address, &vote)?;
                state
                    .participation
                    .register_voter(&state.votes[index], sender)?;
                Event::VoterRegistered { vote }
            }
            Transaction::CastVote { vote, option_id } => {
                let index = vote_index(&self.by_address, &vote)?;
                state
                    .participation
                    .cast_vote(&state.votes[index], sender, option_id)?;
                Event::BallotCast { vote, option_id }
            }
        };
        Ok(event)
    }
}

/// An in-process ledger. Transactions are applied one at a time under a write lock,
/// giving them a single total order; reads share a read lock.
pub struct LocalLedger {
    state: RwLock<LedgerState>,
}

impl LocalLedger {
    /// Start a fresh ledger whose only account is `root`.
    pub fn genesis(root: Address, root_email: String) -> Self {
        Self::from_snapshot(LedgerSnapshot {
            accounts: AccountBook::genesis(root, root_email, Utc::now()),
            participation: ParticipationBook::default(),
            votes: Vec::new(),
            nonces: HashMap::new(),
            tx_count: 0,
        })
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let by_address = snapshot
            .votes
            .iter()
            .enumerate()
            .map(|(index, vote)| (vote.address, index))
            .collect();
        Self {
            state: RwLock::new(LedgerState {
                snapshot,
                by_address,
            }),
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().snapshot.clone()
    }
}

fn tx_hash(seq: u64, sender: &Address, transaction: &Transaction) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(seq.to_be_bytes());
    hasher.update(sender.as_bytes());
    hasher.update(format!("{transaction:?}").as_bytes());
    format!("0x{}", HEXLOWER.encode(&hasher.finalize()))
}

#[rocket::async_trait]
impl Ledger for LocalLedger {
    async fn root(&self) -> Result<Address> {
        Ok(self.state.read().snapshot.accounts.root())
    }

    async fn account(&self, address: &Address) -> Result<Option<Account>> {
        Ok(self.state.read().snapshot.accounts.get(address).cloned())
    }

    async fn admins(&self) -> Result<Vec<Account>> {
        Ok(self.state.read().snapshot.accounts.admins())
    }

    async fn vote(&self, vote: &Address) -> Result<Option<Vote>> {
        let state = self.state.read();
        Ok(state
            .by_address
            .get(vote)
            .map(|index| state.snapshot.votes[*index].clone()))
    }

    async fn votes(&self) -> Result<Vec<Vote>> {
        Ok(self.state.read().snapshot.votes.clone())
    }

    async fn participation(
        &self,
        vote: &Address,
        account: &Address,
    ) -> Result<ParticipationRecord> {
        Ok(self.state.read().snapshot.participation.record(vote, account))
    }

    async fn votes_of(&self, account: &Address) -> Result<Vec<Address>> {
        Ok(self.state.read().snapshot.participation.votes_of(account))
    }

    async fn tally(&self, vote: &Address) -> Result<Tally> {
        let state = self.state.read();
        let index = vote_index(&state.by_address, vote)?;
        Ok(state
            .snapshot
            .participation
            .tally(&state.snapshot.votes[index]))
    }

    async fn send(&self, sender: Address, transaction: Transaction) -> Result<Receipt> {
        let mut state = self.state.write();
        let hash = tx_hash(state.snapshot.tx_count, &sender, &transaction);
        let event = state.apply(&sender, transaction, Utc::now())?;
        let seq = state.snapshot.tx_count;
        state.snapshot.tx_count += 1;
        Ok(Receipt {
            tx_hash: hash,
            seq,
            event,
        })
    }
}
