//! A single vote and its forward-only lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::Revert;
use crate::model::{
    address::Address,
    role::{is_implicitly_eligible, VoteRole},
};

mod spec;
mod state;

pub use spec::VoteSpec;
pub use state::{OptionType, VoteState};

/// Option ID reserved for "no selection".
pub const NO_SELECTION: u32 = 0;

/// One selectable choice within a vote. IDs are 1-based and dense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub id: u32,
    #[serde(flatten)]
    pub content: OptionContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionContent {
    RawText(String),
    Candidate(Address),
}

/// A deployed vote, as held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub address: Address,
    pub title: String,
    pub description: String,
    pub option_type: OptionType,
    pub need_registration: bool,
    pub candidate_need_approval: bool,
    /// The account that deployed the vote; the only one allowed to drive it.
    pub admin: Address,
    pub state: VoteState,
    pub options: Vec<VoteOption>,
    pub create_time: DateTime<Utc>,
    /// Position of this vote in the ledger's creation order.
    pub seq: u64,
}

impl Vote {
    /// Create a vote in the `Init` state from an already-validated spec.
    pub fn new(
        address: Address,
        admin: Address,
        spec: VoteSpec,
        create_time: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        let options = spec
            .options
            .into_iter()
            .zip(1..)
            .map(|(text, id)| VoteOption {
                id,
                content: OptionContent::RawText(text),
            })
            .collect();
        Self {
            address,
            title: spec.title,
            description: spec.description,
            option_type: spec.option_type,
            need_registration: spec.need_registration,
            candidate_need_approval: spec.candidate_need_approval,
            admin,
            state: VoteState::Init,
            options,
            create_time,
            seq,
        }
    }

    /// Whether the lifecycle passes through `Registration`.
    pub fn has_registration_state(&self) -> bool {
        self.need_registration || self.option_type == OptionType::CandidateRegistration
    }

    pub fn is_admin(&self, account: &Address) -> bool {
        self.admin == *account
    }

    pub fn option(&self, id: u32) -> Option<&VoteOption> {
        self.options.iter().find(|option| option.id == id)
    }

    /// Advance exactly one state. Only the vote's admin may do this.
    pub fn next_state(&mut self, caller: &Address) -> Result<VoteState, Revert> {
        if !self.is_admin(caller) {
            return Err(Revert::NotAuthorized(format!(
                "{caller} is not the admin of vote {}",
                self.address
            )));
        }
        self.state = match self.state {
            VoteState::Init if self.has_registration_state() => VoteState::Registration,
            VoteState::Init | VoteState::Registration => VoteState::Voting,
            VoteState::Voting => VoteState::Ended,
            VoteState::Ended => return Err(Revert::TerminalState),
        };
        Ok(self.state)
    }

    pub(crate) fn require_state(&self, expected: VoteState) -> Result<(), Revert> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Revert::WrongState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Append an option for an approved candidate, returning its ID.
    pub(crate) fn push_candidate(&mut self, candidate: Address) -> u32 {
        let id = self.options.len() as u32 + 1;
        self.options.push(VoteOption {
            id,
            content: OptionContent::Candidate(candidate),
        });
        id
    }

    pub fn can_register_candidate(&self, role: VoteRole) -> bool {
        self.state == VoteState::Registration
            && self.option_type == OptionType::CandidateRegistration
            && role == VoteRole::None
    }

    pub fn can_register_voter(&self, role: VoteRole) -> bool {
        self.state == VoteState::Registration && self.need_registration && role == VoteRole::None
    }

    pub fn can_vote(&self, role: VoteRole, selection: u32) -> bool {
        let eligible = if self.need_registration {
            role == VoteRole::Voter
        } else {
            is_implicitly_eligible(role)
        };
        self.state == VoteState::Voting && selection == NO_SELECTION && eligible
    }
}
