//! Per-(vote, account) participation records: roles within a vote and ballot selections.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ledger::Revert;
use crate::model::{
    address::Address,
    role::{is_implicitly_eligible, is_voter, VoteRole},
    vote::{OptionType, Vote, VoteState, NO_SELECTION},
};

/// An account's standing within one vote.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRecord {
    pub role: VoteRole,
    /// The selected option, or [`NO_SELECTION`]. Never changes once set.
    pub selection: u32,
}

impl ParticipationRecord {
    pub fn has_voted(&self) -> bool {
        self.selection != NO_SELECTION
    }
}

/// Ballot counts for one vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Count per option ID. Every option of the vote is present.
    pub counts: BTreeMap<u32, u64>,
    /// Sum of all counts; the denominator for percentages.
    pub total: u64,
}

impl Tally {
    /// Whole-number percentage of the total held by `option_id`.
    pub fn percentage(&self, option_id: u32) -> u64 {
        if self.total == 0 {
            return 0;
        }
        let count = self.counts.get(&option_id).copied().unwrap_or(0);
        (count * 100 + self.total / 2) / self.total
    }
}

/// All participation records, keyed by vote then account.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ParticipationBook {
    records: HashMap<Address, HashMap<Address, ParticipationRecord>>,
}

impl ParticipationBook {
    /// The record for `account` in `vote`, defaulting to no involvement.
    pub fn record(&self, vote: &Address, account: &Address) -> ParticipationRecord {
        self.records
            .get(vote)
            .and_then(|records| records.get(account))
            .copied()
            .unwrap_or_default()
    }

    /// Every vote `account` has a record in.
    pub fn votes_of(&self, account: &Address) -> Vec<Address> {
        self.records
            .iter()
            .filter(|(_, records)| records.contains_key(account))
            .map(|(vote, _)| *vote)
            .collect()
    }

    /// Every record held for `vote`.
    pub fn records_for(&self, vote: &Address) -> Vec<(Address, ParticipationRecord)> {
        self.records
            .get(vote)
            .map(|records| records.iter().map(|(a, r)| (*a, *r)).collect())
            .unwrap_or_default()
    }

    fn entry(&mut self, vote: &Address, account: &Address) -> &mut ParticipationRecord {
        self.records
            .entry(*vote)
            .or_default()
            .entry(*account)
            .or_default()
    }

    /// Sign `account` up as a candidate. Pending until approved, unless the vote
    /// does not require approval, in which case the option is created immediately.
    pub fn register_candidate(
        &mut self,
        vote: &mut Vote,
        account: &Address,
    ) -> Result<VoteRole, Revert> {
        vote.require_state(VoteState::Registration)?;
        if vote.option_type != OptionType::CandidateRegistration {
            return Err(Revert::WrongOptionType);
        }
        if self.record(&vote.address, account).role != VoteRole::None {
            return Err(Revert::AlreadyRegistered(*account));
        }

        let role = if vote.candidate_need_approval {
            VoteRole::PendingCandidate
        } else {
            vote.push_candidate(*account);
            VoteRole::Candidate
        };
        self.entry(&vote.address, account).role = role;
        Ok(role)
    }

    /// Promote a pending candidate and give them an option. Returns the new option ID.
    pub fn approve_candidate(
        &mut self,
        vote: &mut Vote,
        caller: &Address,
        candidate: &Address,
    ) -> Result<u32, Revert> {
        if !vote.is_admin(caller) {
            return Err(Revert::NotAuthorized(format!(
                "{caller} is not the admin of vote {}",
                vote.address
            )));
        }
        vote.require_state(VoteState::Registration)?;
        if self.record(&vote.address, candidate).role != VoteRole::PendingCandidate {
            return Err(Revert::NotPending(*candidate));
        }

        let option_id = vote.push_candidate(*candidate);
        self.entry(&vote.address, candidate).role = VoteRole::Candidate;
        Ok(option_id)
    }

    pub fn register_voter(&mut self, vote: &Vote, account: &Address) -> Result<(), Revert> {
        vote.require_state(VoteState::Registration)?;
        if !vote.need_registration {
            return Err(Revert::RegistrationDisabled);
        }
        if self.record(&vote.address, account).role != VoteRole::None {
            return Err(Revert::AlreadyRegistered(*account));
        }
        *self.entry(&vote.address, account) = ParticipationRecord {
            role: VoteRole::Voter,
            selection: NO_SELECTION,
        };
        Ok(())
    }

    /// Record a ballot. A second ballot from the same account always fails with
    /// [`Revert::AlreadyVoted`], so a retried submission can never double count.
    pub fn cast_vote(
        &mut self,
        vote: &Vote,
        account: &Address,
        option_id: u32,
    ) -> Result<(), Revert> {
        vote.require_state(VoteState::Voting)?;
        let record = self.record(&vote.address, account);
        if record.has_voted() {
            return Err(Revert::AlreadyVoted(*account));
        }
        let eligible = if vote.need_registration {
            is_voter(record.role)
        } else {
            is_implicitly_eligible(record.role)
        };
        if !eligible {
            return Err(Revert::NotEligible(*account));
        }
        if vote.option(option_id).is_none() {
            return Err(Revert::InvalidOption(option_id));
        }

        *self.entry(&vote.address, account) = ParticipationRecord {
            role: VoteRole::Voter,
            selection: option_id,
        };
        Ok(())
    }

    /// Count ballots per option. Only voter records with a selection contribute.
    pub fn tally(&self, vote: &Vote) -> Tally {
        let mut counts: BTreeMap<u32, u64> =
            vote.options.iter().map(|option| (option.id, 0)).collect();
        let mut total = 0;
        if let Some(records) = self.records.get(&vote.address) {
            for record in records.values() {
                if is_voter(record.role) && record.has_voted() {
                    *counts.entry(record.selection).or_default() += 1;
                    total += 1;
                }
            }
        }
        Tally { counts, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::vote::{OptionContent, VoteSpec};

    fn advanced(spec: VoteSpec, state: VoteState) -> Vote {
        let mut vote = Vote::example(spec);
        let admin = vote.admin;
        while vote.state < state {
            vote.next_state(&admin).unwrap();
        }
        vote
    }

    #[test]
    fn open_vote_scenario() {
        let vote = advanced(VoteSpec::example(), VoteState::Voting);
        let mut book = ParticipationBook::default();
        let x = Address::example(10);

        assert_eq!(book.cast_vote(&vote, &x, 1), Ok(()));
        assert_eq!(book.record(&vote.address, &x).selection, 1);

        let err = book.cast_vote(&vote, &x, 2).unwrap_err();
        assert_eq!(err, Revert::AlreadyVoted(x));
        assert_eq!(err.kind(), ErrorKind::AlreadyDone);
        assert_eq!(book.record(&vote.address, &x).selection, 1);
    }

    #[test]
    fn registration_required_scenario() {
        let mut vote = advanced(VoteSpec::example_registered(), VoteState::Registration);
        let mut book = ParticipationBook::default();
        let y = Address::example(11);

        // Cannot vote during registration at all.
        assert!(matches!(
            book.cast_vote(&vote, &y, 1),
            Err(Revert::WrongState { .. })
        ));

        let admin = vote.admin;
        vote.next_state(&admin).unwrap();
        assert_eq!(book.cast_vote(&vote, &y, 1), Err(Revert::NotEligible(y)));

        // Registering after the fact is no longer possible.
        assert!(matches!(
            book.register_voter(&vote, &y),
            Err(Revert::WrongState { .. })
        ));

        let mut vote = advanced(VoteSpec::example_registered(), VoteState::Registration);
        book.register_voter(&vote, &y).unwrap();
        assert_eq!(book.register_voter(&vote, &y), Err(Revert::AlreadyRegistered(y)));
        let admin = vote.admin;
        vote.next_state(&admin).unwrap();
        assert_eq!(book.cast_vote(&vote, &y, 2), Ok(()));
    }

    #[test]
    fn register_voter_requires_registration_flag() {
        let vote = advanced(VoteSpec::example_candidates(), VoteState::Registration);
        let mut book = ParticipationBook::default();
        assert_eq!(
            book.register_voter(&vote, &Address::example(12)),
            Err(Revert::RegistrationDisabled)
        );
    }

    #[test]
    fn invalid_option_is_rejected() {
        let vote = advanced(VoteSpec::example(), VoteState::Voting);
        let mut book = ParticipationBook::default();
        let x = Address::example(10);
        assert_eq!(book.cast_vote(&vote, &x, 0), Err(Revert::InvalidOption(0)));
        assert_eq!(book.cast_vote(&vote, &x, 3), Err(Revert::InvalidOption(3)));
        assert!(!book.record(&vote.address, &x).has_voted());
    }

    #[test]
    fn approve_candidate_creates_option() {
        let mut vote = advanced(VoteSpec::example_candidates(), VoteState::Registration);
        let mut book = ParticipationBook::default();
        let admin = vote.admin;
        let alice = Address::example(20);

        assert_eq!(
            book.register_candidate(&mut vote, &alice),
            Ok(VoteRole::PendingCandidate)
        );
        assert!(vote.options.is_empty());
        assert_eq!(
            book.register_candidate(&mut vote, &alice),
            Err(Revert::AlreadyRegistered(alice))
        );

        let id = book.approve_candidate(&mut vote, &admin, &alice).unwrap();
        assert_eq!(vote.options.len(), 1);
        assert_eq!(
            vote.option(id).unwrap().content,
            OptionContent::Candidate(alice)
        );
        assert_eq!(book.record(&vote.address, &alice).role, VoteRole::Candidate);

        // A second approval loses.
        assert_eq!(
            book.approve_candidate(&mut vote, &admin, &alice),
            Err(Revert::NotPending(alice))
        );
        assert_eq!(vote.options.len(), 1);
    }

    #[test]
    fn only_admin_approves() {
        let mut vote = advanced(VoteSpec::example_candidates(), VoteState::Registration);
        let mut book = ParticipationBook::default();
        let alice = Address::example(20);
        book.register_candidate(&mut vote, &alice).unwrap();
        assert!(matches!(
            book.approve_candidate(&mut vote, &alice, &alice),
            Err(Revert::NotAuthorized(_))
        ));
    }

    #[test]
    fn candidates_without_approval_get_options_immediately() {
        let spec = VoteSpec {
            candidate_need_approval: false,
            ..VoteSpec::example_candidates()
        };
        let mut vote = advanced(spec, VoteState::Registration);
        let mut book = ParticipationBook::default();
        let bob = Address::example(21);
        assert_eq!(book.register_candidate(&mut vote, &bob), Ok(VoteRole::Candidate));
        assert_eq!(vote.options.len(), 1);
    }

    #[test]
    fn unapproved_candidates_stay_pending() {
        let mut vote = advanced(VoteSpec::example_candidates(), VoteState::Registration);
        let mut book = ParticipationBook::default();
        let admin = vote.admin;
        let carol = Address::example(22);
        book.register_candidate(&mut vote, &carol).unwrap();

        vote.next_state(&admin).unwrap();
        vote.next_state(&admin).unwrap();
        assert_eq!(
            book.record(&vote.address, &carol).role,
            VoteRole::PendingCandidate
        );
        assert!(matches!(
            book.approve_candidate(&mut vote, &admin, &carol),
            Err(Revert::WrongState { .. })
        ));
    }

    #[test]
    fn candidates_cannot_vote_in_open_votes() {
        let spec = VoteSpec {
            candidate_need_approval: false,
            ..VoteSpec::example_candidates()
        };
        let mut vote = advanced(spec, VoteState::Registration);
        let mut book = ParticipationBook::default();
        let admin = vote.admin;
        let dave = Address::example(23);
        book.register_candidate(&mut vote, &dave).unwrap();
        vote.next_state(&admin).unwrap();
        assert_eq!(book.cast_vote(&vote, &dave, 1), Err(Revert::NotEligible(dave)));
        assert_eq!(book.cast_vote(&vote, &admin, 1), Ok(()));
    }

    #[test]
    fn tally_counts_only_voters() {
        let mut vote = advanced(VoteSpec::example_candidates(), VoteState::Registration);
        let mut book = ParticipationBook::default();
        let admin = vote.admin;
        let alice = Address::example(20);
        let pending = Address::example(21);
        book.register_candidate(&mut vote, &alice).unwrap();
        book.register_candidate(&mut vote, &pending).unwrap();
        book.approve_candidate(&mut vote, &admin, &alice).unwrap();
        vote.next_state(&admin).unwrap();

        for n in 30..35 {
            book.cast_vote(&vote, &Address::example(n), 1).unwrap();
        }

        let tally = book.tally(&vote);
        assert_eq!(tally.counts.get(&1), Some(&5));
        assert_eq!(tally.total, 5);
        assert_eq!(tally.counts.values().sum::<u64>(), tally.total);
        assert_eq!(tally.percentage(1), 100);

        let voters_with_selection = book
            .records_for(&vote.address)
            .into_iter()
            .filter(|(_, r)| r.role == VoteRole::Voter && r.has_voted())
            .count() as u64;
        assert_eq!(voters_with_selection, tally.total);
    }

    #[test]
    fn empty_tally_lists_every_option() {
        let vote = advanced(VoteSpec::example(), VoteState::Voting);
        let tally = ParticipationBook::default().tally(&vote);
        assert_eq!(tally.counts, BTreeMap::from([(1, 0), (2, 0)]));
        assert_eq!(tally.percentage(1), 0);
    }

    #[test]
    fn votes_of_lists_involvement() {
        let mut vote = advanced(VoteSpec::example_candidates(), VoteState::Registration);
        let mut book = ParticipationBook::default();
        let alice = Address::example(20);
        assert!(book.votes_of(&alice).is_empty());
        book.register_candidate(&mut vote, &alice).unwrap();
        assert_eq!(book.votes_of(&alice), vec![vote.address]);
    }
}
