use std::fmt::Display;

use mongodb::bson::Bson;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// States in the vote lifecycle. A vote only ever moves forward through these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum VoteState {
    /// Just created, configuration fixed, nothing else permitted yet.
    Init = 0,
    /// Candidates and/or voters sign up. Skipped when the vote needs neither.
    Registration = 1,
    /// Open for ballots.
    Voting = 2,
    /// Terminal: only reads and tallies.
    Ended = 3,
}

/// How a vote's options are populated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum OptionType {
    /// Options are candidates approved during registration.
    CandidateRegistration = 0,
    /// Options are fixed text supplied at creation.
    PredefinedText = 1,
}

impl Display for VoteState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Init => "Init",
                Self::Registration => "Registration",
                Self::Voting => "Voting",
                Self::Ended => "Ended",
            }
        )
    }
}

impl Display for OptionType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::CandidateRegistration => "CandidateRegistration",
                Self::PredefinedText => "PredefinedText",
            }
        )
    }
}

impl From<VoteState> for Bson {
    fn from(state: VoteState) -> Self {
        Bson::Int32(state as i32)
    }
}
