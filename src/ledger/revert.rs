use thiserror::Error;

use crate::error::ErrorKind;
use crate::model::{address::Address, vote::VoteState};

/// Reasons the ledger rejects a transaction. A rejected transaction changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Revert {
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("vote is in state {actual}, expected {expected}")]
    WrongState { expected: VoteState, actual: VoteState },
    #[error("vote has already ended")]
    TerminalState,
    #[error("vote does not accept candidates")]
    WrongOptionType,
    #[error("vote does not use voter registration")]
    RegistrationDisabled,
    #[error("{0} is already registered")]
    AlreadyRegistered(Address),
    #[error("{0} has already voted")]
    AlreadyVoted(Address),
    #[error("{0} is not a pending candidate")]
    NotPending(Address),
    #[error("{0} is not eligible to vote")]
    NotEligible(Address),
    #[error("option {0} does not exist")]
    InvalidOption(u32),
    #[error("vote {0} does not exist")]
    VoteNotFound(Address),
    #[error("account {0} does not exist")]
    AccountNotFound(Address),
    #[error("email {0} is already in use")]
    EmailTaken(String),
    #[error("invalid request: {0}")]
    InvalidSpec(String),
}

impl Revert {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthorized(_) | Self::InvalidRole(_) | Self::NotEligible(_) => {
                ErrorKind::NotAuthorized
            }
            Self::WrongState { .. }
            | Self::TerminalState
            | Self::WrongOptionType
            | Self::RegistrationDisabled => ErrorKind::InvalidState,
            Self::AlreadyRegistered(_)
            | Self::AlreadyVoted(_)
            | Self::NotPending(_)
            | Self::EmailTaken(_) => ErrorKind::AlreadyDone,
            Self::InvalidOption(_) | Self::VoteNotFound(_) | Self::AccountNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidSpec(_) => ErrorKind::BadRequest,
        }
    }
}
