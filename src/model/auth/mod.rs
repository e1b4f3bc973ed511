//! Wallet authentication: challenge-response signature verification and session credentials.

use thiserror::Error;

mod challenge;
mod guard;
mod signature;
mod token;

pub use challenge::{ChallengeStore, PendingChallenge};
pub use guard::{rights, AuthToken, Rights};
pub use signature::{personal_message_hash, recover_personal_signer, SIGNATURE_LENGTH};
pub use token::{issue_session, resolve_session, session_cookie, AUTH_TOKEN_COOKIE};

#[cfg(test)]
pub use signature::examples;

/// Reasons a caller could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("signature was not produced by the claimed address")]
    InvalidSignature,
    #[error("challenge has expired")]
    ChallengeExpired,
    #[error("no outstanding challenge for this address")]
    ChallengeNotFound,
    #[error("signature is not well formed: {0}")]
    MalformedSignature(String),
    #[error("session has expired")]
    SessionExpired,
    #[error("session credential is malformed")]
    Malformed,
    #[error("session credential has been revoked")]
    Revoked,
    #[error("no session credential supplied")]
    MissingCredential,
}
