use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    outcome::Outcome,
    response::{self, Responder},
    serde::json::{json, Json},
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::Revert;
use crate::model::auth::AuthFailure;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Auth(#[from] AuthFailure),
    #[error("Ledger reverted: {0}")]
    Revert(#[from] Revert),
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("Off-chain index is inconsistent with the ledger: {0}")]
    Inconsistent(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify this error for callers that only care about the broad failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) | Self::Jwt(_) | Self::Internal(_) => ErrorKind::Internal,
            Self::Auth(_) => ErrorKind::AuthFailure,
            Self::Forbidden(_) => ErrorKind::NotAuthorized,
            Self::Revert(revert) => revert.kind(),
            Self::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
            Self::Inconsistent(_) => ErrorKind::Inconsistent,
            Self::BadRequest(_) => ErrorKind::BadRequest,
        }
    }
}

/// Why a guard rejected the request, kept for the error catcher.
#[derive(Debug, Clone, Default)]
pub struct Rejection(pub Option<(ErrorKind, String)>);

/// Fail a request or data guard with `error`, recording its reason on the request.
pub fn reject<S, F>(req: &Request<'_>, error: Error) -> Outcome<S, (Status, Error), F> {
    let kind = error.kind();
    warn!("Rejected request: {error}");
    req.local_cache(|| Rejection(Some((kind, error.to_string()))));
    Outcome::Failure((kind.status(), error))
}

/// Broad failure categories surfaced to API callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    AuthFailure,
    NotAuthorized,
    InvalidState,
    AlreadyDone,
    NotFound,
    LedgerUnavailable,
    Inconsistent,
    BadRequest,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> Status {
        match self {
            Self::AuthFailure => Status::Unauthorized,
            Self::NotAuthorized => Status::Forbidden,
            Self::InvalidState | Self::AlreadyDone => Status::Conflict,
            Self::NotFound => Status::NotFound,
            Self::LedgerUnavailable => Status::ServiceUnavailable,
            Self::BadRequest => Status::BadRequest,
            Self::Inconsistent | Self::Internal => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let kind = self.kind();
        let status = kind.status();
        if status.class().is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        let body = Json(json!({
            "kind": kind,
            "error": self.to_string(),
        }));
        response::Response::build_from(body.respond_to(req)?)
            .status(status)
            .ok()
    }
}
