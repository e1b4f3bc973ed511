use std::ops::Deref;

use rocket::{
    data::{self, Data, FromData},
    http::Status,
    outcome::Outcome,
    serde::json::{json, Json, Value},
    Catcher, Request, Route,
};
use serde::Deserialize;

use crate::error::{reject, Error, ErrorKind, Rejection};

pub mod admin;
pub mod auth;
pub mod vote;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(vote::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// A JSON request body. Unlike [`Json`], a body that fails to parse is
/// rejected with the parser's reason.
#[derive(Debug)]
pub struct JsonBody<T>(T);

impl<T> JsonBody<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for JsonBody<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T: Deserialize<'r>> FromData<'r> for JsonBody<T> {
    type Error = Error;

    async fn from_data(req: &'r Request<'_>, data: Data<'r>) -> data::Outcome<'r, Self> {
        match <Json<T> as FromData<'r>>::from_data(req, data).await {
            Outcome::Success(json) => Outcome::Success(Self(json.into_inner())),
            Outcome::Forward(data) => Outcome::Forward(data),
            Outcome::Failure((_, e)) => {
                reject(req, Error::BadRequest(format!("malformed request body: {e}")))
            }
        }
    }
}

/// Render guard failures in the same shape as route errors,
/// carrying the specific rejection reason where one was recorded.
#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> Json<Value> {
    let Rejection(rejection) = req.local_cache(Rejection::default);
    let (kind, reason) = match rejection {
        Some((kind, reason)) if kind.status() == status => (*kind, reason.clone()),
        _ if status == Status::NotFound => (
            ErrorKind::NotFound,
            format!("no route matches {} {}", req.method(), req.uri()),
        ),
        _ => (
            match status.code {
                400 | 422 => ErrorKind::BadRequest,
                401 => ErrorKind::AuthFailure,
                403 => ErrorKind::NotAuthorized,
                503 => ErrorKind::LedgerUnavailable,
                _ => ErrorKind::Internal,
            },
            status.reason_lossy().to_string(),
        ),
    };
    Json(json!({ "kind": kind, "error": reason }))
}
