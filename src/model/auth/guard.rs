use std::marker::PhantomData;

use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::config::Config;
use crate::error::{reject, Error};
use crate::ledger::LedgerClient;
use crate::model::{address::Address, role::SystemRole};

use super::{resolve_session, AuthFailure, AUTH_TOKEN_COOKIE};

/// A privilege level a route can demand of its caller's system role.
pub trait Rights: Send + Sync + 'static {
    const NAME: &'static str;

    fn permits(role: SystemRole) -> bool;
}

pub mod rights {
    use super::Rights;
    use crate::model::role::{can_create_vote, can_manage_roles, is_registered, SystemRole};

    /// Any wallet that proved ownership of its address.
    pub struct Verified;

    /// A wallet with a registered account.
    pub struct Registered;

    /// A wallet allowed to deploy votes.
    pub struct VoteCreator;

    pub struct Root;

    impl Rights for Verified {
        const NAME: &'static str = "verified";

        fn permits(_: SystemRole) -> bool {
            true
        }
    }

    impl Rights for Registered {
        const NAME: &'static str = "user";

        fn permits(role: SystemRole) -> bool {
            is_registered(role)
        }
    }

    impl Rights for VoteCreator {
        const NAME: &'static str = "admin";

        fn permits(role: SystemRole) -> bool {
            can_create_vote(role)
        }
    }

    impl Rights for Root {
        const NAME: &'static str = "root";

        fn permits(role: SystemRole) -> bool {
            can_manage_roles(role)
        }
    }
}

/// An authenticated caller whose current ledger role satisfies `R`.
pub struct AuthToken<R = rights::Verified> {
    pub address: Address,
    /// The caller's system role at the time of the request.
    pub role: SystemRole,
    phantom: PhantomData<R>,
}

/// Get the credential from the `Authorization: Bearer` header, falling back to the cookie.
fn credential(req: &Request<'_>) -> Option<String> {
    let bearer = req
        .headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    bearer.or_else(|| {
        req.cookies()
            .get(AUTH_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
    })
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Rights,
{
    type Error = Error;

    /// Resolve the session credential and check the caller's role on the ledger.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let rocket = req.rocket();
        let (Some(config), Some(ledger)) = (rocket.state::<Config>(), rocket.state::<LedgerClient>())
        else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Internal("authentication state is not managed".to_string()),
            ));
        };

        let Some(token) = credential(req) else {
            return reject(req, AuthFailure::MissingCredential.into());
        };
        let address = match resolve_session(&token, config) {
            Ok(address) => address,
            Err(failure) => return reject(req, failure.into()),
        };
        let role = match ledger.role_of(&address).await {
            Ok(role) => role,
            Err(e) => return reject(req, e),
        };
        if !R::permits(role) {
            return reject(
                req,
                Error::Forbidden(format!(
                    "{address} holds role {role}, {} required",
                    R::NAME
                )),
            );
        }

        Outcome::Success(Self {
            address,
            role,
            phantom: PhantomData,
        })
    }
}
