use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::ErrorKind as JwtErrorKind, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::{
    http::{Cookie, SameSite},
    time::Duration,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::address::Address;

use super::AuthFailure;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Session claims: the wallet, the rotation tag it was issued under, and an expiry.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "sub")]
    address: Address,
    key: String,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Issue a signed session credential for a verified `address`.
pub fn issue_session(address: Address, config: &Config) -> Result<String> {
    issue_until(address, config, Utc::now() + config.auth_ttl())
}

fn issue_until(address: Address, config: &Config, expire_at: DateTime<Utc>) -> Result<String> {
    let claims = Claims {
        address,
        key: config.jwt_key().to_string(),
        expire_at,
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret()),
    )?;
    Ok(token)
}

/// Resolve a session credential to the address it was issued for.
pub fn resolve_session(token: &str, config: &Config) -> std::result::Result<Address, AuthFailure> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    let claims = jsonwebtoken::decode(
        token,
        &DecodingKey::from_secret(config.jwt_secret()),
        &validation,
    )
    .map(|data: TokenData<Claims>| data.claims)
    .map_err(|e| match e.kind() {
        JwtErrorKind::ExpiredSignature => AuthFailure::SessionExpired,
        _ => AuthFailure::Malformed,
    })?;

    if claims.key != config.jwt_key() {
        return Err(AuthFailure::Revoked);
    }
    Ok(claims.address)
}

/// Wrap a credential in the session cookie.
pub fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(AUTH_TOKEN_COOKIE, token)
        .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
}
