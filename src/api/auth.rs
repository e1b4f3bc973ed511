use chrono::{DateTime, Utc};
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::JsonBody,
    error::{Error, Result},
    ledger::{LedgerClient, Transaction},
    model::{
        account::Account,
        address::Address,
        auth::{
            issue_session, rights::Registered, session_cookie, AuthToken, ChallengeStore,
            AUTH_TOKEN_COOKIE,
        },
        role::is_admin_capable,
    },
    sync::AdminRosterSynchronizer,
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![challenge, verify, state, register, update, info, logout]
}

#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    pub wallet_address: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// The exact message to sign.
    pub challenge: String,
    pub expire_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub wallet_address: Address,
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    Unverified,
    Verified,
    Registered,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub state: UserState,
    pub wallet_address: Option<Address>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    pub addresses: Vec<Address>,
}

#[post("/auth/challenge", data = "<request>", format = "json")]
pub async fn challenge(
    request: JsonBody<ChallengeRequest>,
    challenges: &State<ChallengeStore>,
) -> Json<ChallengeResponse> {
    let pending = challenges.issue(request.wallet_address);
    debug!("Issued challenge to {}", request.wallet_address);
    Json(ChallengeResponse {
        challenge: pending.nonce,
        expire_at: pending.expire_at,
    })
}

#[post("/auth/verify", data = "<request>", format = "json")]
pub async fn verify(
    request: JsonBody<VerifyRequest>,
    challenges: &State<ChallengeStore>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
) -> Result<Json<SessionResponse>> {
    challenges.verify(&request.wallet_address, &request.signature)?;

    let token = issue_session(request.wallet_address, config)?;
    cookies.add(session_cookie(token.clone(), config));
    info!("{} signed in", request.wallet_address);
    Ok(Json(SessionResponse { token }))
}

#[get("/auth/state")]
async fn state(token: Option<AuthToken>, ledger: &State<LedgerClient>) -> Result<Json<StateResponse>> {
    let Some(token) = token else {
        return Ok(Json(StateResponse {
            state: UserState::Unverified,
            wallet_address: None,
        }));
    };
    let registered = ledger
        .account(&token.address)
        .await?
        .map_or(false, |account| account.email.is_some());
    Ok(Json(StateResponse {
        state: if registered {
            UserState::Registered
        } else {
            UserState::Verified
        },
        wallet_address: Some(token.address),
    }))
}

#[post("/auth/register", data = "<request>", format = "json")]
async fn register(
    token: AuthToken,
    request: JsonBody<RegisterRequest>,
    ledger: &State<LedgerClient>,
    synchronizer: &State<AdminRosterSynchronizer>,
) -> Result<Json<Account>> {
    let RegisterRequest { email, nickname } = request.into_inner();
    ledger
        .send(token.address, Transaction::RegisterAccount { email, nickname })
        .await?;

    let account = fetch_account(ledger, &token.address).await?;
    // An admin granted before registering now has a profile for the roster.
    if is_admin_capable(account.role) {
        synchronizer.sync_after_write().await;
    }
    Ok(Json(account))
}

#[post("/auth/update", data = "<request>", format = "json")]
async fn update(
    token: AuthToken<Registered>,
    request: JsonBody<UpdateRequest>,
    ledger: &State<LedgerClient>,
    synchronizer: &State<AdminRosterSynchronizer>,
) -> Result<Json<Account>> {
    ledger
        .send(
            token.address,
            Transaction::UpdateNickname {
                nickname: request.into_inner().nickname,
            },
        )
        .await?;

    let account = fetch_account(ledger, &token.address).await?;
    if is_admin_capable(account.role) {
        synchronizer.sync_after_write().await;
    }
    Ok(Json(account))
}

/// Look up several accounts at once. Unknown addresses are left out.
#[post("/auth/info", data = "<request>", format = "json")]
async fn info(
    _token: AuthToken,
    request: JsonBody<InfoRequest>,
    ledger: &State<LedgerClient>,
) -> Result<Json<Vec<Account>>> {
    let mut accounts = Vec::with_capacity(request.addresses.len());
    for address in &request.addresses {
        if let Some(account) = ledger.account(address).await? {
            accounts.push(account);
        }
    }
    Ok(Json(accounts))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

async fn fetch_account(ledger: &LedgerClient, address: &Address) -> Result<Account> {
    ledger.account(address).await?.ok_or_else(|| {
        Error::Internal(format!("account {address} missing after confirmed transaction"))
    })
}
