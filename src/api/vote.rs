use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    api::JsonBody,
    error::{Error, Result},
    ledger::{Event, LedgerClient, Receipt, Transaction},
    model::{
        address::Address,
        auth::{
            rights::{Registered, Root, VoteCreator},
            AuthToken,
        },
        index::{Index, IndexStore, Scope, VoteRecord},
        pagination::{Paginated, Pagination},
        participation::ParticipationRecord,
        role::VoteRole,
        vote::{OptionContent, Vote, VoteSpec},
    },
    sync::rebuild_index,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_vote,
        list_votes,
        my_votes,
        get_vote,
        get_tally,
        next_state,
        register_candidate,
        approve_candidate,
        register_voter,
        cast_ballot,
        rebuild,
    ]
}

/// A vote as seen by a particular caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteView {
    #[serde(flatten)]
    pub vote: Vote,
    pub role: VoteRole,
    pub selection: u32,
    pub is_vote_admin: bool,
    pub has_registration_state: bool,
    pub can_register_candidate: bool,
    pub can_register_voter: bool,
    pub can_vote: bool,
}

impl VoteView {
    fn new(vote: Vote, caller: Option<(Address, ParticipationRecord)>) -> Self {
        let (is_vote_admin, record) = match caller {
            Some((address, record)) => (vote.is_admin(&address), record),
            None => (false, ParticipationRecord::default()),
        };
        // Anonymous callers can read, but never act.
        let signed_in = caller.is_some();
        Self {
            role: record.role,
            selection: record.selection,
            is_vote_admin,
            has_registration_state: vote.has_registration_state(),
            can_register_candidate: signed_in && vote.can_register_candidate(record.role),
            can_register_voter: signed_in && vote.can_register_voter(record.role),
            can_vote: signed_in && vote.can_vote(record.role, record.selection),
            vote,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptionTally {
    pub id: u32,
    #[serde(flatten)]
    pub content: OptionContent,
    pub count: u64,
    /// Whole-number share of all ballots cast.
    pub percentage: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TallyView {
    pub vote: Address,
    pub total: u64,
    pub options: Vec<OptionTally>,
}

#[derive(Debug, Deserialize)]
pub struct Ballot {
    pub option_id: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RebuildReport {
    pub added: usize,
}

#[post("/votes", data = "<spec>", format = "json")]
async fn create_vote(
    token: AuthToken<VoteCreator>,
    spec: JsonBody<VoteSpec>,
    ledger: &State<LedgerClient>,
    index: &State<Index>,
) -> Result<Json<Receipt>> {
    let receipt = ledger
        .send(
            token.address,
            Transaction::CreateVote {
                spec: spec.into_inner(),
            },
        )
        .await?;
    let Event::VoteCreated { vote } = receipt.event else {
        return Err(Error::Internal(format!(
            "vote creation confirmed with unexpected event {:?}",
            receipt.event
        )));
    };
    info!("{} created vote {vote}", token.address);

    // The ledger already holds the vote; a missing index record only delays listing it.
    let record = VoteRecord::from(&ledger.vote(&vote).await?);
    if let Err(e) = index.insert_vote(&record).await {
        error!("Vote {vote} is not indexed until the next rebuild: {e}");
    }
    Ok(Json(receipt))
}

#[get("/votes?<creator>")]
async fn list_votes(
    creator: Option<Address>,
    pagination: Pagination,
    ledger: &State<LedgerClient>,
    index: &State<Index>,
) -> Result<Json<Paginated<VoteRecord>>> {
    let scope = match creator {
        Some(creator) => Scope::ByCreator(creator),
        None => Scope::All,
    };
    Ok(Json(index.page_query(ledger, scope, pagination).await?))
}

/// Votes the caller takes part in.
#[get("/votes/mine")]
async fn my_votes(
    token: AuthToken,
    pagination: Pagination,
    ledger: &State<LedgerClient>,
    index: &State<Index>,
) -> Result<Json<Paginated<VoteRecord>>> {
    let scope = Scope::ByParticipant(token.address);
    Ok(Json(index.page_query(ledger, scope, pagination).await?))
}

#[get("/votes/<address>")]
async fn get_vote(
    address: Address,
    token: Option<AuthToken>,
    ledger: &State<LedgerClient>,
) -> Result<Json<VoteView>> {
    let vote = ledger.vote(&address).await?;
    let caller = match token {
        Some(token) => Some((
            token.address,
            ledger.participation(&address, &token.address).await?,
        )),
        None => None,
    };
    Ok(Json(VoteView::new(vote, caller)))
}

#[get("/votes/<address>/tally")]
async fn get_tally(address: Address, ledger: &State<LedgerClient>) -> Result<Json<TallyView>> {
    let vote = ledger.vote(&address).await?;
    let tally = ledger.tally(&address).await?;
    let options = vote
        .options
        .into_iter()
        .map(|option| OptionTally {
            count: tally.counts.get(&option.id).copied().unwrap_or(0),
            percentage: tally.percentage(option.id),
            id: option.id,
            content: option.content,
        })
        .collect();
    Ok(Json(TallyView {
        vote: address,
        total: tally.total,
        options,
    }))
}

/// Only the vote's own admin may advance it, whatever their current system role.
#[post("/votes/<address>/next-state")]
async fn next_state(
    token: AuthToken<Registered>,
    address: Address,
    ledger: &State<LedgerClient>,
) -> Result<Json<Receipt>> {
    let receipt = ledger
        .send(token.address, Transaction::NextState { vote: address })
        .await?;
    Ok(Json(receipt))
}

#[post("/votes/<address>/candidates")]
async fn register_candidate(
    token: AuthToken<Registered>,
    address: Address,
    ledger: &State<LedgerClient>,
) -> Result<Json<Receipt>> {
    let receipt = ledger
        .send(token.address, Transaction::RegisterCandidate { vote: address })
        .await?;
    Ok(Json(receipt))
}

#[post("/votes/<address>/candidates/<candidate>/approve")]
async fn approve_candidate(
    token: AuthToken<Registered>,
    address: Address,
    candidate: Address,
    ledger: &State<LedgerClient>,
) -> Result<Json<Receipt>> {
    let receipt = ledger
        .send(
            token.address,
            Transaction::ApproveCandidate {
                vote: address,
                candidate,
            },
        )
        .await?;
    Ok(Json(receipt))
}

#[post("/votes/<address>/voters")]
async fn register_voter(
    token: AuthToken<Registered>,
    address: Address,
    ledger: &State<LedgerClient>,
) -> Result<Json<Receipt>> {
    let receipt = ledger
        .send(token.address, Transaction::RegisterVoter { vote: address })
        .await?;
    Ok(Json(receipt))
}

#[post("/votes/<address>/ballot", data = "<ballot>", format = "json")]
async fn cast_ballot(
    token: AuthToken<Registered>,
    address: Address,
    ballot: JsonBody<Ballot>,
    ledger: &State<LedgerClient>,
) -> Result<Json<Receipt>> {
    let receipt = ledger
        .send(
            token.address,
            Transaction::CastVote {
                vote: address,
                option_id: ballot.option_id,
            },
        )
        .await?;
    Ok(Json(receipt))
}

#[post("/votes/index/rebuild")]
async fn rebuild(
    _token: AuthToken<Root>,
    ledger: &State<LedgerClient>,
    index: &State<Index>,
) -> Result<Json<RebuildReport>> {
    let added = rebuild_index(ledger, index).await?;
    Ok(Json(RebuildReport { added }))
}
