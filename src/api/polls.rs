use rocket::{serde::json::Json, Route};

use crate::{
    api::NoStore,
    error::Result,
    logging::RequestId,
    model::{
        api::{
            auth::{Anyone, AuthToken, Voter},
            poll::{PollDescription, VoteReceipt, VoteRequest},
            results::PollResult,
        },
        mongodb::Id,
    },
    results::aggregate,
    store::{list_polls, Storage},
    vote::{record_vote, visible_poll},
};

pub fn routes() -> Vec<Route> {
    routes![get_polls, get_poll, vote, get_results, get_poll_results]
}

#[get("/polls")]
async fn get_polls(
    token: AuthToken<Anyone>,
    store: Storage,
) -> Result<Json<Vec<PollDescription>>> {
    let polls = list_polls(&*store, &token.scope()).await?;
    Ok(Json(
        polls
            .into_iter()
            .map(|poll| PollDescription::for_viewer(poll, token.id()))
            .collect(),
    ))
}

#[get("/polls/<poll_id>")]
async fn get_poll(
    token: AuthToken<Anyone>,
    poll_id: Id,
    store: Storage,
) -> Result<Json<PollDescription>> {
    let poll = visible_poll(&*store, poll_id, &token.scope()).await?;
    Ok(Json(PollDescription::for_viewer(poll, token.id())))
}

#[post("/polls/<poll_id>/vote", data = "<vote>", format = "json")]
async fn vote(
    token: AuthToken<Voter>,
    poll_id: Id,
    vote: Json<VoteRequest>,
    store: Storage,
    request_id: &RequestId,
) -> Result<Json<VoteReceipt>> {
    debug!("{request_id}: user {} votes on poll {poll_id}", token.id());
    let receipt = record_vote(
        &*store,
        poll_id,
        token.id(),
        &token.scope(),
        &vote.option,
    )
    .await?;
    Ok(Json(receipt))
}

#[get("/results")]
async fn get_results(
    token: AuthToken<Anyone>,
    store: Storage,
) -> Result<NoStore<Json<Vec<PollResult>>>> {
    let polls = list_polls(&*store, &token.scope()).await?;
    Ok(NoStore(Json(polls.iter().map(aggregate).collect())))
}

#[get("/polls/<poll_id>/results")]
async fn get_poll_results(
    token: AuthToken<Anyone>,
    poll_id: Id,
    store: Storage,
) -> Result<NoStore<Json<PollResult>>> {
    let poll = visible_poll(&*store, poll_id, &token.scope()).await?;
    Ok(NoStore(Json(aggregate(&poll))))
}
