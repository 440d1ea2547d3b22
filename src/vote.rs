//! Recording of individual votes.

use crate::error::{Error, Result};
use crate::model::{
    api::poll::VoteReceipt, common::tenant::Scope, db::poll::Poll, mongodb::Id,
};
use crate::store::{ResponseOutcome, Store};

/// Record `voter`'s choice on a poll.
///
/// The poll must be visible from `scope`, otherwise it is reported as missing.
/// The choice must be one of the poll's options and the poll must be open.
/// A voter gets exactly one response per poll: the store adds the entry only
/// if none exists, so of any number of concurrent attempts exactly one
/// succeeds and the rest fail with [`Error::AlreadyVoted`]. Nothing is written
/// on failure.
pub async fn record_vote(
    store: &dyn Store,
    poll_id: Id,
    voter: Id,
    scope: &Scope,
    choice: &str,
) -> Result<VoteReceipt> {
    let poll = visible_poll(store, poll_id, scope).await?;

    let choice = choice.trim();
    if choice.is_empty() {
        return Err(Error::validation("No option was chosen"));
    }
    if poll.has_voted(voter) {
        return Err(Error::AlreadyVoted {
            poll: poll_id,
            voter,
        });
    }
    if !poll.options.contains(choice) {
        return Err(Error::validation(format!(
            "{choice:?} is not an option of poll {poll_id}"
        )));
    }
    if !poll.active {
        return Err(poll_closed(poll_id));
    }

    match store.insert_response(poll_id, voter, choice).await? {
        ResponseOutcome::Recorded => {
            info!("Recorded vote by {voter} on poll {poll_id}");
            Ok(VoteReceipt::new(poll_id, choice.to_string()))
        }
        // Lost a race against another request from the same voter.
        ResponseOutcome::AlreadyResponded => Err(Error::AlreadyVoted {
            poll: poll_id,
            voter,
        }),
        // Closed after it was read above.
        ResponseOutcome::Closed => Err(poll_closed(poll_id)),
        ResponseOutcome::NoSuchPoll => Err(poll_not_found(poll_id)),
    }
}

/// Get a poll if it exists and is visible from `scope`.
///
/// Polls of other tenants are indistinguishable from missing ones.
pub async fn visible_poll(store: &dyn Store, poll_id: Id, scope: &Scope) -> Result<Poll> {
    store
        .poll(poll_id)
        .await?
        .filter(|poll| scope.permits(&poll.tenant_id))
        .ok_or_else(|| poll_not_found(poll_id))
}

fn poll_not_found(poll_id: Id) -> Error {
    Error::not_found(format!("Poll with ID '{poll_id}'"))
}

fn poll_closed(poll_id: Id) -> Error {
    Error::validation(format!("Poll {poll_id} is closed to voting"))
}
