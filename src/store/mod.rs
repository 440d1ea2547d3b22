//! Durable storage of polls and users.
//!
//! Every read goes to the backing store; nothing is cached between calls, so
//! each operation observes the current state of the response maps.

use std::ops::Deref;
use std::sync::Arc;

use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::poll::PollSpec,
    common::tenant::{Scope, TenantId},
    db::{
        poll::{NewPoll, Poll},
        user::{NewUser, User},
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Result of atomically adding a single entry to a poll's response map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The entry was added.
    Recorded,
    /// The voter already had an entry; nothing changed.
    AlreadyResponded,
    /// The poll is closed to voting; nothing changed.
    Closed,
    /// There is no poll with the given ID.
    NoSuchPoll,
}

/// Result of inserting or updating a user by username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted(Id),
    Updated(Id),
}

/// A backend able to durably store polls and users.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Insert a poll unless one with the same question already exists for the
    /// same tenant. Returns the new ID, or `None` if it was already present.
    async fn insert_poll(&self, poll: &NewPoll) -> Result<Option<Id>>;

    /// Get a single poll.
    async fn poll(&self, id: Id) -> Result<Option<Poll>>;

    /// List the polls of one tenant, or of all tenants, ordered by ID.
    async fn polls(&self, tenant: Option<&TenantId>) -> Result<Vec<Poll>>;

    /// Add `voter -> option` to the poll's response map iff the poll is active
    /// and the voter has no entry yet. The checks and the write form one
    /// atomic unit.
    async fn insert_response(&self, poll: Id, voter: Id, option: &str)
        -> Result<ResponseOutcome>;

    /// Set whether a poll accepts votes. Returns false if there is no such poll.
    async fn set_active(&self, poll: Id, active: bool) -> Result<bool>;

    /// Get a single user.
    async fn user(&self, id: Id) -> Result<Option<User>>;

    /// Find a user by their unique username.
    async fn user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// List the users of one tenant, or all users, ordered by ID.
    async fn users(&self, tenant: Option<&TenantId>) -> Result<Vec<User>>;

    /// Insert a new user, or update the credentials, role and tenant of the
    /// existing user with the same username.
    async fn upsert_user(&self, user: &NewUser) -> Result<Upserted>;
}

/// Handle on the store managed by Rocket. Usable as a request guard.
#[derive(Clone)]
pub struct Storage(Arc<dyn Store>);

impl Storage {
    pub fn new(store: impl Store + 'static) -> Self {
        Self(Arc::new(store))
    }
}

impl Deref for Storage {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Storage {
    type Error = ();

    /// Get the store from the managed state.
    ///
    /// Panics iff the [`Storage`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let storage = req.guard::<&State<Storage>>().await.unwrap();
        request::Outcome::Success(storage.inner().clone())
    }
}

/// Validate and create a poll.
///
/// Returns `None` without creating anything if a poll with the same question
/// already exists for the same tenant.
pub async fn create_poll(store: &dyn Store, spec: PollSpec) -> Result<Option<Id>> {
    let poll: NewPoll = spec.try_into()?;
    let id = store.insert_poll(&poll).await?;
    match id {
        Some(id) => info!(
            "Created poll {id} for tenant '{}': {:?}",
            poll.tenant_id, poll.question
        ),
        None => debug!(
            "Poll {:?} already present for tenant '{}'",
            poll.question, poll.tenant_id
        ),
    }
    Ok(id)
}

/// Get a poll, failing if it does not exist.
pub async fn get_poll(store: &dyn Store, id: Id) -> Result<Poll> {
    store
        .poll(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Poll with ID '{id}'")))
}

/// List the polls visible from `scope`, ordered by ID.
pub async fn list_polls(store: &dyn Store, scope: &Scope) -> Result<Vec<Poll>> {
    let polls = store.polls(scope.tenant()).await?;
    // The store already narrowed by tenant; this drops everything for a
    // tenantless scope.
    Ok(scope.filter(polls))
}

/// The option labels of a poll, in order.
pub fn get_options(poll: &Poll) -> Vec<String> {
    poll.options().to_vec()
}
