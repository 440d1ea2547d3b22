use mongodb::{
    bson::{doc, to_bson, Document},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    common::tenant::TenantId,
    db::{
        poll::{NewPoll, Poll},
        user::{NewUser, User},
    },
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll, Id},
};

use super::{ResponseOutcome, Store, Upserted};

/// A store backed by a MongoDB database.
///
/// Uniqueness of `(tenant_id, question)` and of `username` is enforced by
/// indexes; a vote is a single conditional update of one poll document.
pub struct MongoStore {
    polls: Coll<Poll>,
    new_polls: Coll<NewPoll>,
    users: Coll<User>,
}

impl MongoStore {
    /// Prepare the database (indexes) and wrap it.
    pub async fn connect(db: &Database) -> std::result::Result<Self, DbError> {
        ensure_indexes_exist(db).await?;
        Ok(Self {
            polls: Coll::from_db(db),
            new_polls: Coll::from_db(db),
            users: Coll::from_db(db),
        })
    }
}

/// Filter matching everything owned by `tenant`, or everything at all.
fn tenant_filter(tenant: Option<&TenantId>) -> Document {
    match tenant {
        Some(tenant) => doc! { "tenant_id": tenant },
        None => Document::new(),
    }
}

/// Filter matching the poll only while it is open and `voter` has no entry,
/// so the checks and the write happen atomically within one document update.
fn response_filter(poll: Id, voter: Id) -> Document {
    let mut filter = poll.as_doc();
    filter.insert("active", true);
    filter.insert(response_key(voter), doc! { "$exists": false });
    filter
}

fn response_update(voter: Id, option: &str) -> Document {
    let mut entry = Document::new();
    entry.insert(response_key(voter), option);
    doc! { "$set": entry }
}

fn response_key(voter: Id) -> String {
    format!("responses.{voter}")
}

fn by_id() -> FindOptions {
    FindOptions::builder().sort(doc! { "_id": 1 }).build()
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_poll(&self, poll: &NewPoll) -> Result<Option<Id>> {
        match self.new_polls.insert_one(poll, None).await {
            Ok(result) => {
                let id = result
                    .inserted_id
                    .as_object_id()
                    .ok_or_else(|| Error::Persistence("Inserted poll has no ObjectId".into()))?;
                Ok(Some(id.into()))
            }
            Err(err) if is_duplicate_key_error(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn poll(&self, id: Id) -> Result<Option<Poll>> {
        Ok(self.polls.find_one(id.as_doc(), None).await?)
    }

    async fn polls(&self, tenant: Option<&TenantId>) -> Result<Vec<Poll>> {
        let polls = self
            .polls
            .find(tenant_filter(tenant), by_id())
            .await?
            .try_collect()
            .await?;
        Ok(polls)
    }

    async fn insert_response(
        &self,
        poll: Id,
        voter: Id,
        option: &str,
    ) -> Result<ResponseOutcome> {
        let filter = response_filter(poll, voter);
        let update = response_update(voter, option);
        let result = self.polls.update_one(filter, update, None).await?;
        if result.matched_count == 1 {
            return Ok(ResponseOutcome::Recorded);
        }

        // Nothing matched: work out why.
        let existing = self.polls.find_one(poll.as_doc(), None).await?;
        match existing {
            None => Ok(ResponseOutcome::NoSuchPoll),
            Some(existing) if existing.has_voted(voter) => Ok(ResponseOutcome::AlreadyResponded),
            Some(existing) if !existing.active => Ok(ResponseOutcome::Closed),
            Some(_) => Err(Error::Persistence(format!(
                "Response of {voter} to poll {poll} was neither recorded nor present"
            ))),
        }
    }

    async fn set_active(&self, poll: Id, active: bool) -> Result<bool> {
        let update = doc! { "$set": { "active": active } };
        let result = self.polls.update_one(poll.as_doc(), update, None).await?;
        Ok(result.matched_count == 1)
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.users.find_one(id.as_doc(), None).await?)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let filter = doc! { "username": username };
        Ok(self.users.find_one(filter, None).await?)
    }

    async fn users(&self, tenant: Option<&TenantId>) -> Result<Vec<User>> {
        let users = self
            .users
            .find(tenant_filter(tenant), by_id())
            .await?
            .try_collect()
            .await?;
        Ok(users)
    }

    async fn upsert_user(&self, user: &NewUser) -> Result<Upserted> {
        let filter = doc! { "username": &user.username };
        let tenant = to_bson(&user.tenant_id)
            .map_err(|err| Error::Persistence(format!("Unserialisable tenant: {err}")))?;
        let update = doc! {
            "$set": {
                "password_hash": &user.password_hash,
                "role": user.role,
                "tenant_id": tenant,
            },
            "$setOnInsert": {
                "username": &user.username,
                "name": &user.name,
            },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::Before)
            .build();
        let before = self
            .users
            .find_one_and_update(filter.clone(), update, options)
            .await?;
        if let Some(before) = before {
            return Ok(Upserted::Updated(before.id));
        }

        let inserted = self
            .users
            .find_one(filter, None)
            .await?
            .ok_or_else(|| Error::Persistence(format!("Upserted user {} vanished", user.username)))?;
        Ok(Upserted::Inserted(inserted.id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mongodb::Client;
    use rocket::tokio;

    use super::*;

    #[test]
    fn tenant_filters() {
        let tenant = TenantId::from("inst1");
        assert_eq!(tenant_filter(Some(&tenant)), doc! { "tenant_id": "inst1" });
        assert!(tenant_filter(None).is_empty());
    }

    #[test]
    fn response_filter_requires_open_poll_without_entry() {
        let poll = Id::new();
        let voter = Id::new();
        let key = format!("responses.{}", voter.to_hex());

        let mut expected = doc! { "_id": *poll, "active": true };
        expected.insert(key, doc! { "$exists": false });
        assert_eq!(response_filter(poll, voter), expected);
    }

    #[test]
    fn response_update_sets_one_entry() {
        let voter = Id::new();
        let key = format!("responses.{}", voter.to_hex());

        let mut entry = Document::new();
        entry.insert(key, "Red");
        assert_eq!(response_update(voter, "Red"), doc! { "$set": entry });
    }

    /// A store over a fresh database on the server named by `ROCKET_DB_URI`,
    /// or `None` if that is not set.
    async fn live_store() -> Option<(MongoStore, Database)> {
        let uri = std::env::var("ROCKET_DB_URI").ok()?;
        let client = Client::with_uri_str(uri).await.unwrap();
        let db = client.database(&format!("instapoll_test_{}", rand::random::<u32>()));
        let store = MongoStore::connect(&db).await.unwrap();
        Some((store, db))
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB server at ROCKET_DB_URI"]
    async fn live_duplicate_poll_is_skipped() {
        let Some((store, db)) = live_store().await else {
            return;
        };

        let first = store.insert_poll(&NewPoll::colour_example()).await.unwrap();
        let second = store.insert_poll(&NewPoll::colour_example()).await.unwrap();
        assert!(first.is_some());
        assert_eq!(second, None);
        assert_eq!(store.polls(None).await.unwrap().len(), 1);

        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB server at ROCKET_DB_URI"]
    async fn live_responses() {
        let Some((store, db)) = live_store().await else {
            return;
        };
        let store = Arc::new(store);
        let poll = store
            .insert_poll(&NewPoll::colour_example())
            .await
            .unwrap()
            .unwrap();
        let voter = Id::new();

        let tasks = (0..16)
            .map(|i| {
                let store = store.clone();
                let option = if i % 2 == 0 { "Red" } else { "Blue" };
                tokio::spawn(async move { store.insert_response(poll, voter, option).await })
            })
            .collect::<Vec<_>>();
        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap().unwrap());
        }
        let recorded = outcomes
            .iter()
            .filter(|outcome| **outcome == ResponseOutcome::Recorded)
            .count();
        assert_eq!(recorded, 1);
        assert!(outcomes.iter().all(|outcome| matches!(
            outcome,
            ResponseOutcome::Recorded | ResponseOutcome::AlreadyResponded
        )));
        assert_eq!(store.poll(poll).await.unwrap().unwrap().responses.len(), 1);

        // Closed polls take no new responses.
        assert!(store.set_active(poll, false).await.unwrap());
        let outcome = store.insert_response(poll, Id::new(), "Red").await.unwrap();
        assert_eq!(outcome, ResponseOutcome::Closed);

        let outcome = store.insert_response(Id::new(), voter, "Red").await.unwrap();
        assert_eq!(outcome, ResponseOutcome::NoSuchPoll);

        db.drop(None).await.unwrap();
    }
}
