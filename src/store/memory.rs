use std::collections::BTreeMap;

use rocket::tokio::sync::Mutex;

use crate::error::Result;
use crate::model::{
    common::tenant::TenantId,
    db::{
        poll::{NewPoll, Poll, PollCore},
        user::{NewUser, User, UserCore},
    },
    mongodb::Id,
};

use super::{ResponseOutcome, Store, Upserted};

/// A store that lives only as long as the process.
///
/// Each collection sits behind its own lock, which is held for the whole of
/// any read-check-write sequence on that collection.
#[derive(Default)]
pub struct MemoryStore {
    polls: Mutex<BTreeMap<Id, PollCore>>,
    users: Mutex<BTreeMap<Id, UserCore>>,
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_poll(&self, poll: &NewPoll) -> Result<Option<Id>> {
        let mut polls = self.polls.lock().await;
        let exists = polls
            .values()
            .any(|p| p.tenant_id == poll.tenant_id && p.question == poll.question);
        if exists {
            return Ok(None);
        }
        let id = Id::new();
        polls.insert(id, poll.clone());
        Ok(Some(id))
    }

    async fn poll(&self, id: Id) -> Result<Option<Poll>> {
        let polls = self.polls.lock().await;
        Ok(polls.get(&id).map(|poll| Poll {
            id,
            poll: poll.clone(),
        }))
    }

    async fn polls(&self, tenant: Option<&TenantId>) -> Result<Vec<Poll>> {
        let polls = self.polls.lock().await;
        Ok(polls
            .iter()
            .filter(|(_, poll)| tenant.map_or(true, |t| &poll.tenant_id == t))
            .map(|(id, poll)| Poll {
                id: *id,
                poll: poll.clone(),
            })
            .collect())
    }

    async fn insert_response(
        &self,
        poll: Id,
        voter: Id,
        option: &str,
    ) -> Result<ResponseOutcome> {
        let mut polls = self.polls.lock().await;
        let poll = match polls.get_mut(&poll) {
            Some(poll) => poll,
            None => return Ok(ResponseOutcome::NoSuchPoll),
        };
        if poll.has_voted(voter) {
            return Ok(ResponseOutcome::AlreadyResponded);
        }
        if !poll.active {
            return Ok(ResponseOutcome::Closed);
        }
        poll.responses.insert(voter, option.to_string());
        Ok(ResponseOutcome::Recorded)
    }

    async fn set_active(&self, poll: Id, active: bool) -> Result<bool> {
        let mut polls = self.polls.lock().await;
        Ok(match polls.get_mut(&poll) {
            Some(poll) => {
                poll.active = active;
                true
            }
            None => false,
        })
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.get(&id).map(|user| User {
            id,
            user: user.clone(),
        }))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|(_, user)| user.username == username)
            .map(|(id, user)| User {
                id: *id,
                user: user.clone(),
            }))
    }

    async fn users(&self, tenant: Option<&TenantId>) -> Result<Vec<User>> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .filter(|(_, user)| tenant.map_or(true, |t| user.tenant_id.as_ref() == Some(t)))
            .map(|(id, user)| User {
                id: *id,
                user: user.clone(),
            })
            .collect())
    }

    async fn upsert_user(&self, user: &NewUser) -> Result<Upserted> {
        let mut users = self.users.lock().await;
        let existing = users
            .iter_mut()
            .find(|(_, existing)| existing.username == user.username);
        if let Some((id, existing)) = existing {
            existing.password_hash = user.password_hash.clone();
            existing.role = user.role;
            existing.tenant_id = user.tenant_id.clone();
            return Ok(Upserted::Updated(*id));
        }
        let id = Id::new();
        users.insert(id, user.clone());
        Ok(Upserted::Inserted(id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::tokio;

    use crate::model::common::role::Role;

    use super::*;

    #[rocket::async_test]
    async fn response_is_written_once() {
        let store = MemoryStore::default();
        let poll = store
            .insert_poll(&NewPoll::colour_example())
            .await
            .unwrap()
            .unwrap();
        let voter = Id::new();

        let first = store.insert_response(poll, voter, "Red").await.unwrap();
        let second = store.insert_response(poll, voter, "Blue").await.unwrap();
        assert_eq!(first, ResponseOutcome::Recorded);
        assert_eq!(second, ResponseOutcome::AlreadyResponded);

        let stored = store.poll(poll).await.unwrap().unwrap();
        assert_eq!(stored.responses.len(), 1);
        assert_eq!(stored.responses[&voter], "Red");

        let missing = store.insert_response(Id::new(), voter, "Red").await.unwrap();
        assert_eq!(missing, ResponseOutcome::NoSuchPoll);
    }

    #[rocket::async_test]
    async fn closed_poll_takes_no_responses() {
        let store = MemoryStore::default();
        let poll = store
            .insert_poll(&NewPoll::colour_example())
            .await
            .unwrap()
            .unwrap();
        let voter = Id::new();
        store.set_active(poll, false).await.unwrap();

        let outcome = store.insert_response(poll, voter, "Red").await.unwrap();
        assert_eq!(outcome, ResponseOutcome::Closed);
        assert!(store.poll(poll).await.unwrap().unwrap().responses.is_empty());

        // An existing response is still reported as such.
        store.set_active(poll, true).await.unwrap();
        store.insert_response(poll, voter, "Red").await.unwrap();
        store.set_active(poll, false).await.unwrap();
        let outcome = store.insert_response(poll, voter, "Blue").await.unwrap();
        assert_eq!(outcome, ResponseOutcome::AlreadyResponded);
    }

    #[rocket::async_test]
    async fn concurrent_responses_have_one_winner() {
        let store = Arc::new(MemoryStore::default());
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
        let mut recorded = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() == ResponseOutcome::Recorded {
                recorded += 1;
            }
        }

        assert_eq!(recorded, 1);
        let stored = store.poll(poll).await.unwrap().unwrap();
        assert_eq!(stored.responses.len(), 1);
    }

    #[rocket::async_test]
    async fn polls_are_listed_in_creation_order() {
        let store = MemoryStore::default();
        let colour = store
            .insert_poll(&NewPoll::colour_example())
            .await
            .unwrap()
            .unwrap();
        let lunch = store
            .insert_poll(&NewPoll::lunch_example())
            .await
            .unwrap()
            .unwrap();

        let ids = store
            .polls(None)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![colour, lunch]);
    }

    #[rocket::async_test]
    async fn upsert_updates_existing_username() {
        let store = MemoryStore::default();
        let mut user = NewUser::voter_example();
        let id = match store.upsert_user(&user).await.unwrap() {
            Upserted::Inserted(id) => id,
            Upserted::Updated(_) => panic!("user should be new"),
        };

        user.role = Role::LocalAdmin;
        user.tenant_id = Some("inst2".into());
        assert_eq!(
            store.upsert_user(&user).await.unwrap(),
            Upserted::Updated(id)
        );

        let stored = store.user(id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::LocalAdmin);
        assert_eq!(stored.tenant_id, Some("inst2".into()));
        assert_eq!(store.users(None).await.unwrap().len(), 1);
    }
}
