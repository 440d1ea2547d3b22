use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        options::PollOptions,
        tenant::{TenantId, Tenanted},
    },
    mongodb::{serde_string_map, Id},
};

/// Maps each voter's user ID to the option label they chose.
pub type ResponseMap = HashMap<Id, String>;

/// Core poll data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCore {
    /// The question being asked.
    pub question: String,
    /// The institute owning this poll.
    pub tenant_id: TenantId,
    /// Display name of the owning institute.
    pub institute: String,
    /// Possible answers, in display order.
    pub options: PollOptions,
    /// At most one entry per voter. Entries are only ever added.
    #[serde(with = "serde_string_map", default)]
    pub responses: ResponseMap,
    /// Whether the poll currently accepts votes.
    pub active: bool,
}

impl PollCore {
    /// Create a new, active poll with no responses.
    /// The institute display name defaults to one derived from the tenant ID.
    pub fn new(
        question: String,
        tenant_id: TenantId,
        institute: Option<String>,
        options: PollOptions,
    ) -> Self {
        let institute = institute
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Institute {tenant_id}"));
        Self {
            question,
            tenant_id,
            institute,
            options,
            responses: ResponseMap::new(),
            active: true,
        }
    }

    /// The option labels of this poll, in order.
    pub fn options(&self) -> &[String] {
        self.options.as_slice()
    }

    /// Has the given user already responded?
    pub fn has_voted(&self, voter: Id) -> bool {
        self.responses.contains_key(&voter)
    }
}

impl Tenanted for PollCore {
    fn tenant_id(&self) -> Option<&TenantId> {
        Some(&self.tenant_id)
    }
}

/// A poll without an ID.
pub type NewPoll = PollCore;

/// A poll from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub poll: PollCore,
}

impl Deref for Poll {
    type Target = PollCore;

    fn deref(&self) -> &Self::Target {
        &self.poll
    }
}

impl DerefMut for Poll {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.poll
    }
}

impl Tenanted for Poll {
    fn tenant_id(&self) -> Option<&TenantId> {
        Some(&self.poll.tenant_id)
    }
}
