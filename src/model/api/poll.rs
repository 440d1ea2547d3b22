use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::id::ApiId,
    common::{
        options::{PollOptions, OPTION_SEPARATOR},
        tenant::TenantId,
    },
    db::poll::{NewPoll, Poll},
    mongodb::Id,
};

/// A request to create a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSpec {
    pub question: String,
    /// Option labels in display order. Blank labels are dropped; a label
    /// must not contain the option separator.
    pub options: Vec<String>,
    pub tenant_id: TenantId,
    /// Display name of the institute; derived from the tenant ID if absent.
    #[serde(default)]
    pub institute: Option<String>,
}

impl TryFrom<PollSpec> for NewPoll {
    type Error = Error;

    /// Validate the spec. The question and tenant must not be blank, no label
    /// may contain the option separator and at least one non-blank option must
    /// remain.
    fn try_from(spec: PollSpec) -> Result<Self, Self::Error> {
        let question = spec.question.trim();
        if question.is_empty() {
            return Err(Error::validation("Poll question must not be blank"));
        }
        if spec.tenant_id.is_blank() {
            return Err(Error::validation("Poll institute ID must not be blank"));
        }
        if let Some(label) = spec
            .options
            .iter()
            .find(|label| label.contains(OPTION_SEPARATOR))
        {
            return Err(Error::validation(format!(
                "Option {label:?} must not contain {OPTION_SEPARATOR:?}"
            )));
        }
        let options = PollOptions::new(&spec.options);
        if options.is_empty() {
            return Err(Error::validation(format!(
                "Poll {question:?} must have at least one option"
            )));
        }
        Ok(NewPoll::new(
            question.to_string(),
            spec.tenant_id,
            spec.institute,
            options,
        ))
    }
}

/// An API-friendly poll description, as seen by a particular user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDescription {
    pub id: ApiId,
    pub question: String,
    pub tenant_id: TenantId,
    pub institute: String,
    pub options: Vec<String>,
    pub active: bool,
    /// Has the viewing user already voted on this poll?
    pub voted: bool,
}

impl PollDescription {
    pub fn for_viewer(poll: Poll, viewer: Id) -> Self {
        let voted = poll.has_voted(viewer);
        Self {
            id: poll.id.into(),
            options: poll.options().to_vec(),
            question: poll.poll.question,
            tenant_id: poll.poll.tenant_id,
            institute: poll.poll.institute,
            active: poll.poll.active,
            voted,
        }
    }
}

/// A voter's choice on a single poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    /// The chosen option label. Missing is treated the same as empty.
    #[serde(default)]
    pub option: String,
}

/// Acknowledgement of a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub poll_id: ApiId,
    pub option: String,
    pub message: String,
}

impl VoteReceipt {
    pub fn new(poll_id: Id, option: String) -> Self {
        Self {
            poll_id: poll_id.into(),
            option,
            message: "Thank you for voting!".to_string(),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl PollSpec {
        pub fn example() -> Self {
            Self {
                question: "Favourite colour?".to_string(),
                options: vec!["Red".to_string(), "Blue".to_string()],
                tenant_id: "inst1".into(),
                institute: Some("First Institute".to_string()),
            }
        }

        pub fn other_tenant_example() -> Self {
            Self {
                question: "Best lunch option?".to_string(),
                options: vec!["Pasta".to_string(), "Curry".to_string()],
                tenant_id: "inst2".into(),
                institute: None,
            }
        }
    }
}
