use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// Number of votes for a single option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCount {
    pub option: String,
    pub count: u64,
}

/// Share of the total vote for a single option, in percent to one decimal place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionPercentage {
    pub option: String,
    pub percentage: f64,
}

/// Aggregated results of one poll.
///
/// Both lists follow the poll's option order, one entry per distinct option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    pub id: ApiId,
    pub question: String,
    pub total_votes: u64,
    pub vote_counts: Vec<OptionCount>,
    pub vote_percentages: Vec<OptionPercentage>,
}

impl PollResult {
    /// The count for `option`, if it is one of the poll's options.
    pub fn count(&self, option: &str) -> Option<u64> {
        self.vote_counts
            .iter()
            .find(|entry| entry.option == option)
            .map(|entry| entry.count)
    }

    /// The percentage for `option`, if it is one of the poll's options.
    pub fn percentage(&self, option: &str) -> Option<f64> {
        self.vote_percentages
            .iter()
            .find(|entry| entry.option == option)
            .map(|entry| entry.percentage)
    }
}
