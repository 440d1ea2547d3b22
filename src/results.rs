//! Aggregation of a poll's responses into per-option totals.

use crate::model::{
    api::results::{OptionCount, OptionPercentage, PollResult},
    db::poll::Poll,
};

/// Count the responses of `poll` per option and derive each option's share.
///
/// Options appear in poll order; a label listed twice is counted once, at its
/// first position. Responses naming an option the poll does not have are
/// ignored.
pub fn aggregate(poll: &Poll) -> PollResult {
    let mut counts: Vec<OptionCount> = Vec::with_capacity(poll.options().len());
    for option in poll.options() {
        if !counts.iter().any(|entry| &entry.option == option) {
            counts.push(OptionCount {
                option: option.clone(),
                count: 0,
            });
        }
    }

    for choice in poll.responses.values() {
        if let Some(entry) = counts.iter_mut().find(|entry| &entry.option == choice) {
            entry.count += 1;
        }
    }

    let total_votes = counts.iter().map(|entry| entry.count).sum();
    let vote_percentages = counts
        .iter()
        .map(|entry| OptionPercentage {
            option: entry.option.clone(),
            percentage: percentage(entry.count, total_votes),
        })
        .collect();

    PollResult {
        id: poll.id.into(),
        question: poll.question.clone(),
        total_votes,
        vote_counts: counts,
        vote_percentages,
    }
}

/// `100 * count / total` rounded half-up to one decimal place, or 0 if there
/// are no votes at all.
fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    // Integer arithmetic in tenths of a percent, so .x5 always rounds up.
    let tenths = (2000 * count + total) / (2 * total);
    tenths as f64 / 10.0
}
