use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Separator between option labels in the persisted representation.
pub const OPTION_SEPARATOR: char = ',';

/// The ordered option labels of a poll.
///
/// Persisted as a single comma-separated string. Labels are trimmed and empty
/// labels dropped, both on construction and on parsing, so
/// `list -> string -> list` is lossless for anything this type holds. A label
/// containing the separator is split into several labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PollOptions(Vec<String>);

impl PollOptions {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = labels
            .into_iter()
            .flat_map(|label| {
                label
                    .as_ref()
                    .split(OPTION_SEPARATOR)
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self(labels)
    }

    /// Parse the persisted representation.
    pub fn parse(joined: &str) -> Self {
        Self::new([joined])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|option| option == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Display for PollOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(&OPTION_SEPARATOR.to_string()))
    }
}

impl From<String> for PollOptions {
    fn from(joined: String) -> Self {
        Self::parse(&joined)
    }
}

impl From<PollOptions> for String {
    fn from(options: PollOptions) -> Self {
        options.to_string()
    }
}
