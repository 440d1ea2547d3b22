use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Privilege levels of the application's users.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Administers every institute.
    GlobalAdmin,
    /// Administers a single institute.
    LocalAdmin,
    /// Votes on the polls of their own institute.
    Voter,
}

impl Role {
    /// Is this one of the administrator roles?
    pub fn is_admin(&self) -> bool {
        match self {
            Self::GlobalAdmin | Self::LocalAdmin => true,
            Self::Voter => false,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::GlobalAdmin => "global_admin",
                Self::LocalAdmin => "local_admin",
                Self::Voter => "voter",
            }
        )
    }
}

/// Parse a role name. The user-type names found in import spreadsheets
/// (`master_admin`, `student`) are accepted alongside our own.
impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "global_admin" | "master_admin" => Ok(Self::GlobalAdmin),
            "local_admin" => Ok(Self::LocalAdmin),
            "voter" | "student" => Ok(Self::Voter),
            other => Err(format!("Unknown role '{other}'")),
        }
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}
