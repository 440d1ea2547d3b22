mod rights;
mod token;

pub use rights::{Admin, Anyone, Rights, Voter};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
