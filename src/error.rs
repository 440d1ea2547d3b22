use std::fmt::Display;
use std::io::Error as IoError;

use argon2::Error as Argon2Error;
use csv::Error as CsvError;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: empty question, options or choice, unknown option, etc.
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("User {voter} has already voted on poll {poll}")]
    AlreadyVoted { poll: Id, voter: Id },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// A storage failure not attributable to the caller.
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error(transparent)]
    Io(#[from] IoError),
}

impl Error {
    pub fn validation(message: impl Display) -> Self {
        Self::Validation(message.to_string())
    }

    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::Csv(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::AlreadyVoted { .. } => Status::Conflict,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::Persistence(_) | Self::Db(_) | Self::Argon2(_) | Self::Io(_) => {
                Status::InternalServerError
            }
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        // Expected rejections are reported back verbatim; storage failures
        // stay opaque to the caller.
        let message = if status.class() == StatusClass::ServerError {
            error!("{self}");
            "Internal server error".to_string()
        } else {
            warn!("{self}");
            self.to_string()
        };
        (status, Json(ErrorBody { error: message })).respond_to(req)
    }
}
