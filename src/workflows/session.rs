//! Composite session keys.
//!
//! A workflow session is keyed by (user, room, bill): unique per (user, bill)
//! pair and stable across retries, so a resubmitted request lands on the same
//! checkpointed state.

use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use thiserror::Error;

const SEPARATOR: &str = "::";

/// Composite session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub room_id: String,
    pub bill_number: String,
}

impl SessionKey {
    pub fn new(
        user_id: impl Into<String>,
        room_id: impl Into<String>,
        bill_number: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            room_id: room_id.into(),
            bill_number: bill_number.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.user_id, self.room_id, self.bill_number
        )
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("malformed session key: {key}")]
#[diagnostic(
    code(civicflow::session::malformed_key),
    help("Expected `user::room::bill`.")
)]
pub struct SessionKeyError {
    key: String,
}

impl FromStr for SessionKey {
    type Err = SessionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        match parts.as_slice() {
            [user, room, bill] if !user.is_empty() && !room.is_empty() && !bill.is_empty() => {
                Ok(Self::new(*user, *room, *bill))
            }
            _ => Err(SessionKeyError { key: s.to_string() }),
        }
    }
}
