// Copyright 2026 Oxide Computer Company

//! Author, committer and tagger identities.

use crate::RecordError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A name and e-mail address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// The display name.
    pub name: String,
    /// The e-mail address, without angle brackets.
    pub email: String,
}

/// A person together with the time they acted.
///
/// Serialized as `{"user": {"name": ..., "email": ...}, "date": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Who.
    pub user: Person,
    /// When, with the offset git recorded.
    pub date: DateTime<FixedOffset>,
}

impl Identity {
    /// Builds an identity from raw record fields.
    ///
    /// `field` names the date field in errors.
    pub(crate) fn from_fields(
        name: &str,
        email: &str,
        date: &str,
        field: &'static str,
    ) -> Result<Self, RecordError> {
        let date = DateTime::parse_from_rfc3339(date).map_err(|error| {
            RecordError::InvalidDate { field, value: date.to_owned(), error }
        })?;
        Ok(Identity {
            user: Person { name: name.to_owned(), email: email.to_owned() },
            date,
        })
    }
}
