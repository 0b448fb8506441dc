//! Display names of participants
//!
//! A name is trimmed, length checked and run through the profanity filter
//! before it is claimed. Each session owns one [`Names`], so the same name
//! can be used in two different sessions.

use std::collections::{HashMap, hash_map::Entry};

use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{constants, watcher::Id};

#[derive(Deserialize)]
struct NamesSerde {
    by_id: HashMap<Id, String>,
}

/// Names claimed within a session, indexed both ways
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "NamesSerde")]
pub struct Names {
    by_id: HashMap<Id, String>,

    #[serde(skip_serializing)]
    by_name: HashMap<String, Id>,
}

impl From<NamesSerde> for Names {
    fn from(serde: NamesSerde) -> Self {
        let NamesSerde { by_id } = serde;
        let by_name = by_id.iter().map(|(id, name)| (name.clone(), *id)).collect();
        Self { by_id, by_name }
    }
}

/// Reasons a display name is refused
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Someone else in the session has this name
    #[error("name already in use")]
    Used,
    /// The participant already claimed a name
    #[error("participant already has a name")]
    Assigned,
    /// Nothing left after trimming
    #[error("name cannot be empty")]
    Empty,
    /// Flagged by the profanity filter
    #[error("name is inappropriate")]
    Sinful,
    /// Longer than the allowed maximum
    #[error("name is too long")]
    TooLong,
}

/// Trims `name` and checks it is acceptable as a display name
///
/// # Errors
///
/// Returns `Error::TooLong`, `Error::Empty` or `Error::Sinful`.
pub fn clean(name: &str) -> Result<&str, Error> {
    let name = rustrict::trim_whitespace(name);
    if name.chars().count() > constants::names::MAX_LENGTH {
        Err(Error::TooLong)
    } else if name.is_empty() {
        Err(Error::Empty)
    } else if name.is_inappropriate() {
        Err(Error::Sinful)
    } else {
        Ok(name)
    }
}

impl Names {
    /// Claims a cleaned version of `name` for `id`
    ///
    /// Nothing is reserved when an error is returned.
    ///
    /// # Errors
    ///
    /// Any error from [`clean`], `Error::Used` if the name is taken and
    /// `Error::Assigned` if `id` already has a name.
    pub fn set_name(&mut self, id: Id, name: &str) -> Result<String, Error> {
        let name = clean(name)?;
        if self.by_name.contains_key(name) {
            return Err(Error::Used);
        }

        let Entry::Vacant(slot) = self.by_id.entry(id) else {
            return Err(Error::Assigned);
        };
        slot.insert(name.to_owned());
        self.by_name.insert(name.to_owned(), id);

        Ok(name.to_owned())
    }

    /// Releases the name of `id` so another participant may take it
    pub fn remove(&mut self, id: &Id) -> Option<String> {
        let name = self.by_id.remove(id)?;
        self.by_name.remove(&name);
        Some(name)
    }
}
