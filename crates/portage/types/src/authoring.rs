//! Mapping origin authors onto authors the destination accepts

use crate::Author;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How origin authors are carried over
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthoringMode {
    /// Keep every origin author
    PassThru,
    /// Replace every author with the default author
    OverwriteAll,
    /// Keep authors whose email is listed, replace the rest
    Allowed(BTreeSet<String>),
}

/// Author mapping policy between an origin and a destination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authoring {
    pub default_author: Author,
    pub mode: AuthoringMode,
}

impl Authoring {
    pub fn pass_thru(default_author: Author) -> Self {
        Self {
            default_author,
            mode: AuthoringMode::PassThru,
        }
    }

    pub fn overwrite(default_author: Author) -> Self {
        Self {
            default_author,
            mode: AuthoringMode::OverwriteAll,
        }
    }

    pub fn allowed<I, S>(default_author: Author, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            default_author,
            mode: AuthoringMode::Allowed(emails.into_iter().map(Into::into).collect()),
        }
    }

    /// The author to record in the destination for `author`
    pub fn resolve(&self, author: &Author) -> Author {
        match &self.mode {
            AuthoringMode::PassThru => author.clone(),
            AuthoringMode::OverwriteAll => self.default_author.clone(),
            AuthoringMode::Allowed(emails) if emails.contains(&author.email) => author.clone(),
            AuthoringMode::Allowed(_) => self.default_author.clone(),
        }
    }
}
