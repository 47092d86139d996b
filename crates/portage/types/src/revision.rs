//! Revisions and the history units read between them
//!
//! A [`Revision`] is produced by an origin and is immutable. A [`Change`]
//! pairs a revision with the metadata the origin recorded for it. Readers
//! return changes oldest first, and nothing downstream reorders them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

// ── Revision ─────────────────────────────────────────────────────────

/// An origin-side pointer to one historical state
pub trait Revision: Clone + Debug {
    /// Canonical string form (e.g. a commit hash)
    fn as_string(&self) -> String;

    /// Human-meaningful label distinct from the canonical form, such as a
    /// branch or review name
    fn context_reference(&self) -> Option<&str> {
        None
    }
}

// ── Author ───────────────────────────────────────────────────────────

/// Author of a change
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

// ── Change ───────────────────────────────────────────────────────────

/// One unit of origin history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change<R> {
    /// The revision this change points at
    pub revision: R,
    pub author: Author,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Labels extracted from the revision metadata, in recorded order
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, Vec<String>>,
    /// Paths touched by the change, when the origin knows them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<BTreeSet<String>>,
}

impl<R: Revision> Change<R> {
    pub fn new(revision: R, author: Author, message: impl Into<String>) -> Self {
        Self {
            revision,
            author,
            message: message.into(),
            date: None,
            labels: BTreeMap::new(),
            changed_files: None,
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_changed_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    /// Most recent value recorded for a label
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// First line of the message, used in summaries
    pub fn first_line(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Canonical string of the change's revision
    pub fn reference(&self) -> String {
        self.revision.as_string()
    }
}

// ── ChangesResponse ──────────────────────────────────────────────────

/// Result of reading a change range from an origin
///
/// `NoChanges` means the range was read and is empty, which is different
/// from there being no previous migration at all.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangesResponse<R> {
    Changes(Vec<Change<R>>),
    NoChanges,
}

impl<R> ChangesResponse<R> {
    /// Build a response, collapsing an empty list into `NoChanges`
    pub fn for_changes(changes: Vec<Change<R>>) -> Self {
        if changes.is_empty() {
            ChangesResponse::NoChanges
        } else {
            ChangesResponse::Changes(changes)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ChangesResponse::NoChanges)
    }

    pub fn changes(&self) -> &[Change<R>] {
        match self {
            ChangesResponse::Changes(changes) => changes,
            ChangesResponse::NoChanges => &[],
        }
    }

    pub fn into_changes(self) -> Vec<Change<R>> {
        match self {
            ChangesResponse::Changes(changes) => changes,
            ChangesResponse::NoChanges => Vec::new(),
        }
    }
}

// ── Baseline ─────────────────────────────────────────────────────────

/// A destination revision paired with the origin revision it was migrated from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Baseline<R> {
    /// Destination-side revision string to apply the change on top of
    pub destination: String,
    /// Origin revision that produced `destination`, when known
    pub origin: Option<R>,
}
