//! Transformation contract and the state it operates on

use crate::{Author, Change, PortageResult, Revision};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Applied to a checkout between reading and writing
pub trait Transformation: Debug {
    /// Transform the checkout in place. Failures should be reported as
    /// [`crate::PortageError::Transform`].
    fn transform(&self, work: &mut TransformWork) -> PortageResult<()>;

    /// Short description for logs and snapshots
    fn describe(&self) -> String;
}

/// Looks up metadata labels by name
pub trait LabelSource {
    fn label(&self, name: &str) -> Option<String>;
}

impl<R: Revision> LabelSource for Change<R> {
    fn label(&self, name: &str) -> Option<String> {
        Change::label(self, name).map(str::to_string)
    }
}

/// Author and message of the change about to be written
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub author: Author,
    pub message: String,
}

impl Metadata {
    pub fn new(author: Author, message: impl Into<String>) -> Self {
        Self {
            author,
            message: message.into(),
        }
    }
}

/// Origin-side view of a change, without the origin's revision type
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangeSummary {
    pub reference: String,
    pub author: Author,
    pub message: String,
    pub labels: Vec<(String, String)>,
}

impl<R: Revision> From<&Change<R>> for ChangeSummary {
    fn from(change: &Change<R>) -> Self {
        let labels = change
            .labels
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.clone(), v.clone())))
            .collect();
        Self {
            reference: change.reference(),
            author: change.author.clone(),
            message: change.message.clone(),
            labels,
        }
    }
}

/// Mutable state handed to a [`Transformation`]
#[derive(Clone, Debug)]
pub struct TransformWork {
    checkout_dir: PathBuf,
    pub metadata: Metadata,
    /// Changes being migrated by this write, oldest first
    pub current: Vec<ChangeSummary>,
    /// Canonical string of the resolved origin reference
    pub resolved_reference: String,
}

impl TransformWork {
    pub fn new(
        checkout_dir: impl Into<PathBuf>,
        metadata: Metadata,
        current: Vec<ChangeSummary>,
        resolved_reference: impl Into<String>,
    ) -> Self {
        Self {
            checkout_dir: checkout_dir.into(),
            metadata,
            current,
            resolved_reference: resolved_reference.into(),
        }
    }

    pub fn checkout_dir(&self) -> &Path {
        &self.checkout_dir
    }

    /// Append a `Name: value` label line to the message
    pub fn add_label(&mut self, name: &str, value: &str) {
        if !self.metadata.message.ends_with('\n') {
            self.metadata.message.push('\n');
        }
        self.metadata.message.push_str(&format!("{}: {}\n", name, value));
    }
}

impl LabelSource for TransformWork {
    /// Message labels win over change labels; later values win over earlier.
    fn label(&self, name: &str) -> Option<String> {
        if let Some(value) = message_label(&self.metadata.message, name) {
            return Some(value);
        }
        self.current.iter().rev().find_map(|change| {
            change
                .labels
                .iter()
                .rev()
                .find(|(label, _)| label == name)
                .map(|(_, value)| value.clone())
                .or_else(|| message_label(&change.message, name))
        })
    }
}

/// Last `name: value` or `name=value` line in `message`
fn message_label(message: &str, name: &str) -> Option<String> {
    message.lines().rev().find_map(|line| {
        let rest = line.trim().strip_prefix(name)?;
        let value = rest.strip_prefix(':').or_else(|| rest.strip_prefix('='))?;
        Some(value.trim().to_string())
    })
}
