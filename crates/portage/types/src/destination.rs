//! The destination contract: where migrated changes are written

use crate::{Author, Description, Glob, PortageResult, Revision};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::PathBuf;

/// A target repository
pub trait Destination: Debug {
    type Revision: Revision;

    /// Open a writer bound to one run
    fn new_writer<R: Revision>(
        &self,
        context: &WriterContext<R>,
    ) -> PortageResult<Box<dyn Writer<Self::Revision>>>;

    /// Describe the destination for reporting
    fn describe(&self, destination_files: &Glob) -> Description;
}

/// Writes transformed changes into a destination
pub trait Writer<D: Revision> {
    /// The destination's record of the last migrated origin revision, or
    /// `None` when nothing was migrated yet
    fn destination_status(
        &self,
        destination_files: &Glob,
        origin_label: &str,
    ) -> PortageResult<Option<DestinationStatus>>;

    /// Write one transformed change (or squashed batch)
    fn write(&mut self, result: &TransformResult) -> PortageResult<Vec<DestinationEffect<D>>>;
}

// ── Status ───────────────────────────────────────────────────────────

/// What the destination remembers about previous migrations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationStatus {
    /// Origin revision (as a string) of the last successful migration
    pub baseline: String,
    /// Destination-side pending pointers (e.g. unsubmitted reviews)
    #[serde(default)]
    pub pending: Vec<String>,
}

impl DestinationStatus {
    pub fn new(baseline: impl Into<String>) -> Self {
        Self {
            baseline: baseline.into(),
            pending: Vec::new(),
        }
    }
}

// ── Writer context ───────────────────────────────────────────────────

/// Parameters a destination needs to open a writer for one run
#[derive(Clone, Debug)]
pub struct WriterContext<R> {
    pub workflow_name: String,
    pub identity_owner: Option<String>,
    pub dry_run: bool,
    /// The origin revision this run resolved
    pub resolved: R,
}

impl<R: Revision> WriterContext<R> {
    pub fn new(
        workflow_name: impl Into<String>,
        identity_owner: Option<String>,
        dry_run: bool,
        resolved: R,
    ) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            identity_owner,
            dry_run,
            resolved,
        }
    }
}

// ── Transform result ─────────────────────────────────────────────────

/// Everything a writer needs to record one migrated change
#[derive(Clone, Debug, Serialize)]
pub struct TransformResult {
    /// Directory holding the transformed tree
    pub path: PathBuf,
    /// Canonical origin revision being migrated
    pub origin_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_reference: Option<String>,
    pub author: Author,
    pub message: String,
    /// Stable identity of the logical change
    pub identity: String,
    pub workflow_name: String,
    /// Destination revision to apply on top of (change requests)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    /// Label the destination uses to record `origin_ref`
    pub origin_label: String,
    pub set_rev_id: bool,
    pub smart_prune: bool,
    pub dry_run: bool,
}

impl TransformResult {
    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

// ── Effects ──────────────────────────────────────────────────────────

/// What a write did in the destination
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Created,
    Updated,
    Noop,
    Error,
}

/// One observable result of a destination write
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DestinationEffect<D> {
    pub kind: EffectKind,
    pub summary: String,
    /// Origin revisions that contributed to this effect
    pub origin_refs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_ref: Option<D>,
}

impl<D: Revision> DestinationEffect<D> {
    pub fn new(kind: EffectKind, summary: impl Into<String>, origin_refs: Vec<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            origin_refs,
            destination_ref: None,
        }
    }

    pub fn with_destination_ref(mut self, destination_ref: D) -> Self {
        self.destination_ref = Some(destination_ref);
        self
    }
}
