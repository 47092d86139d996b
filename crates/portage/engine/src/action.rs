//! Actions run after each successful destination write
//!
//! Typical uses are notifying a review system or recording an audit entry.
//! Actions see a revision-independent summary of the write. A failing action
//! fails the migration.

use portage_types::{DestinationEffect, EffectKind, PortageResult, Revision};
use serde::Serialize;
use std::fmt::Debug;

/// Revision-independent summary of one destination write
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MigrationSummary {
    pub workflow_name: String,
    pub origin_ref: String,
    pub identity: String,
    pub dry_run: bool,
    pub effects: Vec<EffectSummary>,
}

/// One destination effect, with the destination revision as a string
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EffectSummary {
    pub kind: EffectKind,
    pub summary: String,
    pub destination_ref: Option<String>,
}

impl<D: Revision> From<&DestinationEffect<D>> for EffectSummary {
    fn from(effect: &DestinationEffect<D>) -> Self {
        Self {
            kind: effect.kind,
            summary: effect.summary.clone(),
            destination_ref: effect.destination_ref.as_ref().map(Revision::as_string),
        }
    }
}

/// Hook invoked after every successful write
pub trait AfterMigrationAction: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, summary: &MigrationSummary) -> PortageResult<()>;
}
