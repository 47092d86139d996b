//! Read-only migration status snapshots

use crate::{Change, Revision};
use serde::Serialize;

/// Last migrated revision and what is still pending, for one workflow
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MigrationReference<R> {
    /// Workflow-derived name, e.g. `workflow_default`
    pub label: String,
    /// `None` when nothing has been migrated yet
    pub last_migrated: Option<R>,
    /// Pending changes in origin order, skipped changes excluded
    pub available_to_migrate: Vec<Change<R>>,
}

impl<R: Revision> MigrationReference<R> {
    pub fn new(
        label: impl Into<String>,
        last_migrated: Option<R>,
        available_to_migrate: Vec<Change<R>>,
    ) -> Self {
        Self {
            label: label.into(),
            last_migrated,
            available_to_migrate,
        }
    }

    /// Most recent pending change
    pub fn last_available(&self) -> Option<&Change<R>> {
        self.available_to_migrate.last()
    }
}

/// Status report for a migration
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Info<R> {
    pub migration_references: Vec<MigrationReference<R>>,
}

impl<R: Revision> Info<R> {
    pub fn new(migration_references: Vec<MigrationReference<R>>) -> Self {
        Self {
            migration_references,
        }
    }

    pub fn reference(&self, label: &str) -> Option<&MigrationReference<R>> {
        self.migration_references.iter().find(|r| r.label == label)
    }
}
