//! Event monitor: lifecycle notifications for migrations
//!
//! Monitors observe; they cannot veto or alter a migration. The default
//! [`NoopEventMonitor`] ignores everything.

use portage_types::EffectKind;
use serde::Serialize;
use std::fmt::Debug;

/// A migration run is about to start
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MigrationStartedEvent {
    pub workflow_name: String,
    pub mode: String,
    pub resolved_reference: String,
}

/// A single destination write is about to start
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangeMigrationStartedEvent {
    pub workflow_name: String,
    pub origin_ref: String,
}

/// A single destination write finished
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangeMigrationFinishedEvent {
    pub workflow_name: String,
    pub origin_ref: String,
    pub effects: Vec<EffectKind>,
}

/// Final outcome of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    Success,
    NoOp,
    Failed,
}

/// A migration run finished
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MigrationFinishedEvent {
    pub workflow_name: String,
    pub outcome: MigrationOutcome,
}

/// Receives migration lifecycle events
pub trait EventMonitor: Debug + Send + Sync {
    fn on_migration_started(&self, _event: &MigrationStartedEvent) {}
    fn on_change_migration_started(&self, _event: &ChangeMigrationStartedEvent) {}
    fn on_change_migration_finished(&self, _event: &ChangeMigrationFinishedEvent) {}
    fn on_migration_finished(&self, _event: &MigrationFinishedEvent) {}
}

/// Ignores every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEventMonitor;

impl EventMonitor for NoopEventMonitor {}
