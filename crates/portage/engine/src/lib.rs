//! Portage Workflow Engine
//!
//! The engine answers two questions for a configured workflow: *what
//! changed in the origin since the last migration*, and *how should those
//! changes land in the destination*. It keeps no state of its own between
//! runs; the destination records the last migrated origin revision and
//! every run starts by asking for it.
//!
//! # Architecture
//!
//! - [`Workflow`]: top-level entry that validates flags, resolves the
//!   requested reference, runs a mode strategy, and reports [`Workflow::info`]
//! - [`WorkflowRunHelper`]: per-run binding of resolved revision, reader
//!   and writer; hands out [`ChangeMigrator`]s
//! - [`strategy`]: the four mode pipelines (iterative, squash, change
//!   request, check-last-rev-state)
//! - [`identity`]: deterministic migration identities
//! - [`repo_task`] / [`Profiler`]: named, timed scopes around every
//!   origin/destination call
//! - [`tree`]: checkout listing, copy and comparison
//!
//! # Example
//!
//! ```rust
//! use portage_engine::memory::{MemoryDestination, MemoryOrigin, NoopTransformation};
//! use portage_engine::Workflow;
//! use portage_types::{Author, ConfigFile, WorkflowMode};
//!
//! let origin = MemoryOrigin::new();
//! origin.commit("first", Author::new("Ann", "ann@example.com"), [("README.md", "hello")]);
//! let destination = MemoryDestination::new();
//!
//! let workflow = Workflow::builder(
//!     "default",
//!     origin.clone(),
//!     destination.clone(),
//!     NoopTransformation,
//!     ConfigFile::new("portage.toml"),
//! )
//! .with_mode(WorkflowMode::Squash)
//! .build();
//!
//! let workdir = tempfile::tempdir().unwrap();
//! workflow.run(workdir.path(), &[]).unwrap();
//! assert_eq!(destination.writes().len(), 1);
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod console;
pub mod identity;
pub mod memory;
pub mod monitor;
pub mod options;
pub mod profiler;
pub mod repo_task;
pub mod run_helper;
pub mod strategy;
pub mod telemetry;
pub mod tree;
pub mod workflow;

// Re-export main types
pub use action::{AfterMigrationAction, MigrationSummary};
pub use console::{Console, LogConsole};
pub use monitor::{EventMonitor, NoopEventMonitor};
pub use options::{GeneralOptions, WorkflowOptions};
pub use profiler::{Profiler, ProfilerListener, ProfilerTask, RecordingListener, TaskRecord};
pub use repo_task::repo_task;
pub use run_helper::{ChangeMigrator, MigrationRequest, WorkflowRunHelper};
pub use telemetry::{init_logging, LoggingConfig};
pub use workflow::{Workflow, WorkflowBuilder, WorkflowSnapshot};
