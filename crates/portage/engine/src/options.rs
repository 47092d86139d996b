//! Run options
//!
//! [`WorkflowOptions`] carries the already-validated command surface for one
//! workflow invocation and can be loaded from TOML. [`GeneralOptions`]
//! bundles the process-wide collaborators every workflow shares.

use crate::console::{Console, LogConsole};
use crate::monitor::{EventMonitor, NoopEventMonitor};
use crate::profiler::Profiler;
use portage_types::{PortageError, PortageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const LAST_REVISION_FLAG: &str = "--last-rev";
pub const INIT_HISTORY_FLAG: &str = "--init-history";
pub const CHECK_LAST_REV_STATE_FLAG: &str = "--check-last-rev-state";
pub const CHANGE_REQUEST_PARENT_FLAG: &str = "--change-request-parent";

/// Per-invocation workflow flags
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowOptions {
    /// Origin reference to treat as already migrated, bypassing the
    /// destination status query
    pub last_revision: Option<String>,
    /// Migrate from the beginning of origin history
    pub init_history: bool,
    /// Owner mixed into migration identities
    pub identity_owner: Option<String>,
    /// Write nothing; writers receive `dry_run = true`
    pub dry_run: bool,
    /// Verify the destination still matches the last migrated revision
    /// before writing
    pub check_last_rev_state: bool,
    /// Stop an iterative run after this many migrated changes
    pub iterative_limit_changes: Option<usize>,
    /// Destination revision to use as change-request baseline
    pub change_request_parent: Option<String>,
}

impl WorkflowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last_revision(mut self, reference: impl Into<String>) -> Self {
        self.last_revision = Some(reference.into());
        self
    }

    pub fn with_init_history(mut self) -> Self {
        self.init_history = true;
        self
    }

    pub fn with_identity_owner(mut self, owner: impl Into<String>) -> Self {
        self.identity_owner = Some(owner.into());
        self
    }

    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_check_last_rev_state(mut self) -> Self {
        self.check_last_rev_state = true;
        self
    }

    pub fn with_iterative_limit(mut self, limit: usize) -> Self {
        self.iterative_limit_changes = Some(limit);
        self
    }

    pub fn with_change_request_parent(mut self, parent: impl Into<String>) -> Self {
        self.change_request_parent = Some(parent.into());
        self
    }

    /// Parse options from TOML text
    pub fn from_toml_str(contents: &str) -> PortageResult<Self> {
        toml::from_str(contents)
            .map_err(|e| PortageError::Validation(format!("Invalid workflow options: {}", e)))
    }

    /// Load options from a TOML file, or defaults when it does not exist
    pub fn load(path: &Path) -> PortageResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No options file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Collaborators shared by every workflow in the process
#[derive(Clone, Debug)]
pub struct GeneralOptions {
    console: Arc<dyn Console>,
    profiler: Profiler,
    event_monitor: Arc<dyn EventMonitor>,
    /// Migrate even when the engine would otherwise refuse (already
    /// migrated, every change skipped)
    pub force: bool,
    /// Echo the workflow configuration and each applied transformation on
    /// the console
    pub verbose: bool,
}

impl GeneralOptions {
    pub fn new() -> Self {
        Self {
            console: Arc::new(LogConsole::new()),
            profiler: Profiler::new(),
            event_monitor: Arc::new(NoopEventMonitor),
            force: false,
            verbose: false,
        }
    }

    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn with_profiler(mut self, profiler: Profiler) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_event_monitor(mut self, monitor: Arc<dyn EventMonitor>) -> Self {
        self.event_monitor = monitor;
        self
    }

    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn event_monitor(&self) -> &dyn EventMonitor {
        self.event_monitor.as_ref()
    }

    /// Run an origin/destination call inside a named profiler scope
    pub fn repo_task<T>(
        &self,
        name: &str,
        task: impl FnOnce() -> PortageResult<T>,
    ) -> PortageResult<T> {
        crate::repo_task::repo_task(&self.profiler, name, task)
    }
}

impl Default for GeneralOptions {
    fn default() -> Self {
        Self::new()
    }
}
