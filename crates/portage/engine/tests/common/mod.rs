#![allow(dead_code)]

use parking_lot::Mutex;
use portage_engine::console::BufferedConsole;
use portage_engine::memory::{MemoryDestination, MemoryOrigin, NoopTransformation};
use portage_engine::monitor::{
    ChangeMigrationFinishedEvent, EventMonitor, MigrationFinishedEvent, MigrationOutcome,
};
use portage_engine::{
    AfterMigrationAction, GeneralOptions, MigrationSummary, Profiler, RecordingListener,
    WorkflowBuilder,
};
use portage_types::{
    Author, ConfigFile, PortageError, PortageResult, TransformWork, Transformation, WorkflowMode,
};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

pub fn ann() -> Author {
    Author::new("Ann", "ann@example.com")
}

pub fn bob() -> Author {
    Author::new("Bob", "bob@example.com")
}

/// Origin with `count` commits, each touching `file<n>.txt`
pub fn origin_with_commits(count: usize) -> MemoryOrigin {
    let origin = MemoryOrigin::new();
    for n in 1..=count {
        origin.commit(
            &format!("Change {}", n),
            ann(),
            [(format!("file{}.txt", n), format!("content {}", n))],
        );
    }
    origin
}

pub fn builder(
    origin: &MemoryOrigin,
    destination: &MemoryDestination,
    mode: WorkflowMode,
) -> WorkflowBuilder<MemoryOrigin, MemoryDestination> {
    builder_with(origin, destination, mode, NoopTransformation)
}

pub fn builder_with(
    origin: &MemoryOrigin,
    destination: &MemoryDestination,
    mode: WorkflowMode,
    transformation: impl Transformation + 'static,
) -> WorkflowBuilder<MemoryOrigin, MemoryDestination> {
    portage_engine::Workflow::builder(
        "default",
        origin.clone(),
        destination.clone(),
        transformation,
        ConfigFile::new("copy/portage.toml").with_root("copy"),
    )
    .with_mode(mode)
}

/// General options wired to a buffered console and a recording profiler
pub struct Harness {
    pub console: Arc<BufferedConsole>,
    pub listener: Arc<RecordingListener>,
    pub monitor: Arc<RecordingMonitor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::answering(true)
    }

    pub fn answering(answer: bool) -> Self {
        Self {
            console: Arc::new(BufferedConsole::new(answer)),
            listener: Arc::new(RecordingListener::new()),
            monitor: Arc::new(RecordingMonitor::default()),
        }
    }

    pub fn general(&self) -> GeneralOptions {
        GeneralOptions::new()
            .with_console(self.console.clone())
            .with_profiler(Profiler::new().with_listener(self.listener.clone()))
            .with_event_monitor(self.monitor.clone())
    }
}

#[derive(Debug, Default)]
pub struct RecordingMonitor {
    pub finished_changes: Mutex<Vec<ChangeMigrationFinishedEvent>>,
    pub outcomes: Mutex<Vec<MigrationOutcome>>,
}

impl EventMonitor for RecordingMonitor {
    fn on_change_migration_finished(&self, event: &ChangeMigrationFinishedEvent) {
        self.finished_changes.lock().push(event.clone());
    }

    fn on_migration_finished(&self, event: &MigrationFinishedEvent) {
        self.outcomes.lock().push(event.outcome);
    }
}

/// After-migration action that records what it saw
#[derive(Debug, Clone, Default)]
pub struct RecordingAction {
    pub seen: Arc<Mutex<Vec<MigrationSummary>>>,
    pub fail: bool,
}

impl AfterMigrationAction for RecordingAction {
    fn name(&self) -> &str {
        "record"
    }

    fn run(&self, summary: &MigrationSummary) -> PortageResult<()> {
        self.seen.lock().push(summary.clone());
        if self.fail {
            return Err(PortageError::repository("notification endpoint unavailable"));
        }
        Ok(())
    }
}

// ── Transformations ──────────────────────────────────────────────────

fn rewrite_files(root: &Path, rewrite: impl Fn(&str) -> String) -> PortageResult<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            let content = std::fs::read_to_string(entry.path())?;
            std::fs::write(entry.path(), rewrite(&content))?;
        }
    }
    Ok(())
}

/// Prepends `prefix` to every file
#[derive(Debug, Clone)]
pub struct PrefixContent(pub &'static str);

impl Transformation for PrefixContent {
    fn transform(&self, work: &mut TransformWork) -> PortageResult<()> {
        rewrite_files(work.checkout_dir(), |content| format!("{}{}", self.0, content))
    }

    fn describe(&self) -> String {
        format!("prefix '{}'", self.0)
    }
}

/// Removes a leading `prefix` from every file
#[derive(Debug, Clone)]
pub struct StripContent(pub &'static str);

impl Transformation for StripContent {
    fn transform(&self, work: &mut TransformWork) -> PortageResult<()> {
        rewrite_files(work.checkout_dir(), |content| {
            content.strip_prefix(self.0).unwrap_or(content).to_string()
        })
    }

    fn describe(&self) -> String {
        format!("strip '{}'", self.0)
    }
}

/// Fails while migrating the change `fail_on`
#[derive(Debug, Clone)]
pub struct FailingTransformation {
    pub fail_on: String,
}

impl FailingTransformation {
    pub fn on(reference: &str) -> Self {
        Self {
            fail_on: reference.to_string(),
        }
    }
}

impl Transformation for FailingTransformation {
    fn transform(&self, work: &mut TransformWork) -> PortageResult<()> {
        if work.current.iter().any(|change| change.reference == self.fail_on) {
            return Err(PortageError::Transform(format!(
                "cannot transform change {}",
                self.fail_on
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("fail on {}", self.fail_on)
    }
}

/// Adds a symbolic link back to the checkout root
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct LinkCycle;

#[cfg(unix)]
impl Transformation for LinkCycle {
    fn transform(&self, work: &mut TransformWork) -> PortageResult<()> {
        std::os::unix::fs::symlink(".", work.checkout_dir().join("loop"))?;
        Ok(())
    }

    fn describe(&self) -> String {
        "link cycle".to_string()
    }
}
