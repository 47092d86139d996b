//! In-memory origin and destination
//!
//! Used for tests, local demos, and embedding. Both backends are cheap
//! handles over shared state: clone one into a [`Workflow`](crate::Workflow)
//! and keep the other to inspect what happened.
//!
//! The origin keeps a linear history of commits `r1, r2, ...`, each with a
//! full file tree. The destination records every write and remembers the
//! last migrated origin revision as its status.

use crate::tree;
use parking_lot::Mutex;
use portage_types::{
    Author, Authoring, Baseline, Change, ChangesResponse, Description, Destination,
    DestinationEffect, DestinationStatus, EffectKind, Glob, Origin, PortageError, PortageResult,
    Reader, Revision, TransformResult, TransformWork, Transformation, Writer, WriterContext,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Label under which the origin revision is recorded in the destination
pub const ORIGIN_LABEL: &str = "Origin-RevId";

// ── Revision ─────────────────────────────────────────────────────────

/// Commit id, plus the named reference it was resolved from
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MemoryRevision {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl MemoryRevision {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Revision for MemoryRevision {
    fn as_string(&self) -> String {
        self.id.clone()
    }

    fn context_reference(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl std::fmt::Display for MemoryRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

// ── Origin ───────────────────────────────────────────────────────────

/// How often each origin operation was called
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OriginCalls {
    pub resolve: usize,
    pub new_reader: usize,
    pub changes: usize,
    pub change: usize,
    pub checkout: usize,
    pub find_baseline: usize,
}

impl OriginCalls {
    pub fn total(&self) -> usize {
        self.resolve + self.new_reader + self.changes + self.change + self.checkout + self.find_baseline
    }
}

#[derive(Debug)]
struct Commit {
    change: Change<MemoryRevision>,
    tree: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct OriginState {
    commits: Vec<Commit>,
    refs: BTreeMap<String, String>,
    calls: OriginCalls,
}

impl OriginState {
    fn index_of(&self, id: &str) -> PortageResult<usize> {
        self.commits
            .iter()
            .position(|c| c.change.revision.id == id)
            .ok_or_else(|| PortageError::repository(format!("Unknown revision '{}'", id)))
    }
}

/// Linear in-memory history
#[derive(Clone, Debug, Default)]
pub struct MemoryOrigin {
    state: Arc<Mutex<OriginState>>,
}

impl MemoryOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit that writes `files` on top of the previous tree
    pub fn commit<I, P, C>(&self, message: &str, author: Author, files: I) -> MemoryRevision
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        self.commit_labeled(message, author, files, std::iter::empty::<(&str, &str)>())
    }

    /// Append a commit carrying `labels` in its metadata
    pub fn commit_labeled<I, P, C, L, N, V>(
        &self,
        message: &str,
        author: Author,
        files: I,
        labels: L,
    ) -> MemoryRevision
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
        L: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut state = self.state.lock();
        let revision = MemoryRevision::new(format!("r{}", state.commits.len() + 1));
        let mut tree = state
            .commits
            .last()
            .map(|c| c.tree.clone())
            .unwrap_or_default();

        let mut changed = BTreeSet::new();
        for (path, content) in files {
            let path = path.into();
            changed.insert(path.clone());
            tree.insert(path, content.into());
        }

        let mut change = Change::new(revision.clone(), author, message);
        for (name, value) in labels {
            change = change.with_label(name, value);
        }
        change.changed_files = Some(changed);

        tracing::debug!(revision = %revision, files = tree.len(), "Memory origin commit");
        state.commits.push(Commit { change, tree });
        revision
    }

    /// Forget which files `revision` touched, as origins without file
    /// lists report
    pub fn clear_changed_files(&self, revision: &MemoryRevision) -> PortageResult<()> {
        let mut state = self.state.lock();
        let index = state.index_of(&revision.id)?;
        state.commits[index].change.changed_files = None;
        Ok(())
    }

    /// Point the named reference `name` at `revision`
    pub fn set_ref(&self, name: impl Into<String>, revision: &MemoryRevision) {
        self.state.lock().refs.insert(name.into(), revision.id.clone());
    }

    pub fn calls(&self) -> OriginCalls {
        self.state.lock().calls
    }

    pub fn head(&self) -> Option<MemoryRevision> {
        self.state
            .lock()
            .commits
            .last()
            .map(|c| c.change.revision.clone())
    }
}

impl Origin for MemoryOrigin {
    type Revision = MemoryRevision;

    /// Commit ids resolve to themselves; named references resolve to their
    /// commit and keep the name as context reference
    fn resolve(&self, reference: Option<&str>) -> PortageResult<MemoryRevision> {
        let mut state = self.state.lock();
        state.calls.resolve += 1;
        match reference {
            None => state
                .commits
                .last()
                .map(|c| c.change.revision.clone())
                .ok_or_else(|| PortageError::repository("Origin has no commits")),
            Some(reference) => {
                if let Some(id) = state.refs.get(reference) {
                    return Ok(MemoryRevision::new(id.clone()).with_context(reference));
                }
                let index = state.index_of(reference).map_err(|_| {
                    PortageError::repository(format!("Cannot resolve reference '{}'", reference))
                })?;
                Ok(state.commits[index].change.revision.clone())
            }
        }
    }

    fn new_reader(
        &self,
        origin_files: &Glob,
        _authoring: &Authoring,
    ) -> PortageResult<Box<dyn Reader<MemoryRevision>>> {
        self.state.lock().calls.new_reader += 1;
        Ok(Box::new(MemoryReader {
            state: self.state.clone(),
            origin_files: origin_files.clone(),
        }))
    }

    fn describe(&self, origin_files: &Glob) -> Description {
        let mut description = Description::new();
        description.insert("type".into(), BTreeSet::from(["memory.origin".to_string()]));
        description.insert(
            "origin_files".into(),
            origin_files.includes().into_iter().map(String::from).collect(),
        );
        description
    }

    fn label_name(&self) -> String {
        ORIGIN_LABEL.to_string()
    }
}

struct MemoryReader {
    state: Arc<Mutex<OriginState>>,
    origin_files: Glob,
}

impl Reader<MemoryRevision> for MemoryReader {
    fn changes(
        &self,
        from: Option<&MemoryRevision>,
        to: &MemoryRevision,
    ) -> PortageResult<ChangesResponse<MemoryRevision>> {
        let mut state = self.state.lock();
        state.calls.changes += 1;
        let end = state.index_of(&to.id)?;
        let start = match from {
            Some(from) => state.index_of(&from.id)? + 1,
            None => 0,
        };
        if start > end {
            return Ok(ChangesResponse::NoChanges);
        }
        let changes = state.commits[start..=end]
            .iter()
            .map(|c| c.change.clone())
            .collect();
        Ok(ChangesResponse::for_changes(changes))
    }

    fn change(&self, revision: &MemoryRevision) -> PortageResult<Change<MemoryRevision>> {
        let mut state = self.state.lock();
        state.calls.change += 1;
        let index = state.index_of(&revision.id)?;
        let mut change = state.commits[index].change.clone();
        change.revision = revision.clone();
        Ok(change)
    }

    fn checkout(&self, revision: &MemoryRevision, workdir: &Path) -> PortageResult<()> {
        let tree = {
            let mut state = self.state.lock();
            state.calls.checkout += 1;
            let index = state.index_of(&revision.id)?;
            state.commits[index].tree.clone()
        };
        for (path, content) in tree.iter().filter(|(p, _)| self.origin_files.matches(p)) {
            let target = workdir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, content)?;
        }
        Ok(())
    }

    fn find_baseline(
        &self,
        start: &MemoryRevision,
        label: &str,
    ) -> PortageResult<Option<Baseline<MemoryRevision>>> {
        let mut state = self.state.lock();
        state.calls.find_baseline += 1;
        let index = state.index_of(&start.id)?;
        let baseline = state.commits[..index].iter().rev().find_map(|c| {
            c.change.label(label).map(|destination| Baseline {
                destination: destination.to_string(),
                origin: Some(c.change.revision.clone()),
            })
        });
        Ok(baseline)
    }
}

// ── Destination ──────────────────────────────────────────────────────

/// How often each destination operation was called
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DestinationCalls {
    pub new_writer: usize,
    pub status_queries: usize,
    pub writes: usize,
}

/// A write that landed in the destination
#[derive(Clone, Debug)]
pub struct MemoryWrite {
    pub result: TransformResult,
    /// Transformed tree, relative paths with `/` separators
    pub files: BTreeMap<String, String>,
    pub kind: EffectKind,
    pub destination_ref: MemoryRevision,
}

#[derive(Debug, Default)]
struct DestinationState {
    writes: Vec<MemoryWrite>,
    by_identity: BTreeMap<String, MemoryRevision>,
    status: Option<DestinationStatus>,
    calls: DestinationCalls,
    fail_on_write: Option<usize>,
    next_id: usize,
}

/// Records writes and tracks the last migrated origin revision
#[derive(Clone, Debug, Default)]
pub struct MemoryDestination {
    state: Arc<Mutex<DestinationState>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination that already records `baseline` as last migrated
    pub fn with_baseline(baseline: impl Into<String>) -> Self {
        let destination = Self::new();
        destination.set_status(Some(DestinationStatus::new(baseline)));
        destination
    }

    /// Replace the recorded status, e.g. to simulate drift
    pub fn set_status(&self, status: Option<DestinationStatus>) {
        self.state.lock().status = status;
    }

    pub fn status(&self) -> Option<DestinationStatus> {
        self.state.lock().status.clone()
    }

    /// Make the `nth` write call (1-based) fail
    pub fn fail_on_write(&self, nth: usize) {
        self.state.lock().fail_on_write = Some(nth);
    }

    /// Writes that landed, in order. Dry-run writes are not recorded.
    pub fn writes(&self) -> Vec<MemoryWrite> {
        self.state.lock().writes.clone()
    }

    pub fn calls(&self) -> DestinationCalls {
        self.state.lock().calls
    }
}

impl Destination for MemoryDestination {
    type Revision = MemoryRevision;

    fn new_writer<R: Revision>(
        &self,
        context: &WriterContext<R>,
    ) -> PortageResult<Box<dyn Writer<MemoryRevision>>> {
        self.state.lock().calls.new_writer += 1;
        tracing::debug!(
            workflow = %context.workflow_name,
            resolved = %context.resolved.as_string(),
            dry_run = context.dry_run,
            "Opening memory writer"
        );
        Ok(Box::new(MemoryWriter {
            state: self.state.clone(),
            dry_run: context.dry_run,
        }))
    }

    fn describe(&self, destination_files: &Glob) -> Description {
        let mut description = Description::new();
        description.insert(
            "type".into(),
            BTreeSet::from(["memory.destination".to_string()]),
        );
        description.insert(
            "destination_files".into(),
            destination_files.includes().into_iter().map(String::from).collect(),
        );
        description
    }
}

struct MemoryWriter {
    state: Arc<Mutex<DestinationState>>,
    dry_run: bool,
}

impl Writer<MemoryRevision> for MemoryWriter {
    fn destination_status(
        &self,
        _destination_files: &Glob,
        _origin_label: &str,
    ) -> PortageResult<Option<DestinationStatus>> {
        let mut state = self.state.lock();
        state.calls.status_queries += 1;
        Ok(state.status.clone())
    }

    fn write(
        &mut self,
        result: &TransformResult,
    ) -> PortageResult<Vec<DestinationEffect<MemoryRevision>>> {
        let mut state = self.state.lock();
        state.calls.writes += 1;
        if state.fail_on_write == Some(state.calls.writes) {
            return Err(PortageError::repository(format!(
                "Write of '{}' rejected by destination",
                result.origin_ref
            )));
        }

        let origin_refs = vec![result.origin_ref.clone()];
        if self.dry_run || result.dry_run {
            return Ok(vec![DestinationEffect::new(
                EffectKind::Noop,
                format!("Dry run: {}", result.summary()),
                origin_refs,
            )]);
        }

        let files = read_text_tree(&result.path)?;
        let existing = state.by_identity.get(&result.identity).cloned();
        let (kind, destination_ref) = match existing {
            Some(existing) => (EffectKind::Updated, existing),
            None => {
                state.next_id += 1;
                let created = MemoryRevision::new(format!("d{}", state.next_id));
                state
                    .by_identity
                    .insert(result.identity.clone(), created.clone());
                (EffectKind::Created, created)
            }
        };

        // Change requests are reviews on top of a baseline; they do not
        // advance what the destination considers migrated.
        if result.baseline.is_none() {
            state.status = Some(DestinationStatus::new(result.origin_ref.clone()));
        }
        state.writes.push(MemoryWrite {
            result: result.clone(),
            files,
            kind,
            destination_ref: destination_ref.clone(),
        });

        Ok(vec![DestinationEffect::new(kind, result.summary(), origin_refs)
            .with_destination_ref(destination_ref)])
    }
}

fn read_text_tree(root: &Path) -> PortageResult<BTreeMap<String, String>> {
    Ok(tree::read_tree(root)?
        .into_iter()
        .map(|(path, content)| (path, String::from_utf8_lossy(&content).into_owned()))
        .collect())
}

// ── Transformation ───────────────────────────────────────────────────

/// Leaves the checkout untouched
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTransformation;

impl Transformation for NoopTransformation {
    fn transform(&self, _work: &mut TransformWork) -> PortageResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "noop".to_string()
    }
}
