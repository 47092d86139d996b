//! Workflow run helper: everything one invocation needs
//!
//! A [`WorkflowRunHelper`] binds the resolved origin revision, the opened
//! reader and writer, and the optional working directory for a single run.
//! Mode strategies use it to read history and obtain a [`ChangeMigrator`]
//! per change; the migrator decides whether a change is skipped and performs
//! the checkout → transform → write sequence.
//!
//! Info requests build a helper without a working directory: they only
//! consult skip decisions and never touch the filesystem.

use crate::action::{EffectSummary, MigrationSummary};
use crate::monitor::{ChangeMigrationFinishedEvent, ChangeMigrationStartedEvent};
use crate::options::GeneralOptions;
use crate::tree;
use crate::workflow::Workflow;
use portage_types::{
    Baseline, Change, ChangeSummary, ChangesResponse, Destination, DestinationEffect,
    DestinationStatus, Metadata, Origin, PortageError, PortageResult, Reader, Revision,
    TransformResult, TransformWork, Transformation, Writer,
};
use std::path::{Path, PathBuf};

const CHECK_LAST_REV_STATE_TASK: &str = "destination.check_last_rev_state";

type OriginRev<O> = <O as Origin>::Revision;
type DestinationRev<D> = <D as Destination>::Revision;

/// Per-invocation context for a workflow run
pub struct WorkflowRunHelper<'w, O: Origin, D: Destination> {
    workflow: &'w Workflow<O, D>,
    workdir: Option<PathBuf>,
    resolved_ref: OriginRev<O>,
    reader: Box<dyn Reader<OriginRev<O>>>,
    writer: Box<dyn Writer<DestinationRev<D>>>,
}

impl<'w, O: Origin, D: Destination> WorkflowRunHelper<'w, O, D> {
    pub fn new(
        workflow: &'w Workflow<O, D>,
        workdir: Option<PathBuf>,
        resolved_ref: OriginRev<O>,
        reader: Box<dyn Reader<OriginRev<O>>>,
        writer: Box<dyn Writer<DestinationRev<D>>>,
    ) -> Self {
        Self {
            workflow,
            workdir,
            resolved_ref,
            reader,
            writer,
        }
    }

    pub fn workflow(&self) -> &'w Workflow<O, D> {
        self.workflow
    }

    pub fn resolved_ref(&self) -> &OriginRev<O> {
        &self.resolved_ref
    }

    pub fn is_force(&self) -> bool {
        self.workflow.general().force
    }

    /// Destination record of the last migration
    pub fn destination_status(&self) -> PortageResult<Option<DestinationStatus>> {
        let workflow = self.workflow;
        workflow.general().repo_task("destination.previous_ref", || {
            self.writer
                .destination_status(workflow.destination_files(), &workflow.origin().label_name())
        })
    }

    /// Last migrated origin revision
    ///
    /// The last-revision override wins; otherwise the destination status
    /// baseline is resolved through the origin. `None` means nothing was
    /// migrated yet.
    pub fn last_rev(&self) -> PortageResult<Option<OriginRev<O>>> {
        let workflow = self.workflow;
        let baseline = match &workflow.options().last_revision {
            Some(reference) => reference.clone(),
            None => match self.destination_status()? {
                Some(status) => status.baseline,
                None => return Ok(None),
            },
        };
        workflow
            .general()
            .repo_task("origin.resolve_last_rev", || {
                workflow.origin().resolve(Some(&baseline))
            })
            .map(Some)
    }

    /// Changes in `(from, to]`, oldest first
    pub fn changes(
        &self,
        from: Option<&OriginRev<O>>,
        to: &OriginRev<O>,
    ) -> PortageResult<ChangesResponse<OriginRev<O>>> {
        self.workflow
            .general()
            .repo_task("origin.changes", || self.reader.changes(from, to))
    }

    pub fn change(&self, revision: &OriginRev<O>) -> PortageResult<Change<OriginRev<O>>> {
        self.workflow
            .general()
            .repo_task("origin.change", || self.reader.change(revision))
    }

    /// Closest ancestor of `start` that records the destination revision it
    /// came from
    pub fn find_baseline(
        &self,
        start: &OriginRev<O>,
    ) -> PortageResult<Option<Baseline<OriginRev<O>>>> {
        let label = self.workflow.origin().label_name();
        self.workflow
            .general()
            .repo_task("origin.find_baseline", || self.reader.find_baseline(start, &label))
    }

    /// Fail unless the destination still reports `expected` as the last
    /// migrated revision
    pub fn verify_last_rev_state(&self, expected: Option<&OriginRev<O>>) -> PortageResult<()> {
        let workflow = self.workflow;
        let general = workflow.general();
        let Some(expected) = expected else {
            general
                .console()
                .warn("No previous migration recorded, skipping the last revision state check");
            return Ok(());
        };

        let status = general.repo_task(CHECK_LAST_REV_STATE_TASK, || {
            self.writer
                .destination_status(workflow.destination_files(), &workflow.origin().label_name())
        })?;
        let status = status.ok_or_else(|| {
            PortageError::repository_in(
                CHECK_LAST_REV_STATE_TASK,
                format!(
                    "Destination no longer records a migrated revision, expected '{}'",
                    expected.as_string()
                ),
            )
        })?;
        let actual = general.repo_task("origin.resolve_last_rev", || {
            workflow.origin().resolve(Some(&status.baseline))
        })?;

        if actual.as_string() != expected.as_string() {
            return Err(PortageError::repository_in(
                CHECK_LAST_REV_STATE_TASK,
                format!(
                    "Destination state drifted: expected last migrated revision '{}' but the destination reports '{}'",
                    expected.as_string(),
                    actual.as_string()
                ),
            ));
        }
        tracing::debug!(revision = %expected.as_string(), "Last revision state verified");
        Ok(())
    }

    /// Migrator for the resolved reference as a whole
    pub fn migrator(&mut self) -> ChangeMigrator<'_, 'w, O, D> {
        let origin_ref = self.resolved_ref.as_string();
        ChangeMigrator {
            helper: self,
            origin_ref,
        }
    }

    /// Migrator for one origin change
    pub fn migrator_for_change(
        &mut self,
        change: &Change<OriginRev<O>>,
    ) -> ChangeMigrator<'_, 'w, O, D> {
        ChangeMigrator {
            helper: self,
            origin_ref: change.reference(),
        }
    }
}

/// What a single destination write should contain
#[derive(Clone, Debug)]
pub struct MigrationRequest<R> {
    /// Origin revision to check out
    pub revision: R,
    /// Previously migrated revision, if any
    pub last_rev: Option<R>,
    pub metadata: Metadata,
    /// Origin changes folded into this write, oldest first
    pub changes: Vec<Change<R>>,
    /// Destination revision to write on top of
    pub destination_baseline: Option<String>,
}

impl<R: Revision> MigrationRequest<R> {
    pub fn new(revision: R, metadata: Metadata, changes: Vec<Change<R>>) -> Self {
        Self {
            revision,
            last_rev: None,
            metadata,
            changes,
            destination_baseline: None,
        }
    }

    pub fn with_last_rev(mut self, last_rev: Option<R>) -> Self {
        self.last_rev = last_rev;
        self
    }

    pub fn with_destination_baseline(mut self, baseline: impl Into<String>) -> Self {
        self.destination_baseline = Some(baseline.into());
        self
    }
}

/// Skip policy and write pipeline for one change
pub struct ChangeMigrator<'h, 'w, O: Origin, D: Destination> {
    helper: &'h mut WorkflowRunHelper<'w, O, D>,
    origin_ref: String,
}

impl<O: Origin, D: Destination> ChangeMigrator<'_, '_, O, D> {
    /// Whether `change` should be left out of the migration
    ///
    /// With migrate-noop-changes set nothing is skipped. Otherwise a change
    /// is skipped when its touched files are known and none of them match
    /// the origin glob, because it would be empty after transformation.
    pub fn should_skip_change(&self, change: &Change<OriginRev<O>>) -> bool {
        let workflow = self.helper.workflow;
        if workflow.is_migrate_noop_changes() {
            return false;
        }
        let Some(files) = &change.changed_files else {
            return false;
        };
        let skip = !files.iter().any(|f| workflow.origin_files().matches(f));
        if skip {
            tracing::debug!(
                change = %self.origin_ref,
                "Skipping change: no files match origin_files"
            );
        }
        skip
    }

    /// Check out, transform and write one change
    pub fn migrate(
        self,
        request: MigrationRequest<OriginRev<O>>,
    ) -> PortageResult<Vec<DestinationEffect<DestinationRev<D>>>> {
        let helper = self.helper;
        let workflow = helper.workflow;
        let general = workflow.general();
        let dry_run = workflow.options().dry_run;
        let origin_ref = request.revision.as_string();

        general
            .event_monitor()
            .on_change_migration_started(&ChangeMigrationStartedEvent {
                workflow_name: workflow.name().to_string(),
                origin_ref: origin_ref.clone(),
            });

        let workdir = helper.workdir.as_deref().ok_or_else(|| {
            PortageError::Invocation("A working directory is required to migrate changes".into())
        })?;
        let checkout_dir = workdir.join("checkout");
        prepare_checkout_dir(&checkout_dir)?;

        general.repo_task("origin.checkout", || {
            helper.reader.checkout(&request.revision, &checkout_dir)
        })?;

        let mut work = TransformWork::new(
            checkout_dir.clone(),
            request.metadata,
            request.changes.iter().map(ChangeSummary::from).collect(),
            helper.resolved_ref.as_string(),
        );
        if general.verbose {
            general.console().info(&format!(
                "Applying transformation: {}",
                workflow.transformation().describe()
            ));
        }
        let original_dir = workdir.join("original");
        if workflow.reverse_transform_for_check().is_some() {
            tree::copy_tree(&checkout_dir, &original_dir)?;
        }
        {
            let _transforms = general.profiler().start("transforms");
            workflow.transformation().transform(&mut work)?;
        }
        if let Some(reverse) = workflow.reverse_transform_for_check() {
            check_reverse_transform(&work, reverse, workdir, &original_dir, general)?;
        }

        if workflow.is_ask_for_confirmation() && !dry_run {
            let question = format!(
                "Proceed with migrating '{}' to {:?}?",
                origin_ref,
                workflow.destination()
            );
            if !general.console().prompt_confirmation(&question) {
                return Err(PortageError::Validation(
                    "User aborted execution: the migration was not confirmed".into(),
                ));
            }
        }

        let identity = workflow.migration_identity(&request.revision, &work);
        let result = TransformResult {
            path: checkout_dir,
            origin_ref: origin_ref.clone(),
            context_reference: request.revision.context_reference().map(str::to_string),
            author: work.metadata.author,
            message: work.metadata.message,
            identity: identity.clone(),
            workflow_name: workflow.name().to_string(),
            baseline: request.destination_baseline,
            origin_label: workflow.origin().label_name(),
            set_rev_id: workflow.is_set_rev_id(),
            smart_prune: workflow.is_smart_prune(),
            dry_run,
        };

        let effects = general.repo_task("destination.write", || helper.writer.write(&result))?;
        tracing::info!(
            workflow = %workflow.name(),
            origin_ref = %origin_ref,
            identity = %identity,
            effects = effects.len(),
            "Change migrated"
        );

        if !workflow.after_migration_actions().is_empty() {
            let summary = MigrationSummary {
                workflow_name: workflow.name().to_string(),
                origin_ref: origin_ref.clone(),
                identity,
                dry_run,
                effects: effects.iter().map(EffectSummary::from).collect(),
            };
            for action in workflow.after_migration_actions() {
                general.repo_task(&format!("action/{}", action.name()), || action.run(&summary))?;
            }
        }

        general
            .event_monitor()
            .on_change_migration_finished(&ChangeMigrationFinishedEvent {
                workflow_name: workflow.name().to_string(),
                origin_ref,
                effects: effects.iter().map(|e| e.kind).collect(),
            });
        Ok(effects)
    }
}

/// Apply `reverse` to a copy of the transformed tree and fail unless it
/// reproduces the original checkout
fn check_reverse_transform(
    work: &TransformWork,
    reverse: &dyn Transformation,
    workdir: &Path,
    original_dir: &Path,
    general: &GeneralOptions,
) -> PortageResult<()> {
    let _check = general.profiler().start("reverse_transform_check");
    let reverse_dir = workdir.join("reverse");
    tree::copy_tree(work.checkout_dir(), &reverse_dir)?;

    let mut reverse_work = TransformWork::new(
        reverse_dir.clone(),
        work.metadata.clone(),
        work.current.clone(),
        work.resolved_reference.clone(),
    );
    reverse.transform(&mut reverse_work)?;

    let original = tree::read_tree(original_dir)?;
    let restored = tree::read_tree(&reverse_dir)?;
    let differences = tree::diff_trees(&original, &restored);
    if !differences.is_empty() {
        return Err(PortageError::Validation(format!(
            "Reverse transformation '{}' does not restore the origin files: {}",
            reverse.describe(),
            differences.join(", ")
        )));
    }
    tracing::debug!(reverse = %reverse.describe(), "Reverse transformation check passed");
    Ok(())
}

/// Start every write from an empty checkout directory
fn prepare_checkout_dir(dir: &Path) -> PortageResult<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
