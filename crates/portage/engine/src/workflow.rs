//! Workflow orchestrator
//!
//! A [`Workflow`] is one configured migration between an origin and a
//! destination. [`Workflow::run`] validates the invocation, resolves the
//! requested reference, and hands a [`WorkflowRunHelper`] to the strategy
//! for the configured mode. [`Workflow::info`] answers "what is pending"
//! without writing anything.

use crate::action::AfterMigrationAction;
use crate::identity::{self, IdentityInputs};
use crate::monitor::{MigrationFinishedEvent, MigrationOutcome, MigrationStartedEvent};
use crate::options::{GeneralOptions, WorkflowOptions, CHECK_LAST_REV_STATE_FLAG, INIT_HISTORY_FLAG};
use crate::run_helper::WorkflowRunHelper;
use crate::strategy;
use portage_types::{
    check_condition, Author, Authoring, ConfigFile, Description, Destination, DestinationEffect,
    Glob, IdentityTemplate, Info, LabelSource, MigrationReference, Origin, PortageError,
    PortageResult, Revision, Transformation, WorkflowMode, WriterContext,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

type ConfigFilesSupplier = Box<dyn Fn() -> BTreeMap<String, ConfigFile> + Send + Sync>;

/// A configured origin → destination migration
pub struct Workflow<O: Origin, D: Destination> {
    name: String,
    origin: O,
    destination: D,
    authoring: Authoring,
    transformation: Box<dyn Transformation>,
    reverse_transform_for_check: Option<Box<dyn Transformation>>,
    origin_files: Glob,
    destination_files: Glob,
    mode: WorkflowMode,
    options: WorkflowOptions,
    general: GeneralOptions,
    ask_for_confirmation: bool,
    main_config_file: ConfigFile,
    all_config_files: ConfigFilesSupplier,
    config_files_cache: OnceLock<BTreeMap<String, ConfigFile>>,
    after_migration_actions: Vec<Box<dyn AfterMigrationAction>>,
    change_identity: IdentityTemplate,
    set_rev_id: bool,
    smart_prune: bool,
    migrate_noop_changes: bool,
}

impl<O: Origin, D: Destination> Workflow<O, D> {
    pub fn builder(
        name: impl Into<String>,
        origin: O,
        destination: D,
        transformation: impl Transformation + 'static,
        main_config_file: ConfigFile,
    ) -> WorkflowBuilder<O, D> {
        WorkflowBuilder::new(name, origin, destination, transformation, main_config_file)
    }

    // ── Run ──────────────────────────────────────────────────────────

    /// Migrate the requested reference (or the origin's latest when
    /// `source_refs` is empty)
    pub fn run(
        &self,
        workdir: &Path,
        source_refs: &[&str],
    ) -> PortageResult<Vec<DestinationEffect<D::Revision>>> {
        if source_refs.len() > 1 {
            return Err(PortageError::Invocation(format!(
                "Workflow does not support multiple source_ref arguments yet: {:?}",
                source_refs
            )));
        }
        self.validate_flags()?;

        let general = &self.general;
        let _run = general.profiler().start(&format!("run/{}", self.name));
        let raw_source_ref = source_refs.first().map(|r| r.to_string());

        general.console().progress(&format!(
            "Running workflow '{}' in {} mode",
            self.name, self.mode
        ));
        let resolved = general.repo_task("origin.resolve_source_ref", || {
            self.origin.resolve(raw_source_ref.as_deref())
        })?;

        tracing::info!(
            workflow = %self.name,
            mode = %self.mode,
            resolved = %resolved.as_string(),
            "Running migration"
        );
        tracing::debug!(workflow = %self.name, config = %self.snapshot(), "Workflow configuration");
        if general.verbose {
            general
                .console()
                .info(&format!("Workflow configuration: {}", self.snapshot()));
        }

        general
            .event_monitor()
            .on_migration_started(&MigrationStartedEvent {
                workflow_name: self.name.clone(),
                mode: self.mode.to_string(),
                resolved_reference: resolved.as_string(),
            });

        let result = self.run_resolved(workdir, resolved);

        let outcome = match &result {
            Ok(_) => MigrationOutcome::Success,
            Err(e) if e.is_empty_change() => MigrationOutcome::NoOp,
            Err(_) => MigrationOutcome::Failed,
        };
        general
            .event_monitor()
            .on_migration_finished(&MigrationFinishedEvent {
                workflow_name: self.name.clone(),
                outcome,
            });
        result
    }

    fn run_resolved(
        &self,
        workdir: &Path,
        resolved: O::Revision,
    ) -> PortageResult<Vec<DestinationEffect<D::Revision>>> {
        let mut helper =
            self.new_run_helper(Some(workdir.to_path_buf()), resolved, self.options.dry_run)?;
        let _mode = self.general.profiler().start(&self.mode.task_name());
        strategy::run(self.mode, &mut helper)
    }

    /// Reject flag combinations the configured mode cannot honour
    ///
    /// Runs before any repository access.
    pub fn validate_flags(&self) -> PortageResult<()> {
        if self.mode == WorkflowMode::ChangeRequest {
            check_condition(!self.options.init_history, || {
                format!("{} is not compatible with {}", INIT_HISTORY_FLAG, self.mode)
            })?;
            check_condition(!self.options.check_last_rev_state, || {
                format!(
                    "{} is not compatible with {}",
                    CHECK_LAST_REV_STATE_FLAG, self.mode
                )
            })?;
        }
        Ok(())
    }

    /// Open a reader and writer for `resolved`
    pub fn new_run_helper(
        &self,
        workdir: Option<PathBuf>,
        resolved: O::Revision,
        dry_run: bool,
    ) -> PortageResult<WorkflowRunHelper<'_, O, D>> {
        let reader = self.general.repo_task("origin.new_reader", || {
            self.origin.new_reader(&self.origin_files, &self.authoring)
        })?;
        let context = WriterContext::new(
            self.name.clone(),
            self.options.identity_owner.clone(),
            dry_run,
            resolved.clone(),
        );
        let writer = self
            .general
            .repo_task("destination.new_writer", || self.destination.new_writer(&context))?;
        Ok(WorkflowRunHelper::new(self, workdir, resolved, reader, writer))
    }

    // ── Info ─────────────────────────────────────────────────────────

    /// Last migrated revision and the changes still pending
    ///
    /// Read-only: nothing is written and no working directory is used.
    pub fn info(&self) -> PortageResult<Info<O::Revision>> {
        let general = &self.general;
        general.repo_task("info", || {
            let last_resolved =
                general.repo_task("origin.last_resolved", || self.origin.resolve(None))?;
            let mut helper = self.new_run_helper(None, last_resolved.clone(), true)?;

            let baseline = match &self.options.last_revision {
                Some(reference) => Some(reference.clone()),
                None => helper.destination_status()?.map(|status| status.baseline),
            };
            let last_migrated = match baseline {
                Some(baseline) => Some(general.repo_task("origin.last_migrated", || {
                    self.origin.resolve(Some(&baseline))
                })?),
                None => None,
            };

            let changes = helper
                .changes(last_migrated.as_ref(), &last_resolved)?
                .into_changes();
            let available: Vec<_> = changes
                .into_iter()
                .filter(|change| !helper.migrator_for_change(change).should_skip_change(change))
                .collect();

            tracing::debug!(
                workflow = %self.name,
                last_migrated = ?last_migrated.as_ref().map(Revision::as_string),
                pending = available.len(),
                "Migration info"
            );
            Ok(Info::new(vec![MigrationReference::new(
                format!("workflow_{}", self.name),
                last_migrated,
                available,
            )]))
        })
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Stable identity for migrating `requested`
    ///
    /// `labels` resolves `${label:NAME}` variables of a custom identity
    /// template. A missing label warns on the console and falls back to the
    /// default algorithm.
    pub fn migration_identity<R: Revision>(&self, requested: &R, labels: &dyn LabelSource) -> String {
        let reference = identity::reference_component(requested, self.mode);
        let inputs = IdentityInputs {
            reference: &reference,
            workflow_name: &self.name,
            config_path: self.main_config_file.identifier(),
            identity_owner: self.options.identity_owner.as_deref(),
        };
        identity::compute_identity(self.change_identity.tokens(), &inputs, labels, |label| {
            self.general.console().warn(&format!(
                "Couldn't find label '{}'. Using the default identity algorithm",
                label
            ))
        })
    }

    // ── Reporting ────────────────────────────────────────────────────

    /// Named configuration fields, for logs and diagnostics
    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            name: self.name.clone(),
            mode: self.mode,
            origin: format!("{:?}", self.origin),
            destination: format!("{:?}", self.destination),
            origin_files: self.origin_files.to_string(),
            destination_files: self.destination_files.to_string(),
            authoring: self.authoring.clone(),
            transformation: self.transformation.describe(),
            reverse_transform_for_check: self
                .reverse_transform_for_check
                .as_ref()
                .map(|reverse| reverse.describe()),
            config: self.main_config_file.identifier().to_string(),
            change_identity: (!self.change_identity.is_empty())
                .then(|| self.change_identity.to_string()),
            ask_for_confirmation: self.ask_for_confirmation,
            set_rev_id: self.set_rev_id,
            smart_prune: self.smart_prune,
            migrate_noop_changes: self.migrate_noop_changes,
            after_migration_actions: self
                .after_migration_actions
                .iter()
                .map(|a| a.name().to_string())
                .collect(),
        }
    }

    pub fn origin_description(&self) -> Description {
        self.origin.describe(&self.origin_files)
    }

    pub fn destination_description(&self) -> Description {
        self.destination.describe(&self.destination_files)
    }

    /// Identifiers of every config file the workflow was loaded from
    ///
    /// The supplier runs once; later calls reuse its answer.
    pub fn config_paths(&self) -> BTreeSet<String> {
        self.config_files_cache
            .get_or_init(|| (self.all_config_files)())
            .values()
            .map(|file| file.identifier().to_string())
            .collect()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &O {
        &self.origin
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn authoring(&self) -> &Authoring {
        &self.authoring
    }

    pub fn transformation(&self) -> &dyn Transformation {
        self.transformation.as_ref()
    }

    /// Transformation that must restore the origin files from the
    /// transformed tree, when the round trip is checked
    pub fn reverse_transform_for_check(&self) -> Option<&dyn Transformation> {
        self.reverse_transform_for_check.as_deref()
    }

    pub fn origin_files(&self) -> &Glob {
        &self.origin_files
    }

    pub fn destination_files(&self) -> &Glob {
        &self.destination_files
    }

    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    pub fn general(&self) -> &GeneralOptions {
        &self.general
    }

    pub fn main_config_file(&self) -> &ConfigFile {
        &self.main_config_file
    }

    pub fn change_identity(&self) -> &IdentityTemplate {
        &self.change_identity
    }

    pub fn after_migration_actions(&self) -> &[Box<dyn AfterMigrationAction>] {
        &self.after_migration_actions
    }

    pub fn is_ask_for_confirmation(&self) -> bool {
        self.ask_for_confirmation
    }

    pub fn is_set_rev_id(&self) -> bool {
        self.set_rev_id
    }

    pub fn is_smart_prune(&self) -> bool {
        self.smart_prune
    }

    pub fn is_migrate_noop_changes(&self) -> bool {
        self.migrate_noop_changes
    }
}

impl<O: Origin, D: Destination> std::fmt::Debug for Workflow<O, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("origin", &self.origin)
            .field("destination", &self.destination)
            .field("config", &self.main_config_file.identifier())
            .finish_non_exhaustive()
    }
}

// ── Snapshot ─────────────────────────────────────────────────────────

/// Serializable view of a workflow's configuration
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub name: String,
    pub mode: WorkflowMode,
    pub origin: String,
    pub destination: String,
    pub origin_files: String,
    pub destination_files: String,
    pub authoring: Authoring,
    pub transformation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_transform_for_check: Option<String>,
    pub config: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_identity: Option<String>,
    pub ask_for_confirmation: bool,
    pub set_rev_id: bool,
    pub smart_prune: bool,
    pub migrate_noop_changes: bool,
    pub after_migration_actions: Vec<String>,
}

impl std::fmt::Display for WorkflowSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Builder for [`Workflow`]
pub struct WorkflowBuilder<O: Origin, D: Destination> {
    workflow: Workflow<O, D>,
}

impl<O: Origin, D: Destination> WorkflowBuilder<O, D> {
    pub fn new(
        name: impl Into<String>,
        origin: O,
        destination: D,
        transformation: impl Transformation + 'static,
        main_config_file: ConfigFile,
    ) -> Self {
        let main = main_config_file.clone();
        Self {
            workflow: Workflow {
                name: name.into(),
                origin,
                destination,
                authoring: Authoring::pass_thru(default_author()),
                transformation: Box::new(transformation),
                reverse_transform_for_check: None,
                origin_files: Glob::all(),
                destination_files: Glob::all(),
                mode: WorkflowMode::Squash,
                options: WorkflowOptions::default(),
                general: GeneralOptions::default(),
                ask_for_confirmation: false,
                main_config_file,
                all_config_files: Box::new(move || {
                    BTreeMap::from([(main.identifier().to_string(), main.clone())])
                }),
                config_files_cache: OnceLock::new(),
                after_migration_actions: Vec::new(),
                change_identity: IdentityTemplate::default(),
                set_rev_id: true,
                smart_prune: false,
                migrate_noop_changes: false,
            },
        }
    }

    pub fn with_mode(mut self, mode: WorkflowMode) -> Self {
        self.workflow.mode = mode;
        self
    }

    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.workflow.options = options;
        self
    }

    pub fn with_general_options(mut self, general: GeneralOptions) -> Self {
        self.workflow.general = general;
        self
    }

    pub fn with_authoring(mut self, authoring: Authoring) -> Self {
        self.workflow.authoring = authoring;
        self
    }

    pub fn with_origin_files(mut self, origin_files: Glob) -> Self {
        self.workflow.origin_files = origin_files;
        self
    }

    pub fn with_destination_files(mut self, destination_files: Glob) -> Self {
        self.workflow.destination_files = destination_files;
        self
    }

    /// Verify every migration by applying `reverse` to the transformed
    /// tree and comparing the result with the origin checkout
    pub fn with_reverse_transform_for_check(
        mut self,
        reverse: impl Transformation + 'static,
    ) -> Self {
        self.workflow.reverse_transform_for_check = Some(Box::new(reverse));
        self
    }

    pub fn with_change_identity(mut self, template: IdentityTemplate) -> Self {
        self.workflow.change_identity = template;
        self
    }

    pub fn with_after_migration_action(mut self, action: impl AfterMigrationAction + 'static) -> Self {
        self.workflow.after_migration_actions.push(Box::new(action));
        self
    }

    /// Supplier for every config file the workflow depends on, evaluated
    /// on first use
    pub fn with_config_files(
        mut self,
        supplier: impl Fn() -> BTreeMap<String, ConfigFile> + Send + Sync + 'static,
    ) -> Self {
        self.workflow.all_config_files = Box::new(supplier);
        self
    }

    pub fn ask_for_confirmation(mut self, ask: bool) -> Self {
        self.workflow.ask_for_confirmation = ask;
        self
    }

    pub fn set_rev_id(mut self, set_rev_id: bool) -> Self {
        self.workflow.set_rev_id = set_rev_id;
        self
    }

    pub fn smart_prune(mut self, smart_prune: bool) -> Self {
        self.workflow.smart_prune = smart_prune;
        self
    }

    pub fn migrate_noop_changes(mut self, migrate: bool) -> Self {
        self.workflow.migrate_noop_changes = migrate;
        self
    }

    pub fn build(self) -> Workflow<O, D> {
        self.workflow
    }
}

fn default_author() -> Author {
    Author::new("Portage", "noreply@portage.invalid")
}
