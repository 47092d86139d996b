//! Mode strategies: the read → transform → write pipeline per mode
//!
//! | Mode | Reads | Writes |
//! |---|---|---|
//! | ITERATIVE | every change since the last migration | one write per change, in order |
//! | SQUASH | every change since the last migration | one write for the whole range |
//! | CHANGE_REQUEST | the requested reference only | one write against its baseline |
//! | CHECK_LAST_REV_STATE | as SQUASH | as SQUASH, after verifying the destination |
//!
//! A failure aborts the rest of the pipeline. Iterative runs keep the writes
//! that completed before the failure; the other modes write once, at the end.
//!
//! The last-revision state check compares the revision a run started from
//! with what the destination reports just before writing. Without a
//! `--last-rev` override both come from the same destination status, so the
//! check only fails when the override disagrees with the destination or the
//! destination moved while the run was in progress.

use crate::options::{CHANGE_REQUEST_PARENT_FLAG, INIT_HISTORY_FLAG, LAST_REVISION_FLAG};
use crate::run_helper::{MigrationRequest, WorkflowRunHelper};
use portage_types::{
    Baseline, Change, Destination, DestinationEffect, Metadata, Origin, PortageError,
    PortageResult, Revision, WorkflowMode,
};

/// Message used for squashed writes before transformations run
pub const SQUASH_MESSAGE: &str = "Project import generated by Portage.\n";

type Effects<D> = Vec<DestinationEffect<<D as Destination>::Revision>>;

/// Run the pipeline for `mode`
pub fn run<O: Origin, D: Destination>(
    mode: WorkflowMode,
    helper: &mut WorkflowRunHelper<'_, O, D>,
) -> PortageResult<Effects<D>> {
    match mode {
        WorkflowMode::Iterative => run_iterative(helper),
        WorkflowMode::Squash => run_squash(helper, false),
        WorkflowMode::ChangeRequest => run_change_request(helper),
        WorkflowMode::CheckLastRevState => run_squash(helper, true),
    }
}

fn run_iterative<O: Origin, D: Destination>(
    helper: &mut WorkflowRunHelper<'_, O, D>,
) -> PortageResult<Effects<D>> {
    let workflow = helper.workflow();
    let options = workflow.options();
    let console = workflow.general().console();
    let resolved = helper.resolved_ref().clone();

    let last_rev = if options.init_history {
        console.info("Initializing history from the first origin change");
        None
    } else {
        Some(helper.last_rev()?.ok_or_else(|| {
            PortageError::Validation(format!(
                "Could not find the last migrated revision in the destination. Use {} to set it \
                 or {} to migrate from the beginning of history",
                LAST_REVISION_FLAG, INIT_HISTORY_FLAG
            ))
        })?)
    };

    let changes = helper.changes(last_rev.as_ref(), &resolved)?;
    if changes.is_empty() {
        return Err(PortageError::EmptyChange(format!(
            "No new changes to import for resolved ref: {}",
            resolved.as_string()
        )));
    }
    let changes = changes.into_changes();

    if options.check_last_rev_state {
        helper.verify_last_rev_state(last_rev.as_ref())?;
    }

    let limit = options.iterative_limit_changes.unwrap_or(usize::MAX);
    let total = changes.len();
    let mut previous = last_rev;
    let mut migrated = 0usize;
    let mut effects = Vec::new();

    for (index, change) in changes.iter().enumerate() {
        if migrated >= limit {
            console.info(&format!(
                "Stopping after {} changes ({} pending)",
                migrated,
                total - index
            ));
            break;
        }
        let migrator = helper.migrator_for_change(change);
        if migrator.should_skip_change(change) {
            console.info(&format!(
                "Skipping {}: no files match origin_files",
                change.reference()
            ));
            continue;
        }
        console.progress(&format!(
            "Change {} of {} ({}): {}",
            index + 1,
            total,
            change.reference(),
            change.first_line()
        ));

        let metadata = Metadata::new(
            workflow.authoring().resolve(&change.author),
            change.message.clone(),
        );
        let request = MigrationRequest::new(change.revision.clone(), metadata, vec![change.clone()])
            .with_last_rev(previous.take());
        effects.extend(migrator.migrate(request)?);

        previous = Some(change.revision.clone());
        migrated += 1;
    }

    if migrated == 0 {
        return Err(PortageError::EmptyChange(format!(
            "Iterative workflow produced no changes in the destination for resolved ref: {}",
            resolved.as_string()
        )));
    }
    Ok(effects)
}

fn run_squash<O: Origin, D: Destination>(
    helper: &mut WorkflowRunHelper<'_, O, D>,
    always_verify: bool,
) -> PortageResult<Effects<D>> {
    let workflow = helper.workflow();
    let options = workflow.options();
    let console = workflow.general().console();
    let force = helper.is_force();
    let resolved = helper.resolved_ref().clone();

    let last_rev = if options.init_history {
        None
    } else {
        let last_rev = helper.last_rev()?;
        if last_rev.is_none() {
            console.warn("Cannot find the last migrated revision, migrating from the beginning of history");
        }
        last_rev
    };

    if let Some(last) = &last_rev {
        if last.as_string() == resolved.as_string() && !force {
            return Err(PortageError::EmptyChange(format!(
                "'{}' has already been migrated",
                resolved.as_string()
            )));
        }
    }

    let changes = helper.changes(last_rev.as_ref(), &resolved)?.into_changes();
    let mut pending: Vec<Change<O::Revision>> = Vec::with_capacity(changes.len());
    for change in changes {
        if !helper.migrator_for_change(&change).should_skip_change(&change) {
            pending.push(change);
        }
    }
    if pending.is_empty() && !force {
        return Err(PortageError::EmptyChange(format!(
            "No changes affecting origin_files up to {}",
            resolved.as_string()
        )));
    }

    if always_verify || options.check_last_rev_state {
        helper.verify_last_rev_state(last_rev.as_ref())?;
    }

    console.progress(&format!(
        "Squashing {} change(s) up to {}",
        pending.len(),
        resolved.as_string()
    ));
    let metadata = Metadata::new(workflow.authoring().default_author.clone(), SQUASH_MESSAGE);
    let request = MigrationRequest::new(resolved, metadata, pending).with_last_rev(last_rev);
    helper.migrator().migrate(request)
}

fn run_change_request<O: Origin, D: Destination>(
    helper: &mut WorkflowRunHelper<'_, O, D>,
) -> PortageResult<Effects<D>> {
    let workflow = helper.workflow();
    let resolved = helper.resolved_ref().clone();
    let change = helper.change(&resolved)?;

    let baseline = match &workflow.options().change_request_parent {
        Some(parent) => Baseline {
            destination: parent.clone(),
            origin: None,
        },
        None => helper.find_baseline(&resolved)?.ok_or_else(|| {
            PortageError::Validation(format!(
                "Cannot find a parent of '{}' that was migrated from the destination \
                 (label '{}'). Use {} to set the baseline",
                resolved.as_string(),
                workflow.origin().label_name(),
                CHANGE_REQUEST_PARENT_FLAG
            ))
        })?,
    };

    let force = helper.is_force();
    let migrator = helper.migrator_for_change(&change);
    if migrator.should_skip_change(&change) && !force {
        return Err(PortageError::EmptyChange(format!(
            "Change '{}' doesn't include any files matching origin_files",
            change.reference()
        )));
    }

    workflow.general().console().progress(&format!(
        "Creating change request for {} on top of {}",
        resolved.as_string(),
        baseline.destination
    ));
    let metadata = Metadata::new(
        workflow.authoring().resolve(&change.author),
        change.message.clone(),
    );
    let request = MigrationRequest::new(resolved, metadata, vec![change])
        .with_last_rev(baseline.origin)
        .with_destination_baseline(baseline.destination);
    migrator.migrate(request)
}
