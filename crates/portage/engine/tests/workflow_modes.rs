mod common;

use common::{
    ann, bob, builder, builder_with, origin_with_commits, FailingTransformation, Harness,
    PrefixContent, RecordingAction, StripContent,
};
use portage_engine::console::MessageLevel;
use portage_engine::memory::{MemoryDestination, MemoryOrigin, ORIGIN_LABEL};
use portage_engine::monitor::MigrationOutcome;
use portage_engine::{GeneralOptions, WorkflowOptions};
use portage_types::{
    Authoring, DestinationStatus, EffectKind, ErrorKind, Glob, PortageError, WorkflowMode,
};

// ── Invocation and flag validation ───────────────────────────────────

#[test]
fn test_multiple_source_refs_rejected_before_origin_access() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash).build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &["r1", "r2"]).unwrap_err();
    assert!(matches!(err, PortageError::Invocation(_)));
    assert!(err.to_string().contains("multiple source_ref"));
    assert_eq!(origin.calls().total(), 0);
    assert_eq!(destination.calls().new_writer, 0);
}

#[test]
fn test_change_request_rejects_init_history_before_origin_access() {
    let origin = origin_with_commits(1);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::ChangeRequest)
        .with_options(WorkflowOptions::new().with_init_history())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let message = err.to_string();
    assert!(message.contains("--init-history"));
    assert!(message.contains("CHANGE_REQUEST"));
    assert_eq!(origin.calls().total(), 0);
}

#[test]
fn test_change_request_rejects_check_last_rev_state() {
    let origin = origin_with_commits(1);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::ChangeRequest)
        .with_options(WorkflowOptions::new().with_check_last_rev_state())
        .build();

    let err = workflow.validate_flags().unwrap_err();
    assert!(err.to_string().contains("--check-last-rev-state"));
}

#[test]
fn test_init_history_allowed_outside_change_request() {
    let origin = origin_with_commits(1);
    let destination = MemoryDestination::new();
    for mode in [WorkflowMode::Iterative, WorkflowMode::Squash] {
        let workflow = builder(&origin, &destination, mode)
            .with_options(WorkflowOptions::new().with_init_history())
            .build();
        assert!(workflow.validate_flags().is_ok());
    }
}

// ── SQUASH ───────────────────────────────────────────────────────────

#[test]
fn test_squash_first_migration_writes_everything_once() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::new();
    let harness = Harness::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_general_options(harness.general())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let effects = workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].kind, EffectKind::Created);

    let writes = destination.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].result.origin_ref, "r3");
    assert_eq!(writes[0].files.len(), 3);
    assert_eq!(writes[0].result.message, "Project import generated by Portage.\n");
    assert_eq!(destination.status(), Some(DestinationStatus::new("r3")));

    // No previous migration is a warning, not an error
    assert!(!harness.console.messages_at(MessageLevel::Warn).is_empty());
    assert_eq!(*harness.monitor.outcomes.lock(), vec![MigrationOutcome::Success]);
}

#[test]
fn test_squash_profiler_scopes() {
    let origin = origin_with_commits(1);
    let destination = MemoryDestination::new();
    let harness = Harness::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_general_options(harness.general())
        .build();
    let workdir = tempfile::tempdir().unwrap();
    workflow.run(workdir.path(), &[]).unwrap();

    let paths = harness.listener.paths();
    for expected in [
        "run/default/origin.resolve_source_ref",
        "run/default/origin.new_reader",
        "run/default/destination.new_writer",
        "run/default/squash/destination.previous_ref",
        "run/default/squash/origin.changes",
        "run/default/squash/origin.checkout",
        "run/default/squash/transforms",
        "run/default/squash/destination.write",
        "run/default/squash",
        "run/default",
    ] {
        assert!(paths.iter().any(|p| p == expected), "missing scope {expected} in {paths:?}");
    }
    assert_eq!(paths.last().map(String::as_str), Some("run/default"));
}

#[test]
fn test_squash_already_migrated_is_empty_change() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::with_baseline("r2");
    let harness = Harness::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_general_options(harness.general())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert!(err.is_empty_change());
    assert!(destination.writes().is_empty());
    assert_eq!(*harness.monitor.outcomes.lock(), vec![MigrationOutcome::NoOp]);
}

#[test]
fn test_squash_force_rewrites_migrated_reference() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::with_baseline("r2");
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_general_options(GeneralOptions::new().with_force())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(destination.writes().len(), 1);
}

#[test]
fn test_squash_incremental_after_baseline() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::with_baseline("r1");
    let workflow = builder(&origin, &destination, WorkflowMode::Squash).build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &["r2"]).unwrap();
    let writes = destination.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].result.origin_ref, "r2");
    assert_eq!(destination.status(), Some(DestinationStatus::new("r2")));
}

#[test]
fn test_squash_all_changes_skipped_is_empty_change() {
    let origin = MemoryOrigin::new();
    origin.commit("Docs", ann(), [("docs/guide.md", "guide")]);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_origin_files(Glob::new(["src/**"], Vec::<&str>::new()).unwrap())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert!(err.is_empty_change());
    assert!(destination.writes().is_empty());
}

#[test]
fn test_squash_uses_default_author() {
    let origin = MemoryOrigin::new();
    origin.commit("Change", bob(), [("a.txt", "a")]);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_authoring(Authoring::pass_thru(ann()))
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(destination.writes()[0].result.author, ann());
}

#[test]
fn test_dry_run_writes_nothing() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_options(WorkflowOptions::new().with_dry_run())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let effects = workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(effects[0].kind, EffectKind::Noop);
    assert!(destination.writes().is_empty());
    assert!(destination.status().is_none());
    assert_eq!(destination.calls().writes, 1);
}

#[test]
fn test_declined_confirmation_aborts() {
    let origin = origin_with_commits(1);
    let destination = MemoryDestination::new();
    let harness = Harness::answering(false);
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_general_options(harness.general())
        .ask_for_confirmation(true)
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(harness.console.messages_at(MessageLevel::Prompt).len(), 1);
    assert!(destination.writes().is_empty());
}

#[test]
fn test_squash_transformation_failure_writes_nothing() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::new();
    let workflow = builder_with(
        &origin,
        &destination,
        WorkflowMode::Squash,
        FailingTransformation::on("r2"),
    )
    .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert!(matches!(err, PortageError::Transform(_)));
    assert_eq!(destination.calls().writes, 0);
    assert!(destination.writes().is_empty());
    assert!(destination.status().is_none());
}

#[test]
fn test_reverse_transform_round_trip_allows_write() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let harness = Harness::new();
    let workflow = builder_with(
        &origin,
        &destination,
        WorkflowMode::Squash,
        PrefixContent("// generated\n"),
    )
    .with_reverse_transform_for_check(StripContent("// generated\n"))
    .with_general_options(harness.general())
    .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    let writes = destination.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].files["file1.txt"], "// generated\ncontent 1");
    assert!(harness
        .listener
        .paths()
        .iter()
        .any(|p| p == "run/default/squash/reverse_transform_check"));
}

#[test]
fn test_reverse_transform_mismatch_fails_before_write() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let workflow = builder_with(
        &origin,
        &destination,
        WorkflowMode::Squash,
        PrefixContent("// generated\n"),
    )
    .with_reverse_transform_for_check(portage_engine::memory::NoopTransformation)
    .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let message = err.to_string();
    assert!(message.contains("file1.txt"));
    assert!(message.contains("file2.txt"));
    assert_eq!(destination.calls().writes, 0);
}

#[cfg(unix)]
#[test]
fn test_squash_tolerates_symlink_cycle_in_checkout() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let workflow =
        builder_with(&origin, &destination, WorkflowMode::Squash, common::LinkCycle).build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    let writes = destination.writes();
    assert_eq!(writes.len(), 1);
    let paths: Vec<_> = writes[0].files.keys().cloned().collect();
    assert_eq!(paths, vec!["file1.txt", "file2.txt"]);
}

#[test]
fn test_verbose_echoes_configuration_and_transformation() {
    let origin = origin_with_commits(1);
    let destination = MemoryDestination::new();
    let harness = Harness::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_general_options(harness.general().with_verbose())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    let info = harness.console.messages_at(MessageLevel::Info);
    assert!(info.iter().any(|m| m == "Applying transformation: noop"));
    assert!(info.iter().any(|m| m.starts_with("Workflow configuration: ")));
}

#[test]
fn test_quiet_run_does_not_echo_transformation() {
    let origin = origin_with_commits(1);
    let destination = MemoryDestination::new();
    let harness = Harness::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Squash)
        .with_general_options(harness.general())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    assert!(harness.console.messages_at(MessageLevel::Info).is_empty());
}

// ── ITERATIVE ────────────────────────────────────────────────────────

#[test]
fn test_iterative_requires_last_revision() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative).build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("--last-rev"));
    assert!(err.to_string().contains("--init-history"));
}

#[test]
fn test_iterative_init_history_writes_each_change_in_order() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::new();
    let harness = Harness::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_init_history())
        .with_general_options(harness.general())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let effects = workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(effects.len(), 3);

    let writes = destination.writes();
    let refs: Vec<_> = writes.iter().map(|w| w.result.origin_ref.as_str()).collect();
    assert_eq!(refs, vec!["r1", "r2", "r3"]);
    assert_eq!(writes[1].result.message, "Change 2");
    // Each write sees the tree as of its own change
    assert_eq!(writes[0].files.len(), 1);
    assert_eq!(writes[2].files.len(), 3);

    let identities: std::collections::BTreeSet<_> =
        writes.iter().map(|w| w.result.identity.clone()).collect();
    assert_eq!(identities.len(), 3);
    assert!(writes.iter().all(|w| w.kind == EffectKind::Created));
    assert_eq!(harness.monitor.finished_changes.lock().len(), 3);
    assert_eq!(destination.status(), Some(DestinationStatus::new("r3")));
}

#[test]
fn test_iterative_continues_from_destination_status() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::with_baseline("r1");
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative).build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    let refs: Vec<_> = destination
        .writes()
        .iter()
        .map(|w| w.result.origin_ref.clone())
        .collect();
    assert_eq!(refs, vec!["r2", "r3"]);
}

#[test]
fn test_iterative_last_revision_override() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_last_revision("r2"))
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(destination.writes().len(), 1);
    assert_eq!(destination.calls().status_queries, 0);
}

#[test]
fn test_iterative_nothing_new_is_empty_change() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::with_baseline("r2");
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative).build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert!(err.is_empty_change());
    assert!(err.to_string().contains("No new changes to import"));
}

#[test]
fn test_iterative_skips_changes_outside_origin_files() {
    let origin = MemoryOrigin::new();
    origin.commit("c1", ann(), [("src/a.rs", "a")]);
    origin.commit("c2", ann(), [("docs/readme.md", "docs")]);
    origin.commit("c3", ann(), [("src/b.rs", "b")]);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_init_history())
        .with_origin_files(Glob::new(["src/**"], Vec::<&str>::new()).unwrap())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    let writes = destination.writes();
    let refs: Vec<_> = writes.iter().map(|w| w.result.origin_ref.as_str()).collect();
    assert_eq!(refs, vec!["r1", "r3"]);
    // docs are filtered out of the checkout too
    assert!(writes[1].files.keys().all(|path| path.starts_with("src/")));
}

#[test]
fn test_iterative_migrate_noop_changes_keeps_everything() {
    let origin = MemoryOrigin::new();
    origin.commit("c1", ann(), [("src/a.rs", "a")]);
    origin.commit("c2", ann(), [("docs/readme.md", "docs")]);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_init_history())
        .with_origin_files(Glob::new(["src/**"], Vec::<&str>::new()).unwrap())
        .migrate_noop_changes(true)
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(destination.writes().len(), 2);
}

#[test]
fn test_iterative_limit_stops_early() {
    let origin = origin_with_commits(4);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_init_history().with_iterative_limit(2))
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(destination.writes().len(), 2);
    assert_eq!(destination.status(), Some(DestinationStatus::new("r2")));
}

#[test]
fn test_iterative_failure_keeps_earlier_writes() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::new();
    destination.fail_on_write(2);
    let harness = Harness::new();
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_init_history())
        .with_general_options(harness.general())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Repository);
    assert_eq!(destination.writes().len(), 1);
    assert_eq!(destination.status(), Some(DestinationStatus::new("r1")));
    assert_eq!(destination.calls().writes, 2);
    assert_eq!(*harness.monitor.outcomes.lock(), vec![MigrationOutcome::Failed]);
}

#[test]
fn test_iterative_authoring_applies_per_change() {
    let origin = MemoryOrigin::new();
    origin.commit("from ann", ann(), [("a.txt", "a")]);
    origin.commit("from bob", bob(), [("b.txt", "b")]);
    let destination = MemoryDestination::new();
    let default = portage_types::Author::new("Bot", "bot@example.com");
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_init_history())
        .with_authoring(Authoring::allowed(default.clone(), ["ann@example.com"]))
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    let writes = destination.writes();
    assert_eq!(writes[0].result.author, ann());
    assert_eq!(writes[1].result.author, default);
}

#[test]
fn test_iterative_transformation_failure_keeps_earlier_writes() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::new();
    let harness = Harness::new();
    let workflow = builder_with(
        &origin,
        &destination,
        WorkflowMode::Iterative,
        FailingTransformation::on("r2"),
    )
    .with_options(WorkflowOptions::new().with_init_history())
    .with_general_options(harness.general())
    .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transform);
    assert!(err.to_string().contains("r2"));

    let writes = destination.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].result.origin_ref, "r1");
    assert_eq!(destination.calls().writes, 1);
    assert_eq!(destination.status(), Some(DestinationStatus::new("r1")));
    assert_eq!(*harness.monitor.outcomes.lock(), vec![MigrationOutcome::Failed]);
}

// ── CHANGE_REQUEST ───────────────────────────────────────────────────

#[test]
fn test_change_request_uses_labelled_ancestor_as_baseline() {
    let origin = MemoryOrigin::new();
    origin.commit_labeled("Imported", ann(), [("a.txt", "a")], [(ORIGIN_LABEL, "d5")]);
    origin.commit("Pending review", bob(), [("a.txt", "b")]);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::ChangeRequest).build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &["r2"]).unwrap();
    let writes = destination.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].result.baseline.as_deref(), Some("d5"));
    assert_eq!(writes[0].result.message, "Pending review");
    assert_eq!(writes[0].files.get("a.txt").map(String::as_str), Some("b"));
    // Reviews don't move the migrated baseline
    assert!(destination.status().is_none());
}

#[test]
fn test_change_request_without_baseline_fails() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::ChangeRequest).build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &["r2"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("--change-request-parent"));
    assert!(destination.writes().is_empty());
}

#[test]
fn test_change_request_parent_override() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let workflow = builder(&origin, &destination, WorkflowMode::ChangeRequest)
        .with_options(WorkflowOptions::new().with_change_request_parent("d9"))
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &["r2"]).unwrap();
    assert_eq!(destination.writes()[0].result.baseline.as_deref(), Some("d9"));
    assert_eq!(origin.calls().find_baseline, 0);
}

// ── CHECK_LAST_REV_STATE ─────────────────────────────────────────────

#[test]
fn test_check_last_rev_state_passes_when_destination_matches() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::with_baseline("r1");
    let workflow = builder(&origin, &destination, WorkflowMode::CheckLastRevState).build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    assert_eq!(destination.writes().len(), 1);
    assert_eq!(destination.calls().status_queries, 2);
}

#[test]
fn test_check_last_rev_state_detects_drift() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::with_baseline("r2");
    let workflow = builder(&origin, &destination, WorkflowMode::CheckLastRevState)
        .with_options(WorkflowOptions::new().with_last_revision("r1"))
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    match &err {
        PortageError::Repository { task, message } => {
            assert_eq!(task.as_deref(), Some("destination.check_last_rev_state"));
            assert!(message.contains("'r1'"));
            assert!(message.contains("'r2'"));
        }
        other => panic!("expected a repository error, got {other:?}"),
    }
    assert!(destination.writes().is_empty());
}

#[test]
fn test_check_last_rev_state_flag_in_iterative() {
    let origin = origin_with_commits(3);
    let destination = MemoryDestination::with_baseline("r2");
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(
            WorkflowOptions::new()
                .with_last_revision("r1")
                .with_check_last_rev_state(),
        )
        .build();
    let workdir = tempfile::tempdir().unwrap();

    let err = workflow.run(workdir.path(), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Repository);
    assert!(destination.writes().is_empty());
}

// ── After-migration actions ──────────────────────────────────────────

#[test]
fn test_after_migration_actions_see_each_write() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let action = RecordingAction::default();
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_init_history())
        .with_after_migration_action(action.clone())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    workflow.run(workdir.path(), &[]).unwrap();
    let seen = action.seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].origin_ref, "r1");
    assert_eq!(seen[0].effects[0].kind, EffectKind::Created);
    assert_eq!(seen[0].effects[0].destination_ref.as_deref(), Some("d1"));
}

#[test]
fn test_failing_after_migration_action_fails_run() {
    let origin = origin_with_commits(2);
    let destination = MemoryDestination::new();
    let action = RecordingAction {
        fail: true,
        ..RecordingAction::default()
    };
    let workflow = builder(&origin, &destination, WorkflowMode::Iterative)
        .with_options(WorkflowOptions::new().with_init_history())
        .with_after_migration_action(action.clone())
        .build();
    let workdir = tempfile::tempdir().unwrap();

    assert!(workflow.run(workdir.path(), &[]).is_err());
    assert_eq!(action.seen.lock().len(), 1);
    assert_eq!(destination.writes().len(), 1);
}
