//! The origin contract: the source of truth a migration reads from

use crate::{Authoring, Baseline, Change, ChangesResponse, Glob, PortageResult, Revision};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::path::Path;

/// Descriptive key/value pairs reported by an origin or destination
pub type Description = BTreeMap<String, BTreeSet<String>>;

/// A source-of-truth repository
pub trait Origin: Debug {
    type Revision: Revision;

    /// Resolve a reference into a revision. `None` means the origin's
    /// notion of "latest".
    fn resolve(&self, reference: Option<&str>) -> PortageResult<Self::Revision>;

    /// Open a reader restricted to `origin_files`
    fn new_reader(
        &self,
        origin_files: &Glob,
        authoring: &Authoring,
    ) -> PortageResult<Box<dyn Reader<Self::Revision>>>;

    /// Describe the origin for reporting
    fn describe(&self, origin_files: &Glob) -> Description;

    /// Label the origin uses to record the origin revision in destination
    /// change metadata
    fn label_name(&self) -> String;
}

/// Reads history and content out of an origin
pub trait Reader<R: Revision> {
    /// Changes in the range `(from, to]`, oldest first. `from == None`
    /// reads from the beginning of history.
    fn changes(&self, from: Option<&R>, to: &R) -> PortageResult<ChangesResponse<R>>;

    /// Metadata for a single revision
    fn change(&self, revision: &R) -> PortageResult<Change<R>>;

    /// Materialize `revision` into `workdir`
    fn checkout(&self, revision: &R, workdir: &Path) -> PortageResult<()>;

    /// Walk back from `start` to the closest change carrying `label`, which
    /// names the destination revision it was migrated to
    fn find_baseline(&self, start: &R, label: &str) -> PortageResult<Option<Baseline<R>>>;
}
