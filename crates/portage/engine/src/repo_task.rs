//! Repo tasks: origin/destination calls wrapped in a named profiler scope
//!
//! The scope only times and labels the call. There are no retries, and the
//! call's result or error comes back untouched.

use crate::profiler::Profiler;
use portage_types::PortageResult;

/// Run `task` inside a profiler scope called `name`
pub fn repo_task<T>(
    profiler: &Profiler,
    name: &str,
    task: impl FnOnce() -> PortageResult<T>,
) -> PortageResult<T> {
    let scope = profiler.start(name);
    let result = task();
    if let Err(err) = &result {
        tracing::debug!(task = %scope.path(), error = %err, "Repo task failed");
    }
    result
}
