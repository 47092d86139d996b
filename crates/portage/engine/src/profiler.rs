//! Profiler: named, timed scopes around engine work
//!
//! Scopes nest. A scope started while another is open on the same thread
//! gets the parent's path as prefix (`run/default/squash`). Each scope
//! opens a `tracing` span and, when dropped, reports a [`TaskRecord`] to
//! every registered [`ProfilerListener`].
//!
//! Listeners may be shared by several workflows running on different
//! threads, so they must be `Send + Sync`.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// A finished profiler scope
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    /// Slash-joined path of nested scope names
    pub path: String,
    #[serde(with = "duration_micros")]
    pub elapsed: Duration,
}

/// Receives profiler scope boundaries
pub trait ProfilerListener: Send + Sync {
    fn task_started(&self, _path: &str) {}
    fn task_finished(&self, record: &TaskRecord);
}

/// Collects finished scopes in memory
#[derive(Debug, Default)]
pub struct RecordingListener {
    records: Mutex<Vec<TaskRecord>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished scopes, in completion order
    pub fn records(&self) -> Vec<TaskRecord> {
        self.records.lock().clone()
    }

    /// Paths of finished scopes, in completion order
    pub fn paths(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.path.clone()).collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl ProfilerListener for RecordingListener {
    fn task_finished(&self, record: &TaskRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Hands out nested, timed scopes
#[derive(Clone, Default)]
pub struct Profiler {
    listeners: Vec<Arc<dyn ProfilerListener>>,
    stacks: Arc<Mutex<HashMap<ThreadId, Vec<String>>>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProfilerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Open a scope; it closes when the returned guard is dropped
    pub fn start(&self, name: &str) -> ProfilerTask<'_> {
        let path = {
            let mut stacks = self.stacks.lock();
            let stack = stacks.entry(thread::current().id()).or_default();
            let path = match stack.last() {
                Some(parent) => format!("{}/{}", parent, name),
                None => name.to_string(),
            };
            stack.push(path.clone());
            path
        };
        for listener in &self.listeners {
            listener.task_started(&path);
        }
        let span = tracing::debug_span!("profiler.task", task = %path).entered();
        ProfilerTask {
            profiler: self,
            path,
            started: Instant::now(),
            _span: span,
        }
    }

    fn finish(&self, path: &str, elapsed: Duration) {
        {
            let mut stacks = self.stacks.lock();
            let id = thread::current().id();
            if let Some(stack) = stacks.get_mut(&id) {
                if let Some(pos) = stack.iter().rposition(|p| p == path) {
                    stack.truncate(pos);
                }
                if stack.is_empty() {
                    stacks.remove(&id);
                }
            }
        }
        let record = TaskRecord {
            path: path.to_string(),
            elapsed,
        };
        tracing::trace!(task = %record.path, elapsed_us = elapsed.as_micros() as u64, "Task finished");
        for listener in &self.listeners {
            listener.task_finished(&record);
        }
    }
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// An open profiler scope
#[must_use = "the scope closes as soon as the task is dropped"]
pub struct ProfilerTask<'p> {
    profiler: &'p Profiler,
    path: String,
    started: Instant,
    _span: tracing::span::EnteredSpan,
}

impl ProfilerTask<'_> {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for ProfilerTask<'_> {
    fn drop(&mut self) {
        self.profiler.finish(&self.path, self.started.elapsed());
    }
}

mod duration_micros {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_micros() as u64)
    }
}
