//! User-facing console output
//!
//! The engine reports progress and warnings through a [`Console`] so that
//! embedding tools can route them to a terminal, a UI, or logs.

use parking_lot::Mutex;
use std::fmt::Debug;

/// Progress reporting and confirmation prompts
pub trait Console: Debug + Send + Sync {
    fn progress(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);

    /// Ask the user to confirm; `false` aborts the migration
    fn prompt_confirmation(&self, message: &str) -> bool;
}

/// Console that writes everything to `tracing`
#[derive(Clone, Debug)]
pub struct LogConsole {
    /// Answer given to every confirmation prompt
    answer: bool,
}

impl LogConsole {
    /// Console that confirms every prompt
    pub fn new() -> Self {
        Self { answer: true }
    }

    /// Console that declines every prompt
    pub fn declining() -> Self {
        Self { answer: false }
    }
}

impl Default for LogConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for LogConsole {
    fn progress(&self, message: &str) {
        tracing::info!(target: "portage::console", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "portage::console", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "portage::console", "{}", message);
    }

    fn prompt_confirmation(&self, message: &str) -> bool {
        tracing::info!(
            target: "portage::console",
            answer = self.answer,
            "{}",
            message
        );
        self.answer
    }
}

/// Level of a captured console message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageLevel {
    Progress,
    Info,
    Warn,
    Prompt,
}

/// Console that keeps every message, for embedding tools and tests
#[derive(Debug)]
pub struct BufferedConsole {
    answer: bool,
    messages: Mutex<Vec<(MessageLevel, String)>>,
}

impl BufferedConsole {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages.lock().clone()
    }

    /// Messages captured at `level`
    pub fn messages_at(&self, level: MessageLevel) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn push(&self, level: MessageLevel, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }
}

impl Console for BufferedConsole {
    fn progress(&self, message: &str) {
        self.push(MessageLevel::Progress, message);
    }

    fn info(&self, message: &str) {
        self.push(MessageLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(MessageLevel::Warn, message);
    }

    fn prompt_confirmation(&self, message: &str) -> bool {
        self.push(MessageLevel::Prompt, message);
        self.answer
    }
}
