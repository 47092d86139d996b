//! Error types for Portage

/// Errors that can occur while running or inspecting a migration
#[derive(Debug, thiserror::Error)]
pub enum PortageError {
    /// The caller used the engine incorrectly (e.g. passed several source refs)
    #[error("Invalid invocation: {0}")]
    Invocation(String),

    /// Incompatible flags, malformed globs or templates, declined confirmations
    #[error("Validation error: {0}")]
    Validation(String),

    /// Nothing left to migrate for the requested reference
    #[error("No changes to migrate: {0}")]
    EmptyChange(String),

    /// Failure reported by an origin or destination
    #[error("Repository error{}: {message}", task.as_ref().map(|t| format!(" in '{}'", t)).unwrap_or_default())]
    Repository {
        task: Option<String>,
        message: String,
    },

    /// Failure applying the transformation pipeline to a checkout
    #[error("Transformation failed: {0}")]
    Transform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`PortageError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Invocation,
    Validation,
    Repository,
    Transform,
    Io,
}

impl PortageError {
    /// Repository failure without an operation label
    pub fn repository(message: impl Into<String>) -> Self {
        PortageError::Repository {
            task: None,
            message: message.into(),
        }
    }

    /// Repository failure attributed to a named repo task
    pub fn repository_in(task: impl Into<String>, message: impl Into<String>) -> Self {
        PortageError::Repository {
            task: Some(task.into()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PortageError::Invocation(_) => ErrorKind::Invocation,
            PortageError::Validation(_) | PortageError::EmptyChange(_) => ErrorKind::Validation,
            PortageError::Repository { .. } => ErrorKind::Repository,
            PortageError::Transform(_) => ErrorKind::Transform,
            PortageError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this error only means "nothing to do"
    pub fn is_empty_change(&self) -> bool {
        matches!(self, PortageError::EmptyChange(_))
    }
}

/// Fail with a validation error unless `condition` holds
pub fn check_condition(condition: bool, message: impl FnOnce() -> String) -> PortageResult<()> {
    if condition {
        Ok(())
    } else {
        Err(PortageError::Validation(message()))
    }
}

/// Result type alias for Portage operations
pub type PortageResult<T> = Result<T, PortageError>;
