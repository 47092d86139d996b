//! Path filters restricting which files a reader or writer touches

use crate::{PortageError, PortageResult};
use ::glob::{MatchOptions, Pattern};
use serde::{Serialize, Serializer};

/// Include/exclude path patterns
///
/// A path matches when it matches at least one include and no exclude.
#[derive(Clone, Debug, PartialEq)]
pub struct Glob {
    /// `None` includes every path
    includes: Option<Vec<Pattern>>,
    excludes: Vec<Pattern>,
}

const ALL_FILES: &str = "**";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl Glob {
    /// Build a glob, rejecting malformed patterns
    pub fn new<I, E, S, T>(includes: I, excludes: E) -> PortageResult<Self>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Ok(Self {
            includes: Some(compile(includes)?),
            excludes: compile(excludes)?,
        })
    }

    /// Matches every path
    pub fn all() -> Self {
        Self {
            includes: None,
            excludes: Vec::new(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let included = match &self.includes {
            Some(includes) => includes.iter().any(|p| p.matches_with(path, MATCH_OPTIONS)),
            None => true,
        };
        included
            && !self
                .excludes
                .iter()
                .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }

    pub fn includes(&self) -> Vec<&str> {
        match &self.includes {
            Some(includes) => includes.iter().map(Pattern::as_str).collect(),
            None => vec![ALL_FILES],
        }
    }

    pub fn excludes(&self) -> Vec<&str> {
        self.excludes.iter().map(Pattern::as_str).collect()
    }
}

impl Default for Glob {
    fn default() -> Self {
        Self::all()
    }
}

fn compile<I, S>(patterns: I) -> PortageResult<Vec<Pattern>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| {
            Pattern::new(p.as_ref()).map_err(|e| {
                PortageError::Validation(format!("Invalid glob pattern '{}': {}", p.as_ref(), e))
            })
        })
        .collect()
}

impl std::fmt::Display for Glob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "glob(include = {:?}", self.includes())?;
        if !self.excludes.is_empty() {
            write!(f, ", exclude = {:?}", self.excludes())?;
        }
        write!(f, ")")
    }
}

impl Serialize for Glob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
