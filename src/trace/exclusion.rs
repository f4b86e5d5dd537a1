//! Path exclusion list.
//!
//! Requests whose path matches an entry are never sampled. Entries are either
//! exact paths or regular expressions; the first match wins.

use regex::Regex;

/// One excluded path or pattern.
#[derive(Debug, Clone)]
pub enum PathExclusion {
    Exact(String),
    Pattern(Regex),
}

impl PathExclusion {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == path,
            Self::Pattern(regex) => regex.is_match(path),
        }
    }
}

/// Ordered exclusion list.
#[derive(Debug, Clone, Default)]
pub struct PathExclusions {
    entries: Vec<PathExclusion>,
}

impl PathExclusions {
    pub fn new(entries: Vec<PathExclusion>) -> Self {
        Self { entries }
    }

    /// Build from configured exact paths and pattern strings.
    pub fn from_config(paths: &[String], patterns: &[String]) -> Result<Self, regex::Error> {
        let mut entries: Vec<PathExclusion> =
            paths.iter().cloned().map(PathExclusion::Exact).collect();
        for pattern in patterns {
            entries.push(PathExclusion::Pattern(Regex::new(pattern)?));
        }
        Ok(Self { entries })
    }

    /// The first entry matching `path`, if any.
    pub fn find(&self, path: &str) -> Option<&PathExclusion> {
        self.entries.iter().find(|e| e.matches(path))
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
