//! Executable search path lookups.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

/// Answers whether a binary can be resolved on the search path.
pub trait BinaryLocator {
    fn is_available(&self, name: &str) -> bool;
}

/// Locator backed by `PATH`, or by an explicit directory list.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Option<OsString>,
}

impl SearchPath {
    /// Resolve against the process `PATH` at lookup time.
    pub fn from_env() -> Self {
        Self { dirs: None }
    }

    /// Resolve against `dirs` only.
    pub fn in_dirs<I: IntoIterator<Item = PathBuf>>(dirs: I) -> Self {
        let joined = env::join_paths(dirs).unwrap_or_default();
        Self { dirs: Some(joined) }
    }
}

impl BinaryLocator for SearchPath {
    fn is_available(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let found = match &self.dirs {
            None => which::which(name),
            Some(dirs) => {
                let cwd = env::current_dir().unwrap_or_default();
                which::which_in(name, Some(dirs), cwd)
            }
        };
        debug!(binary = name, found = found.is_ok(), "search path lookup");
        found.is_ok()
    }
}
