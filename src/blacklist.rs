// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Disabled sources.
//!
//! The blacklist is the set of canonical source names whose links have been
//! removed from every link farm on purpose. It persists in
//! `.toolshelf/blacklist.txt` as one name per line, and is rewritten whole
//! in sorted order on every change.

use crate::source::Source;

use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{create_dir_all, read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Set of disabled source names bound to its backing file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    path: PathBuf,
    names: HashSet<String>,
    changed: bool,
}

impl Blacklist {
    /// Load blacklist from file, where a missing file means empty blacklist.
    ///
    /// # Errors
    ///
    /// - Return [`BlacklistError::Read`] if file exists but cannot be read.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(BlacklistError::Read { source: err, path }),
        };

        Ok(Self {
            names: parse_names(&content),
            path,
            changed: false,
        })
    }

    /// Disable source, returning false if it already was.
    pub fn insert(&mut self, source: &Source) -> bool {
        let inserted = self.names.insert(source.name());
        self.changed |= inserted;
        inserted
    }

    /// Enable source, returning false if it was not disabled.
    pub fn remove(&mut self, source: &Source) -> bool {
        let removed = self.names.remove(&source.name());
        self.changed |= removed;
        removed
    }

    pub fn contains(&self, source: &Source) -> bool {
        self.names.contains(&source.name())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite backing file if anything changed since loading.
    ///
    /// # Errors
    ///
    /// - Return [`BlacklistError::Write`] if file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        if !self.changed {
            return Ok(());
        }

        let write_error = |err| BlacklistError::Write {
            source: err,
            path: self.path.clone(),
        };
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent).map_err(write_error)?;
        }
        write(&self.path, self.to_string().as_bytes()).map_err(write_error)?;
        debug!("saved blacklist to {:?}", self.path.display());
        self.changed = false;

        Ok(())
    }
}

impl Display for Blacklist {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        let mut names: Vec<_> = self.names.iter().collect();
        names.sort();

        for name in names {
            writeln!(fmt, "{name}")?;
        }

        Ok(())
    }
}

fn parse_names(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Blacklist persistence error types.
#[derive(Debug, thiserror::Error)]
pub enum BlacklistError {
    #[error("failed to read blacklist at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to write blacklist at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = BlacklistError> = std::result::Result<T, E>;
