// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Expansion of short docked specs.
//!
//! Commands that act on already docked sources accept abbreviated specs,
//! which expand into full `host/user/project` specs by listing the shelf:
//!
//! - `all` is every docked source.
//! - `.` is the docked source containing the working directory.
//! - `project` is every source with that project name.
//! - `prefix+` is the first source whose project name starts with `prefix`.
//! - `user/project` is every source with that user and project name.
//! - `user/all` is every source of that user, on any host.
//! - `host/user/project` is passed through as is.
//! - `host/user/all` is every source of that user on that host.
//! - `@...` catalog specs are passed through as is.
//!
//! Listings are sorted by host, then user, then project, and hidden host
//! directories like `.bin` are never considered.

use super::{spec::split_tag, Result, SpecError, SpecParser};

use std::{fs::read_dir, io::ErrorKind, path::Path};
use tracing::{debug, instrument};

/// Docked `(host, user, project)` triple.
type Triple = (String, String, String);

impl SpecParser<'_> {
    /// Expand short docked spec into full specs.
    ///
    /// A trailing `@tag` is carried over to every expanded spec.
    ///
    /// # Errors
    ///
    /// - Return [`SpecError::Syntax`] if spec has more than two `/`.
    /// - Return [`SpecError::Unresolved`] if spec expands to nothing.
    /// - Return [`SpecError::OutsideShelf`] if spec is `.` and the working
    ///   directory is not inside a docked source.
    /// - Return [`SpecError::ReadShelf`] if shelf cannot be listed.
    #[instrument(skip(self), level = "debug")]
    pub fn expand_docked(&self, spec: &str) -> Result<Vec<String>> {
        if spec.starts_with('@') {
            return Ok(vec![spec.into()]);
        }

        let (body, tag) = split_tag(spec);
        let triples = match body {
            "all" => self.docked()?,
            "." => vec![self.current()?],
            _ => self.matching(spec, body)?,
        };

        if triples.is_empty() {
            return Err(SpecError::Unresolved { spec: spec.into() });
        }

        let expanded: Vec<String> = triples
            .into_iter()
            .map(|(host, user, project)| match tag {
                Some(tag) => format!("{host}/{user}/{project}@{tag}"),
                None => format!("{host}/{user}/{project}"),
            })
            .collect();
        debug!("{spec:?} expands to {expanded:?}");

        Ok(expanded)
    }

    fn matching(&self, spec: &str, body: &str) -> Result<Vec<Triple>> {
        let segments: Vec<&str> = body.split('/').collect();
        let triples = match segments.as_slice() {
            [name] => match name.strip_suffix('+') {
                Some(prefix) => self
                    .docked()?
                    .into_iter()
                    .find(|(_, _, project)| project.starts_with(prefix))
                    .into_iter()
                    .collect(),
                None => self
                    .docked()?
                    .into_iter()
                    .filter(|(_, _, project)| project == name)
                    .collect(),
            },
            [user, "all"] => self
                .docked()?
                .into_iter()
                .filter(|triple| triple.1 == *user)
                .collect(),
            [user, project] => self
                .docked()?
                .into_iter()
                .filter(|triple| triple.1 == *user && triple.2 == *project)
                .collect(),
            [host, user, "all"] => sorted_subdirs(&self.shelf.join(host).join(user))?
                .into_iter()
                .map(|project| ((*host).into(), (*user).into(), project))
                .collect(),
            [host, user, project] => vec![((*host).into(), (*user).into(), (*project).into())],
            _ => return Err(SpecError::Syntax { spec: spec.into() }),
        };

        Ok(triples)
    }

    /// Triple of docked source containing the working directory.
    fn current(&self) -> Result<Triple> {
        let outside = || SpecError::OutsideShelf {
            path: self.cwd.to_path_buf(),
        };
        // INVARIANT: Compare resolved paths, the shelf may be reached through a symlink.
        let resolved = self
            .cwd
            .canonicalize()
            .and_then(|cwd| Ok((cwd, self.shelf.canonicalize()?)));
        let relative = match &resolved {
            Ok((cwd, shelf)) => cwd.strip_prefix(shelf),
            Err(_) => self.cwd.strip_prefix(self.shelf),
        }
        .map_err(|_| outside())?;
        let mut components = relative
            .components()
            .map(|component| component.as_os_str().to_str());

        match (components.next(), components.next(), components.next()) {
            (Some(Some(host)), Some(Some(user)), Some(Some(project))) if !host.starts_with('.') => {
                Ok((host.into(), user.into(), project.into()))
            }
            _ => Err(outside()),
        }
    }

    /// Every docked source in sorted order.
    fn docked(&self) -> Result<Vec<Triple>> {
        let mut triples = Vec::new();
        for host in sorted_subdirs(self.shelf)? {
            if host.starts_with('.') {
                continue;
            }

            let host_dir = self.shelf.join(&host);
            for user in sorted_subdirs(&host_dir)? {
                for project in sorted_subdirs(&host_dir.join(&user))? {
                    triples.push((host.clone(), user.clone(), project));
                }
            }
        }

        Ok(triples)
    }
}

/// Sorted names of subdirectories, empty if directory does not exist.
fn sorted_subdirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(SpecError::ReadShelf {
                source: err,
                path: dir.to_path_buf(),
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| SpecError::ReadShelf {
            source: err,
            path: dir.to_path_buf(),
        })?;

        if !entry.path().is_dir() {
            continue;
        }

        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();

    Ok(names)
}
