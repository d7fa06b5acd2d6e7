// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source identities.
//!
//! A __source__ is a project that may be docked on the shelf, identified by a
//! `host/user/project` triple. Its docked location is always
//! `$TOOLSHELF/<host>/<user>/<project>`, whether or not it has been fetched
//! yet. Sources are built from textual specs, see [`spec`] for the grammar,
//! [`docked`] for expansion of short names, and [`catalog`] for resolution of
//! whole spec listings.

pub mod catalog;
pub mod docked;
pub mod spec;

pub use catalog::{Resolution, SourceCatalog};
pub use spec::{CatalogRef, ParsedSpec, SourceRef, SpecParser};

use crate::hint::{HintStore, Hints};

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

/// User segment of sources that come from plain archives.
pub const DISTFILE_USER: &str = "distfile";

/// Archive name extensions mapped to their kind.
const ARCHIVE_EXTENSIONS: [(&str, SourceKind); 5] = [
    (".tar.gz", SourceKind::TarGzip),
    (".tgz", SourceKind::TarGzip),
    (".tar.bz2", SourceKind::TarBzip2),
    (".tar.xz", SourceKind::TarXz),
    (".zip", SourceKind::Zip),
];

/// How a source is obtained.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Git,
    Mercurial,

    /// Remote repository whose VCS cannot be told from its URL.
    MercurialOrGit,
    Zip,
    TarGzip,
    TarBzip2,
    TarXz,

    /// Nothing known, typically an already docked source.
    #[default]
    Unknown,
}

impl SourceKind {
    /// Split archive file name into its stem and kind.
    pub fn from_archive_name(name: &str) -> Option<(&str, SourceKind)> {
        ARCHIVE_EXTENSIONS.iter().find_map(|(extension, kind)| {
            name.strip_suffix(*extension)
                .filter(|stem| !stem.is_empty())
                .map(|stem| (stem, *kind))
        })
    }

    /// Extension cached distfiles of this kind are stored under.
    pub fn archive_extension(self) -> Option<&'static str> {
        match self {
            Self::Zip => Some("zip"),
            Self::TarGzip => Some("tgz"),
            Self::TarBzip2 => Some("tar.bz2"),
            Self::TarXz => Some("tar.xz"),
            _ => None,
        }
    }

    pub fn is_archive(self) -> bool {
        self.archive_extension().is_some()
    }
}

impl Display for SourceKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Git => "git",
            Self::Mercurial => "mercurial",
            Self::MercurialOrGit => "mercurial-or-git",
            Self::Zip => "zip",
            Self::TarGzip => "tar-gzip",
            Self::TarBzip2 => "tar-bzip2",
            Self::TarXz => "tar-xz",
            Self::Unknown => "unknown",
        };
        fmt.write_str(name)
    }
}

/// Project identified by host, user, and project name.
///
/// Two sources are the same source when their canonical names are equal,
/// regardless of where they came from or which tag they ask for.
#[derive(Debug, Clone)]
pub struct Source {
    host: String,
    user: String,
    project: String,
    origin: String,
    kind: SourceKind,
    local: bool,
    tag: Option<String>,
    hints: Hints,
    directory: PathBuf,
}

impl Source {
    /// Construct source docked under a shelf directory.
    ///
    /// An empty user becomes [`DISTFILE_USER`].
    pub fn new(
        shelf: impl AsRef<Path>,
        host: impl Into<String>,
        user: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        let host = host.into();
        let project = project.into();
        let user = Some(user.into())
            .filter(|user| !user.is_empty())
            .unwrap_or_else(|| DISTFILE_USER.into());
        let directory = shelf.as_ref().join(&host).join(&user).join(&project);

        Self {
            host,
            user,
            project,
            origin: String::new(),
            kind: SourceKind::Unknown,
            local: false,
            tag: None,
            hints: Hints::new(),
            directory,
        }
    }

    /// Set where source is fetched from, and how.
    pub fn with_origin(mut self, origin: impl Into<String>, kind: SourceKind) -> Self {
        self.origin = origin.into();
        self.kind = kind;
        self
    }

    /// Mark origin as an archive on the local filesystem.
    pub fn with_local_origin(mut self) -> Self {
        self.local = true;
        self
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    /// Attach resolved hints of source from hint store.
    pub fn with_hints(mut self, store: &HintStore) -> Self {
        self.hints = store.resolve(&self.name());
        self
    }

    /// Canonical `host/user/project` name.
    pub fn name(&self) -> String {
        format!("{}/{}/{}", self.host, self.user, self.project)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// URL or local path source is fetched from, empty if unknown.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn is_local_archive(&self) -> bool {
        self.local
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn hints(&self) -> &Hints {
        &self.hints
    }

    /// Docked location of source.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Source exists on the shelf.
    pub fn is_docked(&self) -> bool {
        self.directory.is_dir()
    }

    fn key(&self) -> (&str, &str, &str) {
        (&self.host, &self.user, &self.project)
    }
}

impl Display for Source {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}/{}", self.host, self.user, self.project)
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Source {}

impl PartialOrd for Source {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Source {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Spec resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// Spec matches no recognized form.
    #[error("could not parse source spec {spec:?}")]
    Syntax { spec: String },

    /// Spec names no docked source.
    #[error("could not resolve {spec:?} to any docked source")]
    Unresolved { spec: String },

    /// Spec looks like a docked source that is not on the shelf.
    #[error("source {spec:?} is not docked")]
    NotDocked { spec: String },

    /// Catalog file cannot be read.
    #[error("failed to read catalog at {:?}", path.display())]
    ReadCatalog {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Catalog includes itself.
    #[error("catalog {:?} includes itself", path.display())]
    CatalogCycle { path: PathBuf },

    /// Catalogs are nested too deeply.
    #[error("catalog {:?} nested deeper than {limit} levels", path.display())]
    CatalogDepth { path: PathBuf, limit: usize },

    /// Shelf directory cannot be listed.
    #[error("failed to list shelf directory {:?}", path.display())]
    ReadShelf {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Current directory is not inside any docked source.
    #[error("current directory {:?} is not inside a docked source", path.display())]
    OutsideShelf { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = SpecError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::collections::HashSet;

    #[test_case("foo-1.0.tar.gz", Some(("foo-1.0", SourceKind::TarGzip)); "tar gzip")]
    #[test_case("foo.tgz", Some(("foo", SourceKind::TarGzip)); "tgz")]
    #[test_case("foo.tar.bz2", Some(("foo", SourceKind::TarBzip2)); "tar bzip2")]
    #[test_case("foo.tar.xz", Some(("foo", SourceKind::TarXz)); "tar xz")]
    #[test_case("foo.zip", Some(("foo", SourceKind::Zip)); "zip")]
    #[test_case("foo.tar", None; "plain tar")]
    #[test_case(".zip", None; "empty stem")]
    #[test]
    fn archive_names(name: &str, expect: Option<(&str, SourceKind)>) {
        pretty_assertions::assert_eq!(SourceKind::from_archive_name(name), expect);
    }

    #[test]
    fn identity_ignores_origin_and_tag() {
        let plain = Source::new("/shelf", "github.com", "alice", "widget");
        let tagged = Source::new("/shelf", "github.com", "alice", "widget")
            .with_origin("https://github.com/alice/widget.git", SourceKind::Git)
            .with_tag(Some("v1".into()));
        assert_eq!(plain, tagged);

        let set: HashSet<Source> = [plain, tagged].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn empty_user_means_distfile() {
        let source = Source::new("/shelf", "example.org", "", "pkg");
        assert_eq!(source.name(), "example.org/distfile/pkg");
        assert_eq!(source.directory(), Path::new("/shelf/example.org/distfile/pkg"));
    }
}
