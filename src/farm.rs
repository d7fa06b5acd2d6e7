// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link farms.
//!
//! A link farm is a flat directory of symlinks into docked source trees,
//! meant to be put on a search path like `$PATH` or `$PKG_CONFIG_PATH`.
//! Each kind of farm collects a different kind of file, see [`FarmKind`].
//!
//! # Reconciliation
//!
//! Syncing a source first removes every link in every farm that points into
//! the source's directory. Unless the source is blacklisted, its tree is then
//! searched for files belonging in each farm, and fresh links are created.
//! Syncing is idempotent, syncing the same source twice leaves the farms as
//! syncing it once does.

pub mod kind;

pub use kind::{Classifier, FarmKind, TreeEntry};

use crate::{blacklist::Blacklist, hint::HintName, source::Source};

use ignore::WalkBuilder;
use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs::{create_dir_all, read_dir, read_link, remove_file},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Version control bookkeeping directories never searched.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn", "_darcs", "CVS"];

/// Symlink inside a farm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmLink {
    pub link: PathBuf,
    pub target: PathBuf,
}

impl FarmLink {
    /// Link target no longer exists.
    pub fn is_broken(&self) -> bool {
        !self.target.exists()
    }
}

/// Directory of symlinks of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFarm {
    kind: FarmKind,
    dir: PathBuf,
}

impl LinkFarm {
    pub fn new(kind: FarmKind, dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            dir: dir.into(),
        }
    }

    pub fn kind(&self) -> FarmKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All links in farm sorted by name, empty if farm does not exist yet.
    ///
    /// Relative link targets are made absolute against the farm directory.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Io`] if farm cannot be listed.
    pub fn links(&self) -> Result<Vec<FarmLink>> {
        let entries = match read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(FarmError::io(err, &self.dir)),
        };

        let mut links = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| FarmError::io(err, &self.dir))?;
            let link = entry.path();
            let file_type = entry.file_type().map_err(|err| FarmError::io(err, &link))?;
            if !file_type.is_symlink() {
                continue;
            }

            let target = read_link(&link).map_err(|err| FarmError::io(err, &link))?;
            links.push(FarmLink {
                target: self.dir.join(target),
                link,
            });
        }
        links.sort_by(|lhs, rhs| lhs.link.cmp(&rhs.link));

        Ok(links)
    }

    /// Link of given name, if any.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Io`] if link exists but cannot be read.
    pub fn link(&self, name: &str) -> Result<Option<FarmLink>> {
        let link = self.dir.join(name);
        match read_link(&link) {
            Ok(target) => Ok(Some(FarmLink {
                target: self.dir.join(target),
                link,
            })),
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::InvalidInput) => {
                Ok(None)
            }
            Err(err) => Err(FarmError::io(err, &link)),
        }
    }

    /// Remove every link pointing inside of directory, returning how many.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Io`] if farm cannot be listed or a link cannot
    ///   be removed.
    pub fn clean(&self, directory: &Path) -> Result<usize> {
        let mut removed = 0;
        for FarmLink { link, target } in self.links()? {
            if target.starts_with(directory) {
                remove_file(&link).map_err(|err| FarmError::io(err, &link))?;
                debug!("removed {:?}", link.display());
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Remove every link whose target no longer exists.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Io`] if farm cannot be listed or a link cannot
    ///   be removed.
    pub fn clean_broken(&self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for farm_link in self.links()? {
            if farm_link.is_broken() {
                remove_file(&farm_link.link).map_err(|err| FarmError::io(err, &farm_link.link))?;
                removed.push(farm_link.link);
            }
        }

        Ok(removed)
    }

    /// Create link to target named after target's file name.
    ///
    /// An identical link is left alone, and a link to somewhere else is
    /// replaced with a warning.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Occupied`] if a non-link entry has that name.
    /// - Return [`FarmError::Io`] if link cannot be created.
    pub fn create_link(&self, target: &Path) -> Result<()> {
        let Some(name) = target.file_name() else {
            return Err(FarmError::NoFileName {
                path: target.to_path_buf(),
            });
        };
        create_dir_all(&self.dir).map_err(|err| FarmError::io(err, &self.dir))?;

        let link = self.dir.join(name);
        match link.symlink_metadata() {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                let existing = read_link(&link).map_err(|err| FarmError::io(err, &link))?;
                if existing == target {
                    debug!("{:?} already links to {:?}", link.display(), target.display());
                    return Ok(());
                }

                warn!(
                    "trampling {:?}, was {:?}, now {:?}",
                    link.display(),
                    existing.display(),
                    target.display()
                );
                remove_file(&link).map_err(|err| FarmError::io(err, &link))?;
            }
            Ok(_) => return Err(FarmError::Occupied { path: link }),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(FarmError::io(err, &link)),
        }

        symlink(target, &link).map_err(|err| FarmError::io(err, &link))?;
        debug!("linked {:?} to {:?}", link.display(), target.display());

        Ok(())
    }
}

/// Every farm of a shelf.
#[derive(Debug, Clone)]
pub struct LinkFarms {
    farms: BTreeMap<FarmKind, LinkFarm>,
}

impl LinkFarms {
    /// Standard farms at the top of a shelf directory.
    pub fn new(shelf: impl AsRef<Path>) -> Self {
        let farms = FarmKind::ALL
            .into_iter()
            .map(|kind| (kind, LinkFarm::new(kind, shelf.as_ref().join(kind.dir_name()))))
            .collect();

        Self { farms }
    }

    pub fn get(&self, kind: FarmKind) -> Option<&LinkFarm> {
        self.farms.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkFarm> {
        self.farms.values()
    }
}

/// Reconcile link farms with docked source trees.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    blacklist: &'a Blacklist,
    classifier: &'a Classifier,
    default_excludes: &'a [String],
}

impl<'a> Reconciler<'a> {
    pub fn new(
        blacklist: &'a Blacklist,
        classifier: &'a Classifier,
        default_excludes: &'a [String],
    ) -> Self {
        Self {
            blacklist,
            classifier,
            default_excludes,
        }
    }

    /// Bring every farm in line with source.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError`] if tree cannot be walked, or a link cannot be
    ///   removed or created.
    #[instrument(skip(self, source, farms), fields(source = %source), level = "debug")]
    pub fn sync(&self, source: &Source, farms: &LinkFarms) -> Result<()> {
        let disabled = self.blacklist.contains(source);
        if disabled {
            info!("{source} is disabled, removing its links");
        }

        let mut tree: Option<Vec<TreeEntry>> = None;
        for farm in farms.iter() {
            let removed = farm.clean(source.directory())?;
            if removed > 0 {
                debug!("cleaned {removed} link(s) of {source} from {}", farm.kind());
            }

            if disabled || !source.is_docked() {
                continue;
            }

            if tree.is_none() && self.listed(source, farm.kind()).is_none() {
                tree = Some(self.walk(source)?);
            }

            let candidates = self.candidates(source, farm.kind(), tree.as_deref().unwrap_or_default());
            for target in dedup_by_name(candidates) {
                farm.create_link(&target)?;
            }
        }

        Ok(())
    }

    /// Paths of source that belong in farm of given kind.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Walk`] if source tree cannot be walked.
    pub fn discover(&self, source: &Source, kind: FarmKind) -> Result<Vec<PathBuf>> {
        let tree = match self.listed(source, kind) {
            Some(_) => Vec::new(),
            None => self.walk(source)?,
        };

        Ok(dedup_by_name(self.candidates(source, kind, &tree)))
    }

    fn candidates(&self, source: &Source, kind: FarmKind, tree: &[TreeEntry]) -> Vec<PathBuf> {
        if let Some(listed) = self.listed(source, kind) {
            return listed
                .into_iter()
                .map(|relative| source.directory().join(relative))
                .filter(|path| {
                    let exists = path.exists();
                    if !exists {
                        warn!("{source} lists {:?} for {kind}, but it does not exist", path.display());
                    }
                    exists
                })
                .collect();
        }

        tree.iter()
            .filter(|entry| self.classifier.belongs(kind, entry, source.hints()))
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// Relative paths hinted to replace tree search for farm of given kind.
    fn listed<'s>(&self, source: &'s Source, kind: FarmKind) -> Option<Vec<&'s str>> {
        kind.listing_hint()
            .map(|hint| source.hints().list(hint))
            .filter(|listed| !listed.is_empty())
    }

    /// Walk source tree honoring path hints.
    fn walk(&self, source: &Source) -> Result<Vec<TreeEntry>> {
        let root = source.directory();
        let hints = source.hints();
        let only = hints.list(HintName::OnlyPaths);

        let (starts, max_depth, excluded): (Vec<PathBuf>, Option<usize>, Vec<PathBuf>) =
            if only.is_empty() {
                let excluded = self
                    .default_excludes
                    .iter()
                    .map(String::as_str)
                    .chain(hints.list(HintName::ExcludePaths))
                    .map(|relative| root.join(relative))
                    .collect();
                (vec![root.to_path_buf()], None, excluded)
            } else {
                let starts = only.iter().map(|relative| root.join(relative)).collect();
                (starts, Some(1), Vec::new())
            };

        let mut tree = Vec::new();
        for start in starts {
            if !start.is_dir() {
                debug!("skip missing search path {:?}", start.display());
                continue;
            }

            let excluded = excluded.clone();
            let walker = WalkBuilder::new(&start)
                .standard_filters(false)
                .follow_links(false)
                .max_depth(max_depth)
                .sort_by_file_name(|lhs, rhs| lhs.cmp(rhs))
                .filter_entry(move |entry| {
                    let is_dir = entry.file_type().is_some_and(|file_type| file_type.is_dir());
                    let is_vcs = is_dir
                        && entry
                            .file_name()
                            .to_str()
                            .is_some_and(|name| VCS_DIRS.contains(&name));
                    !is_vcs && !excluded.iter().any(|path| entry.path().starts_with(path))
                })
                .build();

            for entry in walker {
                let entry = entry.map_err(|err| FarmError::Walk {
                    source: err,
                    path: start.clone(),
                })?;

                if entry.depth() == 0 {
                    continue;
                }

                tree.push(TreeEntry {
                    is_dir: entry.file_type().is_some_and(|file_type| file_type.is_dir()),
                    path: entry.path().to_path_buf(),
                });
            }
        }

        Ok(tree)
    }
}

/// Keep one path per file name, where later paths shadow earlier ones.
fn dedup_by_name(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut by_name: BTreeMap<OsString, PathBuf> = BTreeMap::new();
    for path in paths {
        let Some(name) = path.file_name().map(ToOwned::to_owned) else {
            continue;
        };

        if let Some(shadowed) = by_name.insert(name, path) {
            debug!("{:?} is shadowed by a later file of the same name", shadowed.display());
        }
    }

    by_name.into_values().collect()
}

/// Path is a file with an executable bit set, following symlinks.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
}

/// Path is a file with an executable extension, following symlinks.
#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                ["exe", "bat", "cmd", "com"].contains(&extension.to_ascii_lowercase().as_str())
            })
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

/// Link farm error types.
#[derive(Debug, thiserror::Error)]
pub enum FarmError {
    #[error("filesystem operation failed at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to walk {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },

    /// Farm entry of that name exists and is not a symlink.
    #[error("refusing to replace non-link entry {:?}", path.display())]
    Occupied { path: PathBuf },

    #[error("cannot link {:?} without a file name", path.display())]
    NoFileName { path: PathBuf },
}

impl FarmError {
    fn io(source: std::io::Error, path: &Path) -> Self {
        Self::Io {
            source,
            path: path.to_path_buf(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = FarmError> = std::result::Result<T, E>;
