// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shelf management and manipulation.
//!
//! The __shelf__ is the directory that all sources get docked into. It is
//! `$TOOLSHELF` by default, or `$XDG_DATA_HOME/toolshelf` when that is not
//! set. Besides docked source trees, the shelf holds its link farms and a
//! `.toolshelf` bookkeeping directory with configuration, cookie files,
//! named catalogs, and the blacklist.
//!
//! A [`Shelf`] is opened once per run. It owns everything loaded from the
//! bookkeeping directory, and exposes the operations commands are built on.
//! Operations over many sources keep going when one source fails, recording
//! the failure in an [`ErrorReport`], unless the shelf was told to break on
//! the first error.

use crate::{
    blacklist::{Blacklist, BlacklistError},
    build::{Build, BuildError},
    config::{ConfigError, ShelfConfig},
    farm::{is_executable, Classifier, FarmError, FarmKind, FarmLink, LinkFarms, Reconciler},
    fetch::{self, FetchError},
    hint::{self, HintStore},
    path,
    report::ErrorReport,
    source::{Resolution, Source, SourceCatalog, SpecError, SpecParser},
};

use std::{
    error::Error as StdError,
    fs::remove_dir_all,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Link into a source as listed by [`Shelf::show`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownLink {
    pub kind: FarmKind,
    pub link: FarmLink,

    /// Target is gone, or is not executable in the bin farm.
    pub broken: bool,
}

/// Everything known about one shelf directory.
#[derive(Debug)]
pub struct Shelf {
    dir: PathBuf,
    cwd: PathBuf,
    config: ShelfConfig,
    hints: HintStore,
    blacklist: Blacklist,
    classifier: Classifier,
    farms: LinkFarms,
    break_on_error: bool,
}

impl Shelf {
    /// Open shelf directory, loading its configuration, cookies, and
    /// blacklist.
    ///
    /// A relative shelf directory is taken relative to `cwd`. Nothing needs
    /// to exist yet, a fresh shelf simply has default configuration.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Config`] if configuration file is invalid.
    /// - Return [`ShelfError::Hint`] if a cookie file is invalid.
    /// - Return [`ShelfError::Blacklist`] if blacklist cannot be read.
    /// - Return [`ShelfError::Pattern`] if an extra uninteresting executable
    ///   pattern is not a valid glob.
    #[instrument(skip(dir, cwd), level = "debug")]
    pub fn open(dir: impl AsRef<Path>, cwd: impl Into<PathBuf>) -> Result<Self> {
        let cwd = cwd.into();
        let dir = cwd.join(dir);
        let config = ShelfConfig::load(path::config_file(&dir))?;
        let hints = HintStore::load(config.cookie_files(&dir))?;
        let blacklist = Blacklist::load(path::blacklist_file(&dir))?;
        let classifier = Classifier::new(&config.uninteresting_executables)?;
        let farms = LinkFarms::new(&dir);

        Ok(Self {
            dir,
            cwd,
            config,
            hints,
            blacklist,
            classifier,
            farms,
            break_on_error: false,
        })
    }

    /// Stop at the first failing source instead of collecting errors.
    pub fn with_break_on_error(mut self, break_on_error: bool) -> Self {
        self.break_on_error = break_on_error;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &ShelfConfig {
        &self.config
    }

    pub fn hints(&self) -> &HintStore {
        &self.hints
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn farms(&self) -> &LinkFarms {
        &self.farms
    }

    pub fn break_on_error(&self) -> bool {
        self.break_on_error
    }

    pub fn parser(&self) -> SpecParser<'_> {
        SpecParser::new(&self.dir, &self.cwd, &self.config)
    }

    pub fn catalog(&self) -> SourceCatalog<'_> {
        SourceCatalog::new(self.parser(), &self.hints)
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(
            &self.blacklist,
            &self.classifier,
            &self.config.default_exclude_paths,
        )
    }

    /// Resolve external specs into sources.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Spec`] on the first failing spec when breaking
    ///   on error.
    pub fn resolve(&self, specs: &[impl AsRef<str>]) -> Result<Resolution> {
        Ok(self.catalog().sources_from_specs(specs, self.break_on_error)?)
    }

    /// Expand docked specs, then resolve them into sources.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Spec`] on the first failing spec when breaking
    ///   on error.
    pub fn resolve_docked(&self, specs: &[impl AsRef<str>]) -> Result<Resolution> {
        let parser = self.parser();
        let mut expanded = Vec::new();
        let mut errors = ErrorReport::new();
        for spec in specs {
            let spec = spec.as_ref();
            match parser.expand_docked(spec) {
                Ok(specs) => expanded.extend(specs),
                Err(err) if self.break_on_error => return Err(err.into()),
                Err(err) => errors.record(spec, &err),
            }
        }

        let mut resolution = self
            .catalog()
            .sources_from_specs(&expanded, self.break_on_error)?;
        resolution.errors.merge(errors);

        Ok(resolution)
    }

    /// Sync link farms with each source, in canonical name order.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Farm`] on the first failing source when
    ///   breaking on error.
    #[instrument(skip(self, sources), level = "debug")]
    pub fn relink(&self, sources: &[Source]) -> Result<ErrorReport> {
        let mut sources = sources.to_vec();
        sources.sort();
        sources.dedup();

        let reconciler = self.reconciler();
        self.for_each_source(&sources, |source| {
            info!("relinking {source}");
            reconciler.sync(source, &self.farms)
        })
    }

    /// Blacklist sources, then relink every docked source so that links the
    /// disabled sources were shadowing come back.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Blacklist`] if blacklist cannot be saved.
    /// - Same as [`Shelf::relink`] otherwise.
    #[instrument(skip(self, sources), level = "debug")]
    pub fn disable(&mut self, sources: &[Source]) -> Result<ErrorReport> {
        for source in sources {
            if self.blacklist.insert(source) {
                info!("disabled {source}");
            }
        }
        self.blacklist.save()?;

        self.relink_all()
    }

    /// Remove sources from blacklist, then relink them.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Blacklist`] if blacklist cannot be saved.
    /// - Same as [`Shelf::relink`] otherwise.
    #[instrument(skip(self, sources), level = "debug")]
    pub fn enable(&mut self, sources: &[Source]) -> Result<ErrorReport> {
        for source in sources {
            if self.blacklist.remove(source) {
                info!("enabled {source}");
            }
        }
        self.blacklist.save()?;

        self.relink(sources)
    }

    /// Pull upstream changes into each docked source.
    ///
    /// Return the sources whose checked out revision changed, which are
    /// the ones worth rebuilding and relinking.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Fetch`] on the first failing source when
    ///   breaking on error.
    #[instrument(skip(self, sources), level = "debug")]
    pub fn update(&self, sources: &[Source]) -> Result<(Vec<Source>, ErrorReport)> {
        let mut changed = Vec::new();
        let report = self.for_each_source(sources, |source| {
            if fetch::update(source)? {
                changed.push(source.clone());
            }
            Ok::<(), FetchError>(())
        })?;

        Ok((changed, report))
    }

    /// Delete source trees from the shelf, then relink what remains.
    ///
    /// Links into removed sources are cleaned, and links they were
    /// shadowing come back.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Remove`] on the first source that cannot be
    ///   deleted when breaking on error.
    /// - Same as [`Shelf::relink`] otherwise.
    #[instrument(skip(self, sources), level = "debug")]
    pub fn remove(&self, sources: &[Source]) -> Result<ErrorReport> {
        let mut report = self.for_each_source(sources, |source| {
            let directory = source.directory();
            if directory.exists() {
                remove_dir_all(directory).map_err(|err| ShelfError::Remove {
                    source: err,
                    path: directory.to_path_buf(),
                })?;
            }
            info!("removed {source}");
            Ok::<(), ShelfError>(())
        })?;
        report.merge(self.relink(sources)?);
        report.merge(self.relink_all()?);

        Ok(report)
    }

    /// Links pointing into each source.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Farm`] if a farm cannot be listed.
    pub fn show(&self, source: &Source) -> Result<Vec<ShownLink>> {
        let mut shown = Vec::new();
        for farm in self.farms.iter() {
            for link in farm.links()? {
                if !link.target.starts_with(source.directory()) {
                    continue;
                }

                let broken =
                    link.is_broken() || (farm.kind() == FarmKind::Bin && !is_executable(&link.target));
                shown.push(ShownLink {
                    kind: farm.kind(),
                    link,
                    broken,
                });
            }
        }

        Ok(shown)
    }

    /// Link of given name in every farm that has one.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Farm`] if a link cannot be read.
    pub fn which(&self, name: &str) -> Result<Vec<(FarmKind, FarmLink)>> {
        let mut found = Vec::new();
        for farm in self.farms.iter() {
            if let Some(link) = farm.link(name)? {
                found.push((farm.kind(), link));
            }
        }

        Ok(found)
    }

    /// Remove links whose targets no longer exist from every farm.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Farm`] if a farm cannot be cleaned.
    #[instrument(skip(self), level = "debug")]
    pub fn clean_farms(&self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for farm in self.farms.iter() {
            removed.extend(farm.clean_broken()?);
        }

        Ok(removed)
    }

    /// Build each docked source.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Build`] on the first failing source when
    ///   breaking on error.
    pub fn build(&self, sources: &[Source], builder: &impl Build) -> Result<ErrorReport> {
        self.for_each_source(sources, |source| builder.build(source))
    }

    /// Test each docked source.
    ///
    /// # Errors
    ///
    /// - Return [`ShelfError::Build`] on the first failing source when
    ///   breaking on error.
    pub fn test(&self, sources: &[Source], builder: &impl Build) -> Result<ErrorReport> {
        self.for_each_source(sources, |source| builder.test(source))
    }

    /// Relink every docked source, nothing at all on an empty shelf.
    fn relink_all(&self) -> Result<ErrorReport> {
        let resolution = match self.parser().expand_docked("all") {
            Ok(_) => self.resolve_docked(&["all"])?,
            Err(SpecError::Unresolved { .. }) => Resolution::default(),
            Err(err) if self.break_on_error => return Err(err.into()),
            Err(err) => {
                let mut resolution = Resolution::default();
                resolution.errors.record("all", &err);
                resolution
            }
        };
        let mut report = resolution.errors;
        report.merge(self.relink(&resolution.sources)?);

        Ok(report)
    }

    fn for_each_source<E>(
        &self,
        sources: &[Source],
        mut op: impl FnMut(&Source) -> std::result::Result<(), E>,
    ) -> Result<ErrorReport>
    where
        E: StdError + Into<ShelfError> + 'static,
    {
        let mut report = ErrorReport::new();
        for source in sources {
            if let Err(err) = op(source) {
                if self.break_on_error {
                    return Err(err.into());
                }
                report.record(source.name(), &err);
            }
        }

        Ok(report)
    }
}

/// All possible error types for shelf interaction.
#[derive(Debug, thiserror::Error)]
pub enum ShelfError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hint(#[from] hint::Error),

    #[error(transparent)]
    Blacklist(#[from] BlacklistError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Farm(#[from] FarmError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Source tree cannot be deleted.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

/// Friendly result alias :3
pub type Result<T, E = ShelfError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        fs::{create_dir_all, set_permissions, write, Permissions},
        os::unix::fs::PermissionsExt,
    };

    fn tool(path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(path, "")?;
        set_permissions(path, Permissions::from_mode(0o755))?;
        Ok(())
    }

    #[test]
    fn open_fresh_shelf_with_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let shelf = Shelf::open("shelf", dir.path())?;
        assert_eq!(shelf.dir(), dir.path().join("shelf"));
        assert_eq!(shelf.config(), &ShelfConfig::default());
        assert!(shelf.blacklist().is_empty());
        Ok(())
    }

    #[test]
    fn show_and_which() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        tool(&dir.path().join("example.org/alice/widget/bin/widget"))?;
        let shelf = Shelf::open(dir.path(), dir.path())?;

        let resolution = shelf.resolve_docked(&["widget"])?;
        assert!(resolution.errors.is_empty());
        assert!(shelf.relink(&resolution.sources)?.is_empty());

        let shown = shelf.show(&resolution.sources[0])?;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].kind, FarmKind::Bin);
        assert!(!shown[0].broken);

        let found = shelf.which("widget")?;
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].1.target,
            dir.path().join("example.org/alice/widget/bin/widget")
        );

        Ok(())
    }

    #[test]
    fn tolerant_resolution_collects_spec_errors() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let shelf = Shelf::open(dir.path(), dir.path())?;
        let resolution = shelf.resolve_docked(&["nothing-docked"])?;
        assert!(resolution.sources.is_empty());
        assert_eq!(resolution.errors.items().collect::<Vec<_>>(), vec!["nothing-docked"]);

        let shelf = shelf.with_break_on_error(true);
        assert!(matches!(
            shelf.resolve_docked(&["nothing-docked"]),
            Err(ShelfError::Spec(SpecError::Unresolved { .. }))
        ));

        Ok(())
    }
}
