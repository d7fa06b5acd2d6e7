// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Resolution of spec listings into sources.
//!
//! Catalog files list one spec per line, with blank lines and `#` comments
//! ignored. Catalogs may name other catalogs, so resolution keeps track of
//! which catalogs are currently being read to reject cycles, and gives up
//! past a fixed nesting depth.

use super::{
    CatalogRef, ParsedSpec, Result, Source, SourceRef, SpecError, SpecParser, DISTFILE_USER,
};
use crate::{hint::HintStore, path, report::ErrorReport};

use std::{fs::read_to_string, path::PathBuf};
use tracing::{debug, instrument};

/// Deepest allowed catalog nesting.
pub const MAX_CATALOG_DEPTH: usize = 16;

/// Sources resolved from specs, along with the errors of specs that failed.
#[derive(Debug, Default)]
pub struct Resolution {
    pub sources: Vec<Source>,
    pub errors: ErrorReport,
}

/// Turn specs into sources with their hints attached.
#[derive(Debug, Clone, Copy)]
pub struct SourceCatalog<'a> {
    parser: SpecParser<'a>,
    hints: &'a HintStore,
}

impl<'a> SourceCatalog<'a> {
    pub fn new(parser: SpecParser<'a>, hints: &'a HintStore) -> Self {
        Self { parser, hints }
    }

    /// Resolve external specs in order.
    ///
    /// When `abort_on_error` is false, failing specs are recorded in the
    /// returned resolution and the rest are still resolved. This also holds
    /// for individual lines of catalog files.
    ///
    /// # Errors
    ///
    /// - Return first [`SpecError`] if `abort_on_error` is true.
    #[instrument(skip(self, specs), level = "debug")]
    pub fn sources_from_specs(
        &self,
        specs: impl IntoIterator<Item = impl AsRef<str>>,
        abort_on_error: bool,
    ) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut visiting = Vec::new();
        for spec in specs {
            let spec = spec.as_ref();
            if let Err(err) = self.expand(spec, &mut visiting, abort_on_error, &mut resolution) {
                if abort_on_error {
                    return Err(err);
                }
                resolution.errors.record(spec, &err);
            }
        }

        Ok(resolution)
    }

    /// Resolve single external spec, stopping at the first error.
    ///
    /// # Errors
    ///
    /// - Return [`SpecError`] if spec or any catalog line fails to resolve.
    pub fn sources_from_spec(&self, spec: &str) -> Result<Vec<Source>> {
        self.sources_from_specs([spec], true)
            .map(|resolution| resolution.sources)
    }

    fn expand(
        &self,
        spec: &str,
        visiting: &mut Vec<PathBuf>,
        abort_on_error: bool,
        resolution: &mut Resolution,
    ) -> Result<()> {
        let ParsedSpec { reference, tag } = self.parser.parse_external(spec)?;
        let source = match reference {
            SourceRef::Catalog(catalog) => {
                let path = match catalog {
                    CatalogRef::Named(name) => path::named_catalog_file(self.parser.shelf, &name),
                    CatalogRef::File(path) => path,
                };
                return self.expand_catalog(path, visiting, abort_on_error, resolution);
            }
            SourceRef::RemoteVcs {
                url,
                host,
                user,
                project,
                kind,
            } => Source::new(self.parser.shelf, host, user, project).with_origin(url, kind),
            SourceRef::RemoteArchive {
                url,
                host,
                project,
                kind,
            } => Source::new(self.parser.shelf, host, DISTFILE_USER, project).with_origin(url, kind),
            SourceRef::LocalArchive {
                path,
                host,
                user,
                project,
                kind,
            } => Source::new(self.parser.shelf, host, user, project)
                .with_origin(path.to_string_lossy(), kind)
                .with_local_origin(),
            SourceRef::Docked {
                host,
                user,
                project,
            } => Source::new(self.parser.shelf, host, user, project),
        };

        resolution
            .sources
            .push(source.with_tag(tag).with_hints(self.hints));

        Ok(())
    }

    fn expand_catalog(
        &self,
        path: PathBuf,
        visiting: &mut Vec<PathBuf>,
        abort_on_error: bool,
        resolution: &mut Resolution,
    ) -> Result<()> {
        let read_error = |err| SpecError::ReadCatalog {
            source: err,
            path: path.clone(),
        };
        let canonical = path.canonicalize().map_err(read_error)?;

        if visiting.contains(&canonical) {
            return Err(SpecError::CatalogCycle { path: canonical });
        }

        if visiting.len() >= MAX_CATALOG_DEPTH {
            return Err(SpecError::CatalogDepth {
                path: canonical,
                limit: MAX_CATALOG_DEPTH,
            });
        }

        let content = read_to_string(&canonical).map_err(read_error)?;
        debug!("read catalog {:?}", canonical.display());

        visiting.push(canonical);
        let outcome = self.expand_lines(&content, visiting, abort_on_error, resolution);
        visiting.pop();

        outcome
    }

    fn expand_lines(
        &self,
        content: &str,
        visiting: &mut Vec<PathBuf>,
        abort_on_error: bool,
        resolution: &mut Resolution,
    ) -> Result<()> {
        let lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        for line in lines {
            if let Err(err) = self.expand(line, visiting, abort_on_error, resolution) {
                if abort_on_error {
                    return Err(err);
                }
                resolution.errors.record(line, &err);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ShelfConfig, hint::HintName, source::SourceKind};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, write};

    fn names(sources: &[Source]) -> Vec<String> {
        sources.iter().map(Source::name).collect()
    }

    #[test]
    fn resolve_catalogs_with_hints() -> anyhow::Result<()> {
        let shelf = tempfile::tempdir()?;
        let catalog_dir = shelf.path().join(".toolshelf/catalog");
        create_dir_all(&catalog_dir)?;
        create_dir_all(shelf.path().join("github.com/alice/widget"))?;
        write(
            catalog_dir.join("essentials.catalog"),
            indoc! {"
                # things I always want
                gh:bob/gadget@v2

                github.com/alice/widget
                @@more
            "},
        )?;
        write(
            catalog_dir.join("more.catalog"),
            "https://example.org/dl/tool-1.0.zip\n",
        )?;

        let config = ShelfConfig::default();
        let mut hints = HintStore::new();
        hints.push_cookies("cookies", "github.com/bob/*\n  build_command make\n")?;
        let parser = SpecParser::new(shelf.path(), shelf.path(), &config);
        let catalog = SourceCatalog::new(parser, &hints);

        let sources = catalog.sources_from_spec("@@essentials")?;
        assert_eq!(
            names(&sources),
            vec![
                "github.com/bob/gadget",
                "github.com/alice/widget",
                "example.org/distfile/tool-1.0",
            ]
        );
        assert_eq!(sources[0].tag(), Some("v2"));
        assert_eq!(sources[0].kind(), SourceKind::Git);
        assert_eq!(sources[0].hints().get(HintName::BuildCommand), Some("make"));
        assert!(sources[1].is_docked());
        assert_eq!(sources[2].kind(), SourceKind::Zip);

        Ok(())
    }

    #[test]
    fn self_including_catalog_is_cycle() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog_file = dir.path().join("loop.catalog");
        write(&catalog_file, "gh:alice/widget\n@loop.catalog\n")?;

        let config = ShelfConfig::default();
        let hints = HintStore::new();
        let parser = SpecParser::new(dir.path(), dir.path(), &config);
        let catalog = SourceCatalog::new(parser, &hints);

        let result = catalog.sources_from_spec("@loop.catalog");
        assert!(matches!(result, Err(SpecError::CatalogCycle { .. })));

        // Tolerant resolution keeps what it could resolve.
        let resolution = catalog.sources_from_specs(["@loop.catalog"], false)?;
        assert_eq!(names(&resolution.sources), vec!["github.com/alice/widget"]);
        assert_eq!(resolution.errors.items().collect::<Vec<_>>(), vec!["@loop.catalog"]);

        Ok(())
    }

    #[test]
    fn tolerant_resolution_collects_errors() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = ShelfConfig::default();
        let hints = HintStore::new();
        let parser = SpecParser::new(dir.path(), dir.path(), &config);
        let catalog = SourceCatalog::new(parser, &hints);

        let resolution =
            catalog.sources_from_specs(["bogus spec", "gh:alice/widget", "@missing"], false)?;
        assert_eq!(names(&resolution.sources), vec!["github.com/alice/widget"]);
        assert_eq!(resolution.errors.len(), 2);

        let result = catalog.sources_from_specs(["bogus spec", "gh:alice/widget"], true);
        assert!(matches!(result, Err(SpecError::Syntax { .. })));

        Ok(())
    }
}
