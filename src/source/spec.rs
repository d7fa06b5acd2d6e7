// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source spec grammar.
//!
//! An external spec is tried against each of the following forms in order,
//! and the first match wins:
//!
//! 1. `@@name` names a catalog under `.toolshelf/catalog/`, `@path` names a
//!    catalog file.
//! 2. A trailing `@tag` is split off when the tag is non-empty and contains
//!    neither `/` nor `:`.
//! 3. `prefix:user/project` goes through a configured shorthand template.
//! 4. `git://` URLs, or `http(s)://` URLs ending in `.git`, are Git
//!    repositories.
//! 5. `http(s)://` or `ftp://` URLs ending in an archive extension are
//!    distfiles.
//! 6. `http(s)://host/user/project` without a `.` in the project is a
//!    Mercurial or Git repository.
//! 7. Local paths ending in an archive extension are local distfiles.
//! 8. `host/user/project` is an already docked source.

use super::{Result, SourceKind, SpecError};
use crate::{config::ShelfConfig, source::DISTFILE_USER};

use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Host segment of sources from local archives.
pub const LOCAL_HOST: &str = "localhost";

/// Catalog named by a spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRef {
    /// `@@name` spec.
    Named(String),

    /// `@path` spec, made absolute against the working directory.
    File(PathBuf),
}

/// Classified spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    RemoteVcs {
        url: String,
        host: String,
        user: String,
        project: String,
        kind: SourceKind,
    },
    RemoteArchive {
        url: String,
        host: String,
        project: String,
        kind: SourceKind,
    },
    LocalArchive {
        path: PathBuf,
        host: String,
        user: String,
        project: String,
        kind: SourceKind,
    },
    Docked {
        host: String,
        user: String,
        project: String,
    },
    Catalog(CatalogRef),
}

/// Classified spec with its optional tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSpec {
    pub reference: SourceRef,
    pub tag: Option<String>,
}

/// Parse specs relative to a shelf and working directory.
#[derive(Debug, Clone, Copy)]
pub struct SpecParser<'a> {
    pub(crate) shelf: &'a Path,
    pub(crate) cwd: &'a Path,
    pub(crate) config: &'a ShelfConfig,
}

impl<'a> SpecParser<'a> {
    pub fn new(shelf: &'a Path, cwd: &'a Path, config: &'a ShelfConfig) -> Self {
        Self { shelf, cwd, config }
    }

    /// Classify external spec.
    ///
    /// # Errors
    ///
    /// - Return [`SpecError::NotDocked`] if spec has the `host/user/project`
    ///   shape but no such source is docked.
    /// - Return [`SpecError::Syntax`] if spec matches no form at all.
    #[instrument(skip(self), level = "debug")]
    pub fn parse_external(&self, spec: &str) -> Result<ParsedSpec> {
        if let Some(name) = spec.strip_prefix("@@") {
            return Ok(untagged(SourceRef::Catalog(CatalogRef::Named(name.into()))));
        }

        if let Some(path) = spec.strip_prefix('@') {
            return Ok(untagged(SourceRef::Catalog(CatalogRef::File(
                self.cwd.join(path),
            ))));
        }

        let (body, tag) = split_tag(spec);
        let tag = tag.map(String::from);

        let expanded = self.config.expand_shorthand(body);
        let body = match &expanded {
            Some(url) => {
                debug!("shorthand {body:?} expands to {url:?}");
                url.as_str()
            }
            None => body,
        };

        let reference = match split_url(body) {
            Some(url) => parse_url(body, url),
            None => self.parse_path(body)?,
        }
        .ok_or_else(|| SpecError::Syntax { spec: spec.into() })?;

        Ok(ParsedSpec { reference, tag })
    }

    fn parse_path(&self, body: &str) -> Result<Option<SourceRef>> {
        let path = self.cwd.join(body);
        if let Some((stem, kind)) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(SourceKind::from_archive_name)
        {
            let (host, user, project) = split_magic_stem(stem).unwrap_or_else(|| {
                (LOCAL_HOST.into(), DISTFILE_USER.into(), stem.into())
            });
            return Ok(Some(SourceRef::LocalArchive {
                path,
                host,
                user,
                project,
                kind,
            }));
        }

        let segments: Vec<&str> = body.split('/').collect();
        let [host, user, project] = segments.as_slice() else {
            return Ok(None);
        };
        if [host, user, project].iter().any(|segment| segment.is_empty()) {
            return Ok(None);
        }

        if !self.shelf.join(host).join(user).join(project).is_dir() {
            return Err(SpecError::NotDocked { spec: body.into() });
        }

        Ok(Some(SourceRef::Docked {
            host: (*host).into(),
            user: (*user).into(),
            project: (*project).into(),
        }))
    }
}

fn untagged(reference: SourceRef) -> ParsedSpec {
    ParsedSpec {
        reference,
        tag: None,
    }
}

/// Split trailing `@tag` from spec.
pub(crate) fn split_tag(spec: &str) -> (&str, Option<&str>) {
    match spec.rsplit_once('@') {
        Some((body, tag)) if !body.is_empty() && !tag.is_empty() && !tag.contains(['/', ':']) => {
            (body, Some(tag))
        }
        _ => (spec, None),
    }
}

/// Pieces of a `scheme://host/path` URL.
struct Url<'a> {
    scheme: &'a str,
    host: &'a str,
    segments: Vec<&'a str>,
}

fn split_url(body: &str) -> Option<Url<'_>> {
    let (scheme, rest) = body.split_once("://")?;
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    if host.is_empty() {
        return None;
    }

    Some(Url {
        scheme,
        host,
        segments: path.split('/').filter(|segment| !segment.is_empty()).collect(),
    })
}

fn parse_url(body: &str, url: Url<'_>) -> Option<SourceRef> {
    let (last, rest) = url.segments.split_last()?;

    if matches!(url.scheme, "git" | "http" | "https") {
        if let (Some(project), Some(user)) = (last.strip_suffix(".git"), rest.last()) {
            if !project.is_empty() {
                return Some(SourceRef::RemoteVcs {
                    url: body.into(),
                    host: url.host.into(),
                    user: (*user).into(),
                    project: project.into(),
                    kind: SourceKind::Git,
                });
            }
        }
    }

    if matches!(url.scheme, "http" | "https" | "ftp") && !body.ends_with('/') {
        if let Some((project, kind)) = SourceKind::from_archive_name(last) {
            return Some(SourceRef::RemoteArchive {
                url: body.into(),
                host: url.host.into(),
                project: project.into(),
                kind,
            });
        }
    }

    if matches!(url.scheme, "http" | "https") && !last.contains('.') {
        if let Some(user) = rest.last() {
            return Some(SourceRef::RemoteVcs {
                url: body.into(),
                host: url.host.into(),
                user: (*user).into(),
                project: (*last).into(),
                kind: SourceKind::MercurialOrGit,
            });
        }
    }

    None
}

/// Split `host,user,project[-version]` archive stem.
fn split_magic_stem(stem: &str) -> Option<(String, String, String)> {
    let mut parts = stem.split(',');
    let (Some(host), Some(user), Some(project), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    if host.is_empty() || user.is_empty() || project.is_empty() {
        return None;
    }

    Some((host.into(), user.into(), strip_version(project).into()))
}

/// Drop first `-<digit>...` suffix from project name.
fn strip_version(project: &str) -> &str {
    project
        .match_indices('-')
        .find(|(index, _)| {
            project[index + 1..]
                .chars()
                .next()
                .is_some_and(|next| next.is_ascii_digit())
        })
        .map(|(index, _)| &project[..index])
        .filter(|stripped| !stripped.is_empty())
        .unwrap_or(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn vcs(url: &str, host: &str, user: &str, project: &str, kind: SourceKind) -> SourceRef {
        SourceRef::RemoteVcs {
            url: url.into(),
            host: host.into(),
            user: user.into(),
            project: project.into(),
            kind,
        }
    }

    fn archive(url: &str, host: &str, project: &str, kind: SourceKind) -> SourceRef {
        SourceRef::RemoteArchive {
            url: url.into(),
            host: host.into(),
            project: project.into(),
            kind,
        }
    }

    #[test_case(
        "git://example.org/alice/widget.git",
        vcs("git://example.org/alice/widget.git", "example.org", "alice", "widget", SourceKind::Git),
        None;
        "git scheme"
    )]
    #[test_case(
        "https://github.com/alice/widget.git@v1.2",
        vcs("https://github.com/alice/widget.git", "github.com", "alice", "widget", SourceKind::Git),
        Some("v1.2");
        "https git with tag"
    )]
    #[test_case(
        "gh:alice/widget",
        vcs("https://github.com/alice/widget.git", "github.com", "alice", "widget", SourceKind::Git),
        None;
        "github shorthand"
    )]
    #[test_case(
        "bb:bob/gadget@release",
        vcs("https://bitbucket.org/bob/gadget", "bitbucket.org", "bob", "gadget", SourceKind::MercurialOrGit),
        Some("release");
        "bitbucket shorthand with tag"
    )]
    #[test_case(
        "https://example.org/pub/tool-1.0.tar.gz",
        archive("https://example.org/pub/tool-1.0.tar.gz", "example.org", "tool-1.0", SourceKind::TarGzip),
        None;
        "remote tarball"
    )]
    #[test_case(
        "ftp://ftp.example.org/tool.zip",
        archive("ftp://ftp.example.org/tool.zip", "ftp.example.org", "tool", SourceKind::Zip),
        None;
        "ftp zip"
    )]
    #[test_case(
        "https://hg.example.org/carol/thing",
        vcs("https://hg.example.org/carol/thing", "hg.example.org", "carol", "thing", SourceKind::MercurialOrGit),
        None;
        "ambiguous vcs"
    )]
    #[test]
    fn parse_remote_specs(spec: &str, expect: SourceRef, tag: Option<&str>) -> anyhow::Result<()> {
        let config = ShelfConfig::default();
        let parser = SpecParser::new(Path::new("/shelf"), Path::new("/work"), &config);
        let result = parser.parse_external(spec)?;
        pretty_assertions::assert_eq!(result.reference, expect);
        pretty_assertions::assert_eq!(result.tag.as_deref(), tag);
        Ok(())
    }

    #[test_case("https://example.org/page.html"; "web page")]
    #[test_case("not a spec"; "garbage")]
    #[test_case("a/b"; "two segments")]
    #[test_case("a//c"; "empty segment")]
    #[test]
    fn reject_unrecognized_specs(spec: &str) {
        let config = ShelfConfig::default();
        let parser = SpecParser::new(Path::new("/shelf"), Path::new("/work"), &config);
        let result = parser.parse_external(spec);
        assert!(matches!(result, Err(SpecError::Syntax { .. })));
    }

    #[test]
    fn parse_catalog_specs() -> anyhow::Result<()> {
        let config = ShelfConfig::default();
        let parser = SpecParser::new(Path::new("/shelf"), Path::new("/work"), &config);

        let result = parser.parse_external("@@essentials")?;
        assert_eq!(result.reference, SourceRef::Catalog(CatalogRef::Named("essentials".into())));

        let result = parser.parse_external("@lists/mine.catalog")?;
        assert_eq!(
            result.reference,
            SourceRef::Catalog(CatalogRef::File(PathBuf::from("/work/lists/mine.catalog")))
        );

        Ok(())
    }

    #[test]
    fn parse_local_archives() -> anyhow::Result<()> {
        let config = ShelfConfig::default();
        let parser = SpecParser::new(Path::new("/shelf"), Path::new("/work"), &config);

        let result = parser.parse_external("dl/pkg-2.1.zip")?;
        assert_eq!(
            result.reference,
            SourceRef::LocalArchive {
                path: PathBuf::from("/work/dl/pkg-2.1.zip"),
                host: LOCAL_HOST.into(),
                user: DISTFILE_USER.into(),
                project: "pkg-2.1".into(),
                kind: SourceKind::Zip,
            }
        );

        let result = parser.parse_external("/tmp/example.org,alice,widget-0.3.1.tar.gz")?;
        assert_eq!(
            result.reference,
            SourceRef::LocalArchive {
                path: PathBuf::from("/tmp/example.org,alice,widget-0.3.1.tar.gz"),
                host: "example.org".into(),
                user: "alice".into(),
                project: "widget".into(),
                kind: SourceKind::TarGzip,
            }
        );

        Ok(())
    }

    #[test]
    fn parse_docked_triples() -> anyhow::Result<()> {
        let shelf = tempfile::tempdir()?;
        std::fs::create_dir_all(shelf.path().join("github.com/alice/widget"))?;
        let config = ShelfConfig::default();
        let parser = SpecParser::new(shelf.path(), shelf.path(), &config);

        let result = parser.parse_external("github.com/alice/widget@v2")?;
        assert_eq!(
            result.reference,
            SourceRef::Docked {
                host: "github.com".into(),
                user: "alice".into(),
                project: "widget".into(),
            }
        );
        assert_eq!(result.tag.as_deref(), Some("v2"));

        let result = parser.parse_external("github.com/alice/missing");
        assert!(matches!(result, Err(SpecError::NotDocked { .. })));

        Ok(())
    }

    #[test_case("widget@v1", ("widget", Some("v1")); "simple tag")]
    #[test_case("https://user@host/a/b.git", ("https://user@host/a/b.git", None); "userinfo is not a tag")]
    #[test_case("widget@", ("widget@", None); "empty tag")]
    #[test_case("a@b:c", ("a@b:c", None); "colon in tag")]
    #[test]
    fn split_trailing_tag(spec: &str, expect: (&str, Option<&str>)) {
        pretty_assertions::assert_eq!(split_tag(spec), expect);
    }

    #[test_case("widget-0.3.1", "widget"; "version")]
    #[test_case("foo-bar-2", "foo-bar"; "dash in name")]
    #[test_case("foo-bar", "foo-bar"; "no version")]
    #[test_case("-1", "-1"; "nothing left")]
    #[test]
    fn strip_version_suffix(project: &str, expect: &str) {
        pretty_assertions::assert_eq!(strip_version(project), expect);
    }
}
