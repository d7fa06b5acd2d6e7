// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Fetching sources onto the shelf.
//!
//! Every [`SourceKind`] has exactly one handler. Git repositories are cloned
//! through libgit2 with progress reporting and credential prompting,
//! Mercurial repositories through the `hg` binary, and archives are cached
//! under `.distfiles` before being extracted into place. Repositories whose
//! VCS cannot be told from their URL go through [`Fallback`], which tries
//! Mercurial first and then Git. Docked working copies are brought up to
//! date with [`update`].

use crate::{
    path,
    source::{Source, SourceKind},
    syscall::{syscall_interactive, syscall_non_interactive, SyscallError},
};

use auth_git2::{GitAuthenticator, Prompter};
use git2::{build::RepoBuilder, Config, FetchOptions, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    ffi::OsString,
    fs::{copy, create_dir_all, read_dir, remove_dir_all, remove_file, rename},
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument, warn};

/// Obtain source and place it at its docked location.
pub trait Fetch {
    /// Fetch source into [`Source::directory`].
    ///
    /// # Errors
    ///
    /// - Return [`FetchError`] if source could not be obtained.
    fn fetch(&self, source: &Source) -> Result<()>;
}

/// Handler chosen by source kind.
#[derive(Debug, Clone)]
pub enum Fetcher {
    Git(Git2Fetcher),
    Mercurial(HgFetcher),
    MercurialOrGit(Fallback<HgFetcher, Git2Fetcher>),
    Archive(ArchiveFetcher),
}

impl Fetcher {
    /// Select handler for source.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::NotFetchable`] if source kind is unknown.
    pub fn for_source(source: &Source, shelf: impl AsRef<Path>, bar: ProgressBar) -> Result<Self> {
        let fetcher = match source.kind() {
            SourceKind::Git => Self::Git(Git2Fetcher::new(bar)),
            SourceKind::Mercurial => Self::Mercurial(HgFetcher::new(bar)),
            SourceKind::MercurialOrGit => Self::MercurialOrGit(Fallback::new(
                HgFetcher::new(bar.clone()),
                Git2Fetcher::new(bar),
            )),
            SourceKind::Zip | SourceKind::TarGzip | SourceKind::TarBzip2 | SourceKind::TarXz => {
                Self::Archive(ArchiveFetcher::new(shelf.as_ref(), bar))
            }
            SourceKind::Unknown => {
                return Err(FetchError::NotFetchable {
                    name: source.name(),
                })
            }
        };

        Ok(fetcher)
    }
}

impl Fetch for Fetcher {
    fn fetch(&self, source: &Source) -> Result<()> {
        match self {
            Self::Git(fetcher) => fetcher.fetch(source),
            Self::Mercurial(fetcher) => fetcher.fetch(source),
            Self::MercurialOrGit(fetcher) => fetcher.fetch(source),
            Self::Archive(fetcher) => fetcher.fetch(source),
        }
    }
}

/// Try one handler, then another.
///
/// The second handler only runs if the target directory did not exist
/// before the first attempt. Whatever the first handler left behind is
/// removed before the second one starts.
#[derive(Debug, Clone)]
pub struct Fallback<A, B> {
    first: A,
    second: B,
}

impl<A, B> Fallback<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Fetch, B: Fetch> Fetch for Fallback<A, B> {
    #[instrument(skip(self, source), fields(source = %source), level = "debug")]
    fn fetch(&self, source: &Source) -> Result<()> {
        let directory = source.directory();
        let existed = directory.exists();

        let first = match self.first.fetch(source) {
            Ok(()) => return Ok(()),
            Err(err) if existed => return Err(err),
            Err(err) => err,
        };

        warn!("first attempt to fetch {source} failed, trying again: {first}");
        if directory.exists() {
            remove_dir_all(directory).map_err(|err| FetchError::io(err, directory))?;
        }

        self.second.fetch(source).map_err(|second| FetchError::Fallback {
            first: first.to_string(),
            source: Box::new(second),
        })
    }
}

fn style_bar(bar: &ProgressBar, message: String) -> Result<()> {
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(message);
    bar.enable_steady_tick(time::Duration::from_millis(100));

    Ok(())
}

fn create_parent(directory: &Path) -> Result<()> {
    if let Some(parent) = directory.parent() {
        create_dir_all(parent).map_err(|err| FetchError::io(err, parent))?;
    }

    Ok(())
}

/// Clone Git repositories through libgit2.
#[derive(Debug, Clone)]
pub struct Git2Fetcher {
    bar: ProgressBar,
}

impl Git2Fetcher {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Fetch for Git2Fetcher {
    #[instrument(skip(self, source), fields(source = %source), level = "debug")]
    fn fetch(&self, source: &Source) -> Result<()> {
        style_bar(&self.bar, source.origin().to_string())?;
        create_parent(source.directory())?;

        let prompter = IndicatifPrompter::new(self.bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
        let config = Config::open_default()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            let stats = progress.to_owned();
            let bar_size = stats.total_objects() as u64;
            let bar_pos = stats.received_objects() as u64;
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                prompter.bar.set_length(bar_size);
                prompter.bar.set_position(bar_pos);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let repository = RepoBuilder::new()
            .fetch_options(fo)
            .clone(source.origin(), source.directory())?;

        if let Some(tag) = source.tag() {
            checkout_tag(&repository, tag)?;
        }
        self.bar.finish_and_clear();
        info!("cloned {source}");

        Ok(())
    }
}

/// Switch working tree to tag, or to remote branch of that name.
fn checkout_tag(repository: &Repository, tag: &str) -> Result<()> {
    let (object, reference) = repository
        .revparse_ext(tag)
        .or_else(|_| repository.revparse_ext(&format!("origin/{tag}")))?;
    repository.checkout_tree(&object, None)?;

    match reference.as_ref().and_then(|reference| reference.name()) {
        Some(name) if name.starts_with("refs/heads/") => repository.set_head(name)?,
        _ => repository.set_head_detached(object.id())?,
    }
    debug!("checked out {tag}");

    Ok(())
}

/// Clone Mercurial repositories through `hg`.
#[derive(Debug, Clone)]
pub struct HgFetcher {
    bar: ProgressBar,
}

impl HgFetcher {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Fetch for HgFetcher {
    #[instrument(skip(self, source), fields(source = %source), level = "debug")]
    fn fetch(&self, source: &Source) -> Result<()> {
        style_bar(&self.bar, source.origin().to_string())?;
        let directory = source.directory();
        create_parent(directory)?;

        let mut args: Vec<OsString> = vec!["clone".into()];
        if let Some(tag) = source.tag() {
            args.extend(["-u".into(), tag.into()]);
        }
        args.extend([source.origin().into(), directory.as_os_str().to_owned()]);

        let cwd = directory.parent().unwrap_or(directory);
        let outcome = syscall_non_interactive("hg", args, cwd);
        self.bar.finish_and_clear();
        outcome?;
        info!("cloned {source}");

        Ok(())
    }
}

/// Download or copy archives, then extract them into place.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    shelf: PathBuf,
    bar: ProgressBar,
}

impl ArchiveFetcher {
    pub fn new(shelf: impl Into<PathBuf>, bar: ProgressBar) -> Self {
        Self {
            shelf: shelf.into(),
            bar,
        }
    }

    /// Make sure distfile is cached, returning its path.
    ///
    /// Distfiles are keyed by `host,user,project` so that equally named
    /// projects never share a cached archive. Downloads land in a `.part`
    /// file first and only take the distfile name once complete.
    fn cache(&self, source: &Source, extension: &str) -> Result<PathBuf> {
        let distfiles = path::distfiles_dir(&self.shelf);
        create_dir_all(&distfiles).map_err(|err| FetchError::io(err, &distfiles))?;

        let stem = cache_stem(source);
        let distfile = distfiles.join(format!("{stem}.{extension}"));
        if distfile.exists() {
            debug!("using cached {:?}", distfile.display());
            return Ok(distfile);
        }

        let partial = distfiles.join(format!("{stem}.{extension}.part"));
        let fetched = if source.is_local_archive() {
            copy(source.origin(), &partial)
                .map(|_| ())
                .map_err(|err| FetchError::io(err, &partial))
        } else {
            let args: [OsString; 3] = [
                "-O".into(),
                partial.as_os_str().to_owned(),
                source.origin().into(),
            ];
            syscall_non_interactive("wget", args, &distfiles)
                .map(|_| ())
                .map_err(FetchError::from)
        };
        let outcome =
            fetched.and_then(|()| rename(&partial, &distfile).map_err(|err| FetchError::io(err, &distfile)));

        if let Err(err) = outcome {
            if partial.exists() {
                if let Err(cleanup) = remove_file(&partial) {
                    warn!("failed to remove partial download {:?}: {cleanup}", partial.display());
                }
            }
            return Err(err);
        }

        Ok(distfile)
    }

    fn extract(&self, kind: SourceKind, distfile: &Path, into: &Path) -> Result<()> {
        let distfile = distfile.as_os_str().to_owned();
        let into_os = into.as_os_str().to_owned();
        let (cmd, args): (&str, Vec<OsString>) = match kind {
            SourceKind::Zip => ("unzip", vec!["-q".into(), distfile, "-d".into(), into_os]),
            SourceKind::TarGzip => ("tar", vec!["-xzf".into(), distfile, "-C".into(), into_os]),
            SourceKind::TarBzip2 => ("tar", vec!["-xjf".into(), distfile, "-C".into(), into_os]),
            SourceKind::TarXz => ("tar", vec!["-xJf".into(), distfile, "-C".into(), into_os]),
            _ => return Err(FetchError::NotFetchable { name: kind.to_string() }),
        };
        syscall_non_interactive(cmd, args, into)?;

        Ok(())
    }
}

impl Fetch for ArchiveFetcher {
    #[instrument(skip(self, source), fields(source = %source), level = "debug")]
    fn fetch(&self, source: &Source) -> Result<()> {
        let extension = source
            .kind()
            .archive_extension()
            .ok_or_else(|| FetchError::NotFetchable {
                name: source.name(),
            })?;
        style_bar(&self.bar, source.origin().to_string())?;

        let distfile = self.cache(source, extension)?;
        let extract_dir = self.shelf.join(format!(".extract_{}", cache_stem(source)));
        if extract_dir.exists() {
            remove_dir_all(&extract_dir).map_err(|err| FetchError::io(err, &extract_dir))?;
        }
        create_dir_all(&extract_dir).map_err(|err| FetchError::io(err, &extract_dir))?;
        self.extract(source.kind(), &distfile, &extract_dir)?;

        let entries = read_dir(&extract_dir)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|entry| entry.path()))
                    .collect::<std::io::Result<Vec<_>>>()
            })
            .map_err(|err| FetchError::io(err, &extract_dir))?;

        // INVARIANT: Archives holding exactly one directory are re-rooted at
        // that directory, anything else is a tarbomb moved as a whole.
        let extracted = match entries.as_slice() {
            [only] if only.is_dir() => only.clone(),
            _ => {
                info!("{source} is a tarbomb, docking its whole contents");
                extract_dir.clone()
            }
        };

        let directory = source.directory();
        create_parent(directory)?;
        rename(&extracted, directory).map_err(|err| FetchError::io(err, directory))?;
        if extract_dir.exists() {
            remove_dir_all(&extract_dir).map_err(|err| FetchError::io(err, &extract_dir))?;
        }
        self.bar.finish_and_clear();
        info!("extracted {source}");

        Ok(())
    }
}

/// Pull upstream changes into a docked working copy.
///
/// Git working copies run `git pull`, Mercurial ones `hg pull -u`. Return
/// whether the checked out revision changed.
///
/// # Errors
///
/// - Return [`FetchError::NotUpdatable`] if source is not a Git or
///   Mercurial working copy.
/// - Return [`FetchError::Syscall`] if pulling fails.
/// - Return [`FetchError::Git2`] if Git working copy cannot be inspected.
#[instrument(skip(source), fields(source = %source), level = "debug")]
pub fn update(source: &Source) -> Result<bool> {
    let directory = source.directory();
    let changed = if directory.join(".git").is_dir() {
        let before = git_head(directory)?;
        syscall_interactive("git", ["pull"], directory)?;
        git_head(directory)? != before
    } else if directory.join(".hg").is_dir() {
        let before = syscall_non_interactive("hg", ["id", "-i"], directory)?;
        syscall_interactive("hg", ["pull", "-u"], directory)?;
        syscall_non_interactive("hg", ["id", "-i"], directory)? != before
    } else {
        return Err(FetchError::NotUpdatable {
            name: source.name(),
        });
    };

    if changed {
        info!("updated {source}");
    } else {
        info!("{source} is up to date");
    }

    Ok(changed)
}

fn git_head(directory: &Path) -> Result<Option<git2::Oid>> {
    let repository = Repository::open(directory)?;
    let head = repository.head().ok().and_then(|head| head.target());

    Ok(head)
}

/// `host,user,project` name used for cached and extracted archives.
fn cache_stem(source: &Source) -> String {
    format!("{},{},{}", source.host(), source.user(), source.project())
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Fetching error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Git2(#[from] git2::Error),

    #[error(transparent)]
    Syscall(#[from] SyscallError),

    #[error(transparent)]
    Template(#[from] indicatif::style::TemplateError),

    #[error("filesystem operation failed at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Both handlers of a [`Fallback`] failed.
    #[error("fetch failed twice, first with: {first}")]
    Fallback {
        first: String,
        #[source]
        source: Box<FetchError>,
    },

    /// Nothing is known about where the source comes from.
    #[error("do not know how to fetch {name}")]
    NotFetchable { name: String },

    /// Docked source is not a working copy that can pull.
    #[error("do not know how to update {name}, it is neither a Git nor a Mercurial working copy")]
    NotUpdatable { name: String },
}

impl FetchError {
    fn io(source: std::io::Error, path: &Path) -> Self {
        Self::Io {
            source,
            path: path.to_path_buf(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;
