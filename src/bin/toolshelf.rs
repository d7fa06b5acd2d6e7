// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use toolshelf::{
    build::{check_requirements, ShellBuilder},
    fetch::{Fetch, Fetcher},
    path::default_shelf_dir,
    report::ErrorReport,
    shelf::Shelf,
    source::Source,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar};
use std::{env, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "toolshelf [options] <command> [<spec>...]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Shelf directory to use instead of $TOOLSHELF.
    #[arg(long, global = true, value_name = "dir")]
    pub shelf: Option<PathBuf>,

    /// Stop at the first error instead of reporting all errors at the end.
    #[arg(short = 'K', long, global = true)]
    pub break_on_error: bool,

    /// Do not build sources after docking them.
    #[arg(short = 'B', long, global = true)]
    pub no_build: bool,

    /// Log what is going on in detail.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    async fn run(self) -> Result<ErrorReport> {
        let cwd = env::current_dir()?;
        let dir = match self.shelf {
            Some(dir) => dir,
            None => default_shelf_dir()?,
        };
        let shelf = Shelf::open(dir, cwd)?.with_break_on_error(self.break_on_error);

        match self.command {
            Command::Dock(opts) => run_dock(shelf, opts, self.no_build).await,
            Command::Build(opts) => run_build(shelf, opts),
            Command::Test(opts) => run_test(shelf, opts),
            Command::Update(opts) => run_update(shelf, opts, self.no_build),
            Command::Remove(opts) => run_remove(shelf, opts),
            Command::Relink(opts) => run_relink(shelf, opts),
            Command::Disable(opts) => run_disable(shelf, opts),
            Command::Enable(opts) => run_enable(shelf, opts),
            Command::Show(opts) => run_show(shelf, opts),
            Command::Which(opts) => run_which(shelf, opts),
            Command::Resolve(opts) => run_resolve(shelf, opts),
            Command::Cleanfarms => run_cleanfarms(shelf),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Fetch sources onto the shelf, build them, and link them.
    #[command(override_usage = "toolshelf dock [options] <external_spec>...")]
    Dock(ExternalSpecs),

    /// Build docked sources.
    #[command(override_usage = "toolshelf build [options] <docked_spec>...")]
    Build(RequiredSpecs),

    /// Run test suites of docked sources.
    #[command(override_usage = "toolshelf test [options] <docked_spec>...")]
    Test(RequiredSpecs),

    /// Pull upstream changes, then rebuild and relink what changed.
    #[command(override_usage = "toolshelf update [options] [<docked_spec>...]")]
    Update(OptionalSpecs),

    /// Delete docked sources from the shelf and relink the rest.
    #[command(override_usage = "toolshelf remove [options] <docked_spec>...")]
    Remove(RequiredSpecs),

    /// Rebuild links of docked sources, all of them by default.
    #[command(override_usage = "toolshelf relink [options] [<docked_spec>...]")]
    Relink(OptionalSpecs),

    /// Remove links of docked sources and keep them removed.
    #[command(override_usage = "toolshelf disable [options] [<docked_spec>...]")]
    Disable(OptionalSpecs),

    /// Restore links of disabled sources.
    #[command(override_usage = "toolshelf enable [options] <docked_spec>...")]
    Enable(RequiredSpecs),

    /// List links into docked sources, all of them by default.
    #[command(override_usage = "toolshelf show [options] [<docked_spec>...]")]
    Show(OptionalSpecs),

    /// Show where linked names point to.
    #[command(override_usage = "toolshelf which [options] <name>...")]
    Which(Names),

    /// Print directories of docked sources.
    #[command(alias = "pwd", override_usage = "toolshelf resolve [options] <docked_spec>...")]
    Resolve(RequiredSpecs),

    /// Remove links whose targets no longer exist.
    Cleanfarms,
}

#[derive(Parser, Clone, Debug)]
struct ExternalSpecs {
    /// URLs, archives, shorthands, catalogs, or docked sources.
    #[arg(required = true, value_name = "external_spec")]
    pub specs: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
struct RequiredSpecs {
    /// Docked sources, e.g., `project`, `user/project`, `.`, `all`.
    #[arg(required = true, value_name = "docked_spec")]
    pub specs: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
struct OptionalSpecs {
    /// Docked sources, e.g., `project`, `user/project`, `.`, `all`.
    #[arg(value_name = "docked_spec")]
    pub specs: Vec<String>,
}

impl OptionalSpecs {
    fn or_all(self) -> Vec<String> {
        if self.specs.is_empty() {
            return vec!["all".into()];
        }

        self.specs
    }
}

#[derive(Parser, Clone, Debug)]
struct Names {
    /// Names of links, e.g., executable names.
    #[arg(required = true, value_name = "name")]
    pub names: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer().compact().with_target(false).without_time();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match cli.run().await {
        Ok(report) if report.is_empty() => exit(0),
        Ok(report) => {
            eprint!("{report}");
            exit(1);
        }
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

async fn run_dock(shelf: Shelf, opts: ExternalSpecs, no_build: bool) -> Result<ErrorReport> {
    let resolution = shelf.resolve(&opts.specs)?;
    let mut report = resolution.errors;

    let mut docked = Vec::new();
    let mut pending = Vec::new();
    for source in resolution.sources {
        if source.is_docked() {
            info!("{source} is already docked");
            docked.push(source);
            continue;
        }

        match check_requirements(&source) {
            Ok(()) => pending.push(source),
            Err(err) if shelf.break_on_error() => return Err(err.into()),
            Err(err) => report.record(source.name(), &err),
        }
    }

    let (fetched, fetch_report) = fetch_all(&shelf, pending).await?;
    report.merge(fetch_report);

    if !no_build {
        report.merge(shelf.build(&fetched, &ShellBuilder::new())?);
    }

    docked.extend(fetched);
    report.merge(shelf.relink(&docked)?);

    Ok(report)
}

/// Fetch every source at once, one progress bar each.
async fn fetch_all(shelf: &Shelf, sources: Vec<Source>) -> Result<(Vec<Source>, ErrorReport)> {
    let multi = MultiProgress::new();
    let handles = sources.into_iter().map(|source| {
        let bar = multi.add(ProgressBar::no_length());
        let shelf_dir = shelf.dir().to_path_buf();
        tokio::task::spawn_blocking(move || {
            let outcome = Fetcher::for_source(&source, &shelf_dir, bar)
                .and_then(|fetcher| fetcher.fetch(&source));
            (source, outcome)
        })
    });

    let mut fetched = Vec::new();
    let mut report = ErrorReport::new();
    for joined in join_all(handles).await {
        let (source, outcome) = joined?;
        match outcome {
            Ok(()) => fetched.push(source),
            Err(err) if shelf.break_on_error() => return Err(err.into()),
            Err(err) => report.record(source.name(), &err),
        }
    }

    Ok((fetched, report))
}

fn run_build(shelf: Shelf, opts: RequiredSpecs) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.specs)?;
    let mut report = resolution.errors;
    report.merge(shelf.build(&resolution.sources, &ShellBuilder::new())?);
    report.merge(shelf.relink(&resolution.sources)?);

    Ok(report)
}

fn run_test(shelf: Shelf, opts: RequiredSpecs) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.specs)?;
    let mut report = resolution.errors;
    report.merge(shelf.test(&resolution.sources, &ShellBuilder::new())?);

    Ok(report)
}

fn run_update(shelf: Shelf, opts: OptionalSpecs, no_build: bool) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.or_all())?;
    let mut report = resolution.errors;
    let (changed, update_report) = shelf.update(&resolution.sources)?;
    report.merge(update_report);

    if !no_build {
        report.merge(shelf.build(&changed, &ShellBuilder::new())?);
    }
    report.merge(shelf.relink(&changed)?);

    Ok(report)
}

fn run_remove(shelf: Shelf, opts: RequiredSpecs) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.specs)?;
    let mut report = resolution.errors;
    report.merge(shelf.remove(&resolution.sources)?);

    Ok(report)
}

fn run_relink(shelf: Shelf, opts: OptionalSpecs) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.or_all())?;
    let mut report = resolution.errors;
    report.merge(shelf.relink(&resolution.sources)?);

    Ok(report)
}

fn run_disable(mut shelf: Shelf, opts: OptionalSpecs) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.or_all())?;
    let mut report = resolution.errors;
    report.merge(shelf.disable(&resolution.sources)?);

    Ok(report)
}

fn run_enable(mut shelf: Shelf, opts: RequiredSpecs) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.specs)?;
    let mut report = resolution.errors;
    report.merge(shelf.enable(&resolution.sources)?);

    Ok(report)
}

fn run_show(shelf: Shelf, opts: OptionalSpecs) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.or_all())?;
    for source in &resolution.sources {
        println!("{source} ({})", source.directory().display());
        for shown in shelf.show(source)? {
            let name = shown
                .link
                .link
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let broken = if shown.broken { " (BROKEN)" } else { "" };
            println!(
                "  [{}] {name} -> {}{broken}",
                shown.kind,
                shown.link.target.display()
            );
        }
    }

    Ok(resolution.errors)
}

fn run_which(shelf: Shelf, opts: Names) -> Result<ErrorReport> {
    for name in &opts.names {
        let found = shelf.which(name)?;
        if found.is_empty() {
            warn!("{name} is not in any link farm");
        }

        for (kind, link) in found {
            println!("[{kind}] {}", link.target.display());
        }
    }

    Ok(ErrorReport::new())
}

fn run_resolve(shelf: Shelf, opts: RequiredSpecs) -> Result<ErrorReport> {
    let resolution = shelf.resolve_docked(&opts.specs)?;
    for source in &resolution.sources {
        println!("{}", source.directory().display());
    }

    Ok(resolution.errors)
}

fn run_cleanfarms(shelf: Shelf) -> Result<ErrorReport> {
    for removed in shelf.clean_farms()? {
        info!("removed broken link {:?}", removed.display());
    }

    Ok(ErrorReport::new())
}
