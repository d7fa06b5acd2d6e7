// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Building and testing docked sources.
//!
//! A `build_command` or `test_command` hint always wins. Without one, the
//! source tree is inspected for the usual build machinery, and the first
//! recognized convention is used.

use crate::{
    hint::HintName,
    source::Source,
    syscall::{missing_executables, shell_interactive, syscall_interactive, SyscallError},
};

use std::path::Path;
use tracing::{info, instrument};

/// Build and test sources in place.
pub trait Build {
    /// Build source in its docked directory.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError`] if any build step fails.
    fn build(&self, source: &Source) -> Result<()>;

    /// Run test suite of source in its docked directory.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError`] if any test step fails.
    fn test(&self, source: &Source) -> Result<()>;
}

/// Single step of a build or test plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Command line run through `sh -c`.
    Shell(String),

    /// Program with arguments, run in the source directory.
    Run(String, Vec<String>),
}

impl Step {
    fn run(program: &str, args: &[&str]) -> Self {
        Self::Run(program.into(), args.iter().map(|arg| arg.to_string()).collect())
    }

    fn execute(&self, cwd: &Path) -> Result<()> {
        match self {
            Self::Shell(line) => shell_interactive(line, cwd)?,
            Self::Run(program, args) => syscall_interactive(program, args, cwd)?,
        }

        Ok(())
    }
}

/// Steps needed to build source, empty if nothing recognizable is there.
pub fn build_plan(source: &Source) -> Vec<Step> {
    if let Some(command) = source.hints().command(HintName::BuildCommand) {
        return vec![Step::Shell(command.into())];
    }

    let dir = source.directory();
    let has = |name: &str| dir.join(name).is_file();

    if has("build.sh") {
        return vec![Step::run("./build.sh", &[])];
    }

    if has("make.sh") {
        return vec![Step::run("./make.sh", &[])];
    }

    if has("build.xml") {
        return vec![Step::run("ant", &[])];
    }

    let mut steps = Vec::new();
    if has("autogen.sh") && !has("configure") {
        steps.push(Step::run("./autogen.sh", &[]));
    }

    if has("configure") || !steps.is_empty() {
        let prefix = format!("--prefix={}", dir.display());
        steps.push(Step::run("./configure", &[prefix.as_str()]));
        steps.push(Step::run("make", &[]));
        return steps;
    }

    if has("Makefile") || has("makefile") {
        return vec![Step::run("make", &[])];
    }

    if dir.join("src/Makefile").is_file() {
        return vec![Step::run("make", &["-C", "src"])];
    }

    steps
}

/// Steps needed to test source, empty if it has no recognizable tests.
pub fn test_plan(source: &Source) -> Vec<Step> {
    if let Some(command) = source.hints().command(HintName::TestCommand) {
        return vec![Step::Shell(command.into())];
    }

    if source.directory().join("test.sh").is_file() {
        return vec![Step::run("./test.sh", &[])];
    }

    Vec::new()
}

/// Run build and test plans in the source directory, showing their output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellBuilder;

impl ShellBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl Build for ShellBuilder {
    #[instrument(skip(self, source), fields(source = %source), level = "debug")]
    fn build(&self, source: &Source) -> Result<()> {
        let steps = build_plan(source);
        if steps.is_empty() {
            info!("nothing to build in {source}");
            return Ok(());
        }

        info!("building {source}");
        for step in &steps {
            step.execute(source.directory())?;
        }

        Ok(())
    }

    #[instrument(skip(self, source), fields(source = %source), level = "debug")]
    fn test(&self, source: &Source) -> Result<()> {
        let steps = test_plan(source);
        if steps.is_empty() {
            info!("no tests found in {source}");
            return Ok(());
        }

        info!("testing {source}");
        for step in &steps {
            step.execute(source.directory())?;
        }

        Ok(())
    }
}

/// Check that every executable a source requires is on `$PATH`.
///
/// # Errors
///
/// - Return [`BuildError::MissingExecutables`] naming every absent one.
pub fn check_requirements(source: &Source) -> Result<()> {
    let missing = missing_executables(source.hints().list(HintName::RequireExecutables));
    if !missing.is_empty() {
        return Err(BuildError::MissingExecutables {
            name: source.name(),
            missing: missing.join(", "),
        });
    }

    Ok(())
}

/// Build error types.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Syscall(#[from] SyscallError),

    /// Source depends on executables that are not installed.
    #[error("{name} requires executables not found on $PATH: {missing}")]
    MissingExecutables { name: String, missing: String },
}

/// Friendly result alias :3
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hint::HintStore;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, write};

    fn source_with(files: &[&str], cookies: &str) -> anyhow::Result<(tempfile::TempDir, Source)> {
        let shelf = tempfile::tempdir()?;
        let mut hints = HintStore::new();
        hints.push_cookies("cookies", cookies)?;
        let source = Source::new(shelf.path(), "example.org", "alice", "widget").with_hints(&hints);
        create_dir_all(source.directory())?;
        for file in files {
            let path = source.directory().join(file);
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            write(path, "")?;
        }

        Ok((shelf, source))
    }

    #[test]
    fn hint_overrides_conventions() -> anyhow::Result<()> {
        let cookies = indoc! {"
            example.org/alice/widget
                build_command ./bootstrap --fast
                test_command make check
        "};
        let (_shelf, source) = source_with(&["build.sh", "test.sh"], cookies)?;

        assert_eq!(build_plan(&source), vec![Step::Shell("./bootstrap --fast".into())]);
        assert_eq!(test_plan(&source), vec![Step::Shell("make check".into())]);

        Ok(())
    }

    #[test]
    fn autotools_convention() -> anyhow::Result<()> {
        let (_shelf, source) = source_with(&["autogen.sh", "Makefile.am"], "")?;
        let prefix = format!("--prefix={}", source.directory().display());

        assert_eq!(
            build_plan(&source),
            vec![
                Step::run("./autogen.sh", &[]),
                Step::run("./configure", &[prefix.as_str()]),
                Step::run("make", &[]),
            ]
        );

        Ok(())
    }

    #[test]
    fn makefile_in_src() -> anyhow::Result<()> {
        let (_shelf, source) = source_with(&["src/Makefile"], "")?;
        assert_eq!(build_plan(&source), vec![Step::run("make", &["-C", "src"])]);
        assert!(test_plan(&source).is_empty());
        Ok(())
    }

    #[test]
    fn nothing_to_build() -> anyhow::Result<()> {
        let (_shelf, source) = source_with(&["README"], "")?;
        assert!(build_plan(&source).is_empty());
        ShellBuilder::new().build(&source)?;
        Ok(())
    }

    #[test]
    fn missing_required_executables() -> anyhow::Result<()> {
        let cookies = "*\n  require_executables sh surely-no-such-tool-exists\n";
        let (_shelf, source) = source_with(&[], cookies)?;
        let result = check_requirements(&source);
        assert!(matches!(
            result,
            Err(BuildError::MissingExecutables { missing, .. }) if missing == "surely-no-such-tool-exists"
        ));
        Ok(())
    }
}
