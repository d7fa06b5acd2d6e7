// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cascading hint rules.
//!
//! Source trees rarely carry any toolshelf-specific metadata. Instead, policy
//! for a source (how to build it, where to look for executables, etc.) lives
//! in __cookie__ files kept by the user. A cookie file is a line-oriented
//! listing of pattern keys, each followed by the hints that apply to every
//! source whose canonical name matches that pattern:
//!
//! ```text
//! # comments and blank lines are ignored
//! github.com/alice/*
//!     build_command ./bootstrap && make
//!     exclude_paths vendor
//!
//! */frobnicator
//!     build_command@macos gmake
//!     only_paths bin
//! ```
//!
//! Patterns are shell-style globs, where `*` may also span `/`.
//!
//! # Precedence
//!
//! Cookie files are consulted in the order given, most specific first. The
//! first file with _any_ pattern matching a source wins outright: the hints
//! of all its matching patterns are unioned, and later files are never
//! consulted for that source, even for hint names the winning file does not
//! define. Cookie files override whole rule sets, they do not merge.

use glob::Pattern;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Recognized hint names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HintName {
    /// Shell command that builds the source.
    BuildCommand,

    /// Shell command that runs the source's test suite.
    TestCommand,

    /// Only search these relative directories for linkable files.
    OnlyPaths,

    /// Never search these relative directories for linkable files.
    ExcludePaths,

    /// Either `yes` or `no`.
    RectifyPermissions,

    /// Executables that must be on the search path before docking.
    RequireExecutables,

    /// Executables linked even if they look uninteresting.
    InterestingExecutables,

    /// Python packages to link instead of searching for them.
    PythonModules,

    /// Include directories to link instead of searching for headers.
    IncludeDirs,
}

impl HintName {
    pub const ALL: [HintName; 9] = [
        HintName::BuildCommand,
        HintName::TestCommand,
        HintName::OnlyPaths,
        HintName::ExcludePaths,
        HintName::RectifyPermissions,
        HintName::RequireExecutables,
        HintName::InterestingExecutables,
        HintName::PythonModules,
        HintName::IncludeDirs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BuildCommand => "build_command",
            Self::TestCommand => "test_command",
            Self::OnlyPaths => "only_paths",
            Self::ExcludePaths => "exclude_paths",
            Self::RectifyPermissions => "rectify_permissions",
            Self::RequireExecutables => "require_executables",
            Self::InterestingExecutables => "interesting_executables",
            Self::PythonModules => "python_modules",
            Self::IncludeDirs => "include_dirs",
        }
    }
}

impl Display for HintName {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for HintName {
    type Err = UnknownHint;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|hint| hint.as_str() == name)
            .ok_or(UnknownHint)
    }
}

/// Name is not a recognized hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown hint name")]
pub struct UnknownHint;

/// Resolved hints of a single source.
///
/// Keys are raw hint names as written in the cookie file, so OS-qualified
/// variants like `build_command@linux` are kept next to the plain name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Hints(BTreeMap<String, String>);

impl Hints {
    /// Construct empty hint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of unqualified hint.
    pub fn get(&self, name: HintName) -> Option<&str> {
        self.0.get(name.as_str()).map(String::as_str)
    }

    /// Value of hint qualified for the current operating system, falling
    /// back to the unqualified variant.
    pub fn command(&self, name: HintName) -> Option<&str> {
        self.command_for(name, std::env::consts::OS)
    }

    /// Value of hint qualified for a given operating system, falling back to
    /// the unqualified variant.
    pub fn command_for(&self, name: HintName, os: &str) -> Option<&str> {
        self.0
            .get(&format!("{name}@{os}"))
            .or_else(|| self.0.get(name.as_str()))
            .map(String::as_str)
    }

    /// Whitespace separated list value of hint, empty if unset.
    pub fn list(&self, name: HintName) -> Vec<&str> {
        self.get(name)
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Insert raw hint.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    fn extend(&mut self, other: &Hints) {
        self.0
            .extend(other.0.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
}

/// Pattern key with the hints attached to it.
#[derive(Debug, Clone)]
struct HintRule {
    pattern: Pattern,
    hints: Hints,
}

/// Parsed contents of one cookie file.
#[derive(Debug, Clone)]
struct CookieFile {
    origin: PathBuf,
    rules: Vec<HintRule>,
}

impl CookieFile {
    fn parse(origin: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let origin = origin.into();
        let mut rules: Vec<HintRule> = Vec::new();
        let mut current: Option<usize> = None;

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let syntax_error = |message: String| Error::Syntax {
                origin: origin.clone(),
                line: index + 1,
                message,
            };

            if let Some((key, value)) = split_hint_line(line) {
                let Some(current) = current else {
                    return Err(syntax_error(format!("found hint {key} before any pattern")));
                };

                if key.split('@').next() == Some(HintName::RectifyPermissions.as_str())
                    && !matches!(value, "yes" | "no")
                {
                    return Err(syntax_error(format!(
                        "{key} must be 'yes' or 'no', not '{value}'"
                    )));
                }

                debug!("add hint '{key} {value}' to {}", rules[current].pattern);
                rules[current].hints.insert(key, value);
                continue;
            }

            // INVARIANT: Pattern keys are unique within one file, repeated
            // pattern lines amend the existing rule.
            current = match rules.iter().position(|rule| rule.pattern.as_str() == line) {
                Some(position) => Some(position),
                None => {
                    let pattern = Pattern::new(line).map_err(|err| {
                        syntax_error(format!("invalid pattern '{line}': {err}"))
                    })?;
                    rules.push(HintRule {
                        pattern,
                        hints: Hints::new(),
                    });
                    Some(rules.len() - 1)
                }
            };
        }

        Ok(Self { origin, rules })
    }
}

/// Split `hint_name[@os] value` line, or return `None` for anything else.
fn split_hint_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(char::is_whitespace)?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let name = key.split_once('@').map_or(key, |(name, _)| name);
    name.parse::<HintName>().ok()?;

    Some((key, value))
}

/// Ordered collection of cookie files.
#[derive(Debug, Default, Clone)]
pub struct HintStore {
    files: Vec<CookieFile>,
}

impl HintStore {
    /// Construct empty hint store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load listing of cookie files in precedence order.
    ///
    /// Files that do not exist are skipped.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if an existing file cannot be read.
    /// - Return [`Error::Syntax`] if a file is malformed.
    #[instrument(skip(files), level = "debug")]
    pub fn load(files: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<Self> {
        let mut store = Self::new();
        for path in files {
            let path = path.as_ref();
            let content = match read_to_string(path) {
                Ok(content) => content,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("no cookie file at {}", path.display());
                    continue;
                }
                Err(err) => {
                    return Err(Error::Read {
                        source: err,
                        origin: path.to_path_buf(),
                    })
                }
            };
            store.push_cookies(path, &content)?;
        }

        Ok(store)
    }

    /// Append cookie file contents with lowest precedence.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Syntax`] if contents are malformed.
    pub fn push_cookies(&mut self, origin: impl Into<PathBuf>, content: &str) -> Result<()> {
        self.files.push(CookieFile::parse(origin, content)?);
        Ok(())
    }

    /// Resolve effective hints for canonical source name.
    pub fn resolve(&self, name: &str) -> Hints {
        let mut resolved = Hints::new();
        for file in &self.files {
            let mut matched = false;
            for rule in file.rules.iter().filter(|rule| rule.pattern.matches(name)) {
                resolved.extend(&rule.hints);
                matched = true;
            }

            if matched {
                debug!("hints for {name} come from {}", file.origin.display());
                break;
            }
        }

        resolved
    }
}

/// Hint loading error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cookie file cannot be read.
    #[error("failed to read cookie file at {:?}", origin.display())]
    Read {
        #[source]
        source: std::io::Error,
        origin: PathBuf,
    },

    /// Cookie file is malformed.
    #[error("{}:{line}: {message}", origin.display())]
    Syntax {
        origin: PathBuf,
        line: usize,
        message: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn store(files: &[&str]) -> Result<HintStore> {
        let mut store = HintStore::new();
        for (index, content) in files.iter().enumerate() {
            store.push_cookies(format!("cookies-{index}"), content)?;
        }
        Ok(store)
    }

    #[test]
    fn parse_patterns_and_hints() -> anyhow::Result<()> {
        let store = store(&[indoc! {r#"
            # comment
            github.com/alice/*
                build_command ./bootstrap && make
                exclude_paths vendor  third_party

            */frob
                only_paths bin
                build_command@macos gmake
        "#}])?;

        let hints = store.resolve("github.com/alice/widget");
        assert_eq!(hints.get(HintName::BuildCommand), Some("./bootstrap && make"));
        assert_eq!(hints.list(HintName::ExcludePaths), vec!["vendor", "third_party"]);
        assert_eq!(hints.get(HintName::OnlyPaths), None);

        let hints = store.resolve("bitbucket.org/bob/frob");
        assert_eq!(hints.command_for(HintName::BuildCommand, "macos"), Some("gmake"));
        assert_eq!(hints.command_for(HintName::BuildCommand, "linux"), None);
        assert_eq!(hints.list(HintName::OnlyPaths), vec!["bin"]);

        Ok(())
    }

    #[test]
    fn union_of_matching_patterns_within_one_file() -> anyhow::Result<()> {
        let store = store(&[indoc! {r#"
            github.com/*/*
                build_command make
                test_command make check
            */*/frob
                build_command ./build.sh
        "#}])?;

        let hints = store.resolve("github.com/alice/frob");
        assert_eq!(hints.get(HintName::BuildCommand), Some("./build.sh"));
        assert_eq!(hints.get(HintName::TestCommand), Some("make check"));

        Ok(())
    }

    #[test]
    fn repeated_pattern_amends_rule() -> anyhow::Result<()> {
        let store = store(&[indoc! {r#"
            */frob
                build_command make
            */other
                build_command ./other.sh
            */frob
                test_command ./test.sh
        "#}])?;

        let hints = store.resolve("x/y/frob");
        assert_eq!(hints.get(HintName::BuildCommand), Some("make"));
        assert_eq!(hints.get(HintName::TestCommand), Some("./test.sh"));

        Ok(())
    }

    // Cookie files override whole rule sets. Do not "fix" this into a merge.
    #[test]
    fn first_matching_file_wins_without_merging() -> anyhow::Result<()> {
        let store = store(&[
            indoc! {r#"
                github.com/alice/frob
                    exclude_paths vendor
            "#},
            indoc! {r#"
                */frob
                    build_command make
                    exclude_paths other
            "#},
        ])?;

        let hints = store.resolve("github.com/alice/frob");
        assert_eq!(hints.get(HintName::BuildCommand), None);
        assert_eq!(hints.list(HintName::ExcludePaths), vec!["vendor"]);

        // Second file still applies where the first has no matching pattern.
        let hints = store.resolve("github.com/bob/frob");
        assert_eq!(hints.get(HintName::BuildCommand), Some("make"));

        Ok(())
    }

    #[test]
    fn hint_before_pattern_is_error() {
        let result = store(&["build_command make\n"]);
        assert!(matches!(result, Err(Error::Syntax { line: 1, .. })));
    }

    #[test]
    fn rectify_permissions_must_be_boolean() {
        let result = store(&["*/frob\nrectify_permissions maybe\n"]);
        assert!(matches!(result, Err(Error::Syntax { line: 2, .. })));

        let result = store(&["*/frob\nrectify_permissions yes\n"]);
        assert!(result.is_ok());
    }

    #[test]
    fn missing_cookie_files_are_skipped() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let present = dir.path().join("cookies.catalog");
        std::fs::write(&present, "*\n  build_command make\n")?;

        let store = HintStore::load([dir.path().join("missing.catalog"), present])?;
        assert_eq!(store.resolve("a/b/c").get(HintName::BuildCommand), Some("make"));

        Ok(())
    }
}
