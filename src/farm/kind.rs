// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link farm kinds and what belongs in each.

use crate::hint::{HintName, Hints};

use glob::{Pattern, PatternError};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

/// Executable names that are build or packaging machinery, not tools.
const UNINTERESTING_NAMES: &[&str] = &[
    "config.status",
    "config.sub",
    "config.guess",
    "missing",
    "mkinstalldirs",
    "install-sh",
    "ltmain.sh",
    "depcomp",
    "libtool",
    "README",
    "INSTALL",
    "COPYING",
    "LICENSE",
    "AUTHORS",
    "authors",
    "CHANGELOG",
    "Makefile",
    "Makefile.am",
    ".gitignore",
    ".hgignore",
    "Rakefile",
    "make",
    "ant",
    "mkdir",
    "mv",
    "rm",
    "git",
    "hg",
    "wget",
    "unzip",
    "tar",
    "cat",
    "which",
    "install",
];

/// Build script stems that are uninteresting alone, with a `-cygwin` suffix,
/// or with a script extension.
const UNINTERESTING_SCRIPTS: &[&str] = &[
    "make",
    "build",
    "compile",
    "clean",
    "install",
    "mkdep",
    "configure",
    "Configure",
    "autogen",
    "make-bindist",
    "run",
    "runme",
    "buildme",
    "doit",
    "setup",
    "__init__",
    "test",
    "testme",
    "runtests",
];

const SCRIPT_EXTENSIONS: &[&str] = &["sh", "pl", "py"];

/// Executable-bit files that are documents or sources, not tools.
const UNINTERESTING_PATTERNS: &[&str] = &[
    "*.txt", "*.TXT", "*.doc", "*.rtf", "*.markdown", "*.md", "*.html", "*.css", "*.png",
    "*.jpg", "*.bmp", "*.gif", "*.svg", "*.swf", "*.so", "*.pbxproj", "*.c", "*.cpp", "*.h",
    "*.java",
];

const LIBRARY_SUFFIXES: &[&str] = &[".so", ".a", ".dylib", ".dll"];

const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];

/// Kind of link farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FarmKind {
    Bin,
    Lib,
    Include,
    PkgConfig,
    Python,
}

impl FarmKind {
    pub const ALL: [FarmKind; 5] = [
        FarmKind::Bin,
        FarmKind::Lib,
        FarmKind::Include,
        FarmKind::PkgConfig,
        FarmKind::Python,
    ];

    /// Name of farm directory under the shelf.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Bin => ".bin",
            Self::Lib => ".lib",
            Self::Include => ".include",
            Self::PkgConfig => ".pkgconfig",
            Self::Python => ".python",
        }
    }

    /// Hint listing relative paths to link in place of searching the tree.
    pub fn listing_hint(self) -> Option<HintName> {
        match self {
            Self::Include => Some(HintName::IncludeDirs),
            Self::Python => Some(HintName::PythonModules),
            _ => None,
        }
    }
}

impl Display for FarmKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.dir_name().trim_start_matches('.'))
    }
}

/// Entry found while walking a source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: std::path::PathBuf,
    pub is_dir: bool,
}

/// Decide which tree entries belong in which farm.
#[derive(Debug, Clone)]
pub struct Classifier {
    extra: Vec<Pattern>,
    builtin: Vec<Pattern>,
}

impl Classifier {
    /// Construct classifier with extra uninteresting executable patterns.
    ///
    /// # Errors
    ///
    /// - Return [`PatternError`] if an extra pattern is not a valid glob.
    pub fn new(extra: &[String]) -> Result<Self, PatternError> {
        let extra = extra
            .iter()
            .map(|pattern| Pattern::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        let builtin = UNINTERESTING_PATTERNS
            .iter()
            .map(|pattern| Pattern::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { extra, builtin })
    }

    /// Entry belongs in farm of given kind.
    pub fn belongs(&self, kind: FarmKind, entry: &TreeEntry, hints: &Hints) -> bool {
        let Some(name) = entry.path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };

        match kind {
            FarmKind::Bin => {
                !entry.is_dir
                    && super::is_executable(&entry.path)
                    && (hints.list(HintName::InterestingExecutables).contains(&name)
                        || !self.is_uninteresting(name))
            }
            FarmKind::Lib => {
                !entry.is_dir
                    && (LIBRARY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
                        || is_versioned_shared_object(name))
            }
            FarmKind::Include => {
                !entry.is_dir
                    && Path::new(name)
                        .extension()
                        .and_then(|extension| extension.to_str())
                        .is_some_and(|extension| HEADER_EXTENSIONS.contains(&extension))
            }
            FarmKind::PkgConfig => {
                !entry.is_dir && name.ends_with(".pc") && !name.ends_with("-uninstalled.pc")
            }
            FarmKind::Python => {
                entry.is_dir
                    && entry.path.join("__init__.py").is_file()
                    && !entry
                        .path
                        .parent()
                        .is_some_and(|parent| parent.join("__init__.py").is_file())
            }
        }
    }

    fn is_uninteresting(&self, name: &str) -> bool {
        UNINTERESTING_NAMES.contains(&name)
            || is_build_script(name)
            || is_numbered_script(name)
            || self.builtin.iter().chain(&self.extra).any(|pattern| pattern.matches(name))
    }
}

/// Split `name.ext` where `ext` is a script extension.
fn script_stem(name: &str) -> &str {
    name.rsplit_once('.')
        .filter(|(_, extension)| SCRIPT_EXTENSIONS.contains(extension))
        .map_or(name, |(stem, _)| stem)
}

fn is_build_script(name: &str) -> bool {
    let stem = script_stem(name);
    let stem = stem.strip_suffix("-cygwin").unwrap_or(stem);
    UNINTERESTING_SCRIPTS.contains(&stem)
}

/// Names like `libfoo.so.1` or `libfoo.so.1.2.3`.
fn is_versioned_shared_object(name: &str) -> bool {
    name.split_once(".so.").is_some_and(|(stem, version)| {
        !stem.is_empty()
            && version
                .split('.')
                .all(|part| !part.is_empty() && part.chars().all(|digit| digit.is_ascii_digit()))
    })
}

/// Names like `1`, `02.sh`, `0042.py`.
fn is_numbered_script(name: &str) -> bool {
    let stem = script_stem(name);
    (1..=4).contains(&stem.len()) && stem.chars().all(|digit| digit.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("configure"; "configure")]
    #[test_case("build.sh"; "build script")]
    #[test_case("make-cygwin.pl"; "cygwin variant")]
    #[test_case("README"; "readme")]
    #[test_case("notes.txt"; "text file")]
    #[test_case("01.sh"; "numbered script")]
    #[test_case("libfoo.so"; "shared object")]
    #[test]
    fn uninteresting_executables(name: &str) -> anyhow::Result<()> {
        let classifier = Classifier::new(&[])?;
        assert!(classifier.is_uninteresting(name));
        Ok(())
    }

    #[test_case("widget"; "plain tool")]
    #[test_case("widget.sh"; "script tool")]
    #[test_case("builder"; "similar to build")]
    #[test_case("12345"; "too many digits")]
    #[test]
    fn interesting_executables(name: &str) -> anyhow::Result<()> {
        let classifier = Classifier::new(&[])?;
        assert!(!classifier.is_uninteresting(name));
        Ok(())
    }

    #[test]
    fn extra_uninteresting_patterns() -> anyhow::Result<()> {
        let classifier = Classifier::new(&["*.bak".into()])?;
        assert!(classifier.is_uninteresting("widget.bak"));
        assert!(Classifier::new(&["[".into()]).is_err());
        Ok(())
    }

    #[test_case(FarmKind::Lib, "libfoo.so.1"; "versioned shared object")]
    #[test_case(FarmKind::Lib, "libfoo.a"; "static library")]
    #[test_case(FarmKind::Include, "foo.hpp"; "c++ header")]
    #[test_case(FarmKind::PkgConfig, "foo.pc"; "pkgconfig file")]
    #[test]
    fn file_kinds(kind: FarmKind, name: &str) -> anyhow::Result<()> {
        let classifier = Classifier::new(&[])?;
        let entry = TreeEntry {
            path: Path::new("/src").join(name),
            is_dir: false,
        };
        assert!(classifier.belongs(kind, &entry, &Hints::new()));
        Ok(())
    }

    #[test_case("libfoo.so.1.2.3", true; "long version")]
    #[test_case("foo.so.bak", false; "backup file")]
    #[test_case("notes.so.txt", false; "text file")]
    #[test_case("libfoo.so.", false; "empty version")]
    #[test_case("libfoo.so.1..2", false; "empty version part")]
    #[test]
    fn versioned_shared_objects(name: &str, expect: bool) -> anyhow::Result<()> {
        let classifier = Classifier::new(&[])?;
        let entry = TreeEntry {
            path: Path::new("/src").join(name),
            is_dir: false,
        };
        assert_eq!(classifier.belongs(FarmKind::Lib, &entry, &Hints::new()), expect);
        Ok(())
    }

    #[test]
    fn uninstalled_pkgconfig_is_skipped() -> anyhow::Result<()> {
        let classifier = Classifier::new(&[])?;
        let entry = TreeEntry {
            path: Path::new("/src/foo-uninstalled.pc").into(),
            is_dir: false,
        };
        assert!(!classifier.belongs(FarmKind::PkgConfig, &entry, &Hints::new()));
        Ok(())
    }
}
