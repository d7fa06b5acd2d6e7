// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the shelf configuration file that toolshelf reads
//! from `$TOOLSHELF/.toolshelf/config.toml`. Every field has a default, so a
//! missing configuration file is the same as an empty one.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Shelf configuration.
///
/// # General Layout
///
/// ```toml
/// cookies = [".toolshelf/local-cookies.catalog", ".toolshelf/cookies.catalog"]
/// default_exclude_paths = ["test", "tests", "dep", "deps"]
/// uninteresting_executables = ["*.bak"]
///
/// [shorthands]
/// gh = "https://github.com/{user}/{project}.git"
/// bb = "https://bitbucket.org/{user}/{project}"
/// ```
///
/// Cookie files are consulted in the order listed, most specific first.
/// Relative cookie paths are taken relative to the shelf directory.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Ordered listing of cookie files holding hint rules.
    pub cookies: Vec<PathBuf>,

    /// Relative subdirectories never searched for linkable files.
    pub default_exclude_paths: Vec<String>,

    /// Extra glob patterns of executable names that never get linked.
    pub uninteresting_executables: Vec<String>,

    /// Shorthand prefix to URL template, e.g., `gh:user/project`.
    pub shorthands: BTreeMap<String, String>,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            cookies: vec![
                PathBuf::from(".toolshelf/local-cookies.catalog"),
                PathBuf::from(".toolshelf/cookies.catalog"),
            ],
            default_exclude_paths: ["test", "tests", "dep", "deps"]
                .into_iter()
                .map(String::from)
                .collect(),
            uninteresting_executables: Vec::new(),
            shorthands: BTreeMap::from([
                (
                    "gh".into(),
                    "https://github.com/{user}/{project}.git".into(),
                ),
                ("bb".into(), "https://bitbucket.org/{user}/{project}".into()),
            ]),
        }
    }
}

impl ShelfConfig {
    /// Load configuration file, or fall back to defaults when missing.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if the file is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(content) => content.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.as_ref().to_path_buf(),
            }),
        }
    }

    /// Cookie file paths made absolute against the shelf directory.
    pub fn cookie_files(&self, shelf: impl AsRef<Path>) -> Vec<PathBuf> {
        self.cookies
            .iter()
            .map(|cookie| shelf.as_ref().join(cookie))
            .collect()
    }

    /// Expand a shorthand spec like `gh:user/project` through its template.
    ///
    /// Returns `None` if the spec does not use a configured shorthand, or
    /// if its remainder is not exactly `user/project`.
    pub fn expand_shorthand(&self, spec: &str) -> Option<String> {
        let (prefix, rest) = spec.split_once(':')?;
        let template = self.shorthands.get(prefix)?;
        let (user, project) = rest.split_once('/')?;
        if user.is_empty() || project.is_empty() || project.contains('/') {
            return None;
        }

        Some(
            template
                .replace("{user}", user)
                .replace("{project}", project),
        )
    }
}

impl FromStr for ShelfConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: ShelfConfig = toml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on cookie file paths.
        config.cookies = config
            .cookies
            .iter()
            .map(|cookie| {
                shellexpand::full(cookie.to_string_lossy().as_ref())
                    .map(|expanded| PathBuf::from(expanded.into_owned()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConfigError::ShellExpansion)?;

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("COOKIE_HOME", "/home/blah/cookies")])]
    fn deserialize_shelf_config() -> anyhow::Result<()> {
        let result: ShelfConfig = r#"
            cookies = ["$COOKIE_HOME/mine.catalog", ".toolshelf/cookies.catalog"]
            uninteresting_executables = ["*.bak"]

            [shorthands]
            sr = "https://git.sr.ht/~{user}/{project}"
        "#
        .parse()?;

        let expect = ShelfConfig {
            cookies: vec![
                PathBuf::from("/home/blah/cookies/mine.catalog"),
                PathBuf::from(".toolshelf/cookies.catalog"),
            ],
            default_exclude_paths: ShelfConfig::default().default_exclude_paths,
            uninteresting_executables: vec!["*.bak".into()],
            shorthands: BTreeMap::from([(
                "sr".into(),
                "https://git.sr.ht/~{user}/{project}".into(),
            )]),
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn expand_default_shorthands() {
        let config = ShelfConfig::default();
        assert_eq!(
            config.expand_shorthand("gh:alice/foo"),
            Some("https://github.com/alice/foo.git".into())
        );
        assert_eq!(
            config.expand_shorthand("bb:bob/bar"),
            Some("https://bitbucket.org/bob/bar".into())
        );
        assert_eq!(config.expand_shorthand("gh:alice"), None);
        assert_eq!(config.expand_shorthand("https://example.org/a/b"), None);
    }

    #[test]
    fn missing_config_file_means_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = ShelfConfig::load(dir.path().join("nope.toml"))?;
        assert_eq!(config, ShelfConfig::default());
        Ok(())
    }
}
