// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the shelf lives, and where its bookkeeping files are
//! placed inside of it.
//!
//! # Shelf Layout
//!
//! ```text
//! $TOOLSHELF/
//!     <host>/<user>/<project>/      docked source trees
//!     .bin/ .lib/ .include/ ...     link farms
//!     .distfiles/                   cached archives
//!     .toolshelf/
//!         config.toml
//!         cookies.catalog
//!         local-cookies.catalog
//!         blacklist.txt
//!         catalog/<name>.catalog
//! ```

use std::path::{Path, PathBuf};

/// Name of the environment variable that overrides the shelf location.
pub const SHELF_ENV: &str = "TOOLSHELF";

/// Name of the bookkeeping directory at the top of every shelf.
pub const META_DIR: &str = ".toolshelf";

/// Determine default absolute path to the shelf directory.
///
/// Uses `$TOOLSHELF` when set, and `$XDG_DATA_HOME/toolshelf` otherwise.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if the data directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_shelf_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(SHELF_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    dirs::data_dir()
        .map(|path| path.join("toolshelf"))
        .ok_or(NoWayHome)
}

/// Path to the bookkeeping directory of a shelf.
pub fn meta_dir(shelf: impl AsRef<Path>) -> PathBuf {
    shelf.as_ref().join(META_DIR)
}

/// Path to the configuration file of a shelf.
pub fn config_file(shelf: impl AsRef<Path>) -> PathBuf {
    meta_dir(shelf).join("config.toml")
}

/// Path to the persisted blacklist of a shelf.
pub fn blacklist_file(shelf: impl AsRef<Path>) -> PathBuf {
    meta_dir(shelf).join("blacklist.txt")
}

/// Path to a named catalog, i.e., the target of an `@@name` spec.
pub fn named_catalog_file(shelf: impl AsRef<Path>, name: &str) -> PathBuf {
    meta_dir(shelf)
        .join("catalog")
        .join(format!("{name}.catalog"))
}

/// Directory where downloaded or copied archives are cached.
pub fn distfiles_dir(shelf: impl AsRef<Path>) -> PathBuf {
    shelf.as_ref().join(".distfiles")
}

/// No way to determine the directory that should hold the shelf.
///
/// # See Also
///
/// - [`dirs::data_dir`](https://docs.rs/dirs/latest/dirs/fn.data_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to toolshelf directory, set $TOOLSHELF")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("TOOLSHELF", "/home/blah/toolshelf")])]
    fn default_shelf_dir_honors_env() -> anyhow::Result<()> {
        assert_eq!(default_shelf_dir()?, PathBuf::from("/home/blah/toolshelf"));
        Ok(())
    }

    #[test]
    fn bookkeeping_paths() {
        let shelf = Path::new("/shelf");
        assert_eq!(
            blacklist_file(shelf),
            PathBuf::from("/shelf/.toolshelf/blacklist.txt")
        );
        assert_eq!(
            named_catalog_file(shelf, "essentials"),
            PathBuf::from("/shelf/.toolshelf/catalog/essentials.catalog")
        );
        assert_eq!(config_file(shelf), PathBuf::from("/shelf/.toolshelf/config.toml"));
    }
}
