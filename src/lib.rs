// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dock external sources on a shelf, and link what they provide into farms.
//!
//! Sources are fetched into a predictable layout, `<shelf>/<host>/<user>/<project>`,
//! whether they come from Git or Mercurial repositories, or from remote or
//! local archives. Independently of fetching, link farms like `<shelf>/.bin`
//! are kept in line with the docked source trees, so that the executables,
//! libraries, headers, package-config files, and Python packages of many
//! sources show up in a few directories that can go on search paths.
//!
//! # See Also
//!
//! - [`source`] for the spec grammar.
//! - [`hint`] for per-source policy in cookie files.
//! - [`farm`] for link farm reconciliation.
//! - [`shelf`] for the operations commands are built on.

pub mod blacklist;
pub mod build;
pub mod config;
pub mod farm;
pub mod fetch;
pub mod hint;
pub mod path;
pub mod report;
pub mod shelf;
pub mod source;
pub mod syscall;
