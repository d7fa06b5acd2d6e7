// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-item error collection.
//!
//! Unless asked to stop at the first error, commands keep going when a single
//! source fails, and report every failure at the end grouped by the spec or
//! source it belongs to.

use std::{
    collections::BTreeMap,
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Errors grouped by the name of the item they occurred for.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    entries: BTreeMap<String, Vec<String>>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record error against item, including its chain of causes.
    pub fn record(&mut self, item: impl Into<String>, error: &(dyn StdError + 'static)) {
        let mut message = error.to_string();
        let mut cause = error.source();
        while let Some(inner) = cause {
            message.push_str(&format!(": {inner}"));
            cause = inner.source();
        }

        self.entries.entry(item.into()).or_default().push(message);
    }

    /// Absorb all entries of another report.
    pub fn merge(&mut self, other: ErrorReport) {
        for (item, messages) in other.entries {
            self.entries.entry(item).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Display for ErrorReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "errors occurred with {} item(s):", self.entries.len())?;
        for (item, messages) in &self.entries {
            writeln!(fmt, "{item}:")?;
            for message in messages {
                writeln!(fmt, "    {message}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn group_errors_by_item() {
        let mut report = ErrorReport::new();
        report.record("b/b/b", &Outer(std::io::Error::other("inner")));
        report.record("a/a/a", &std::io::Error::other("first"));
        report.record("a/a/a", &std::io::Error::other("second"));

        let expect = indoc! {"
            errors occurred with 2 item(s):
            a/a/a:
                first
                second
            b/b/b:
                outer: inner
        "};
        assert_eq!(report.to_string(), expect);
    }
}
