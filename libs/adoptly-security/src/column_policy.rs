//! Column paths and the allow/deny policies built from them.
//!
//! A [`ColumnPath`] names a column of the root entity (`name`, `pet.name`),
//! a column of a joined relation (`user.email`), every column of a relation
//! (`user.*`) or every root column (`*`). Paths are case-sensitive.
//!
//! A [`ColumnPolicy`] is either a deny-list or an allow-list of such paths,
//! never both. The same policy drives read projections and write gating.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Wildcard token: `*` alone means "all root columns", `alias.*` means
/// "all columns of that relation".
pub const WILDCARD: &str = "*";

/// A dotted column path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnPath(String);

impl ColumnPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// `*`
    #[must_use]
    pub fn all_root() -> Self {
        Self(WILDCARD.to_owned())
    }

    /// Bare root column, e.g. `name`.
    #[must_use]
    pub fn root(column: &str) -> Self {
        Self(column.to_owned())
    }

    /// `alias.column`
    #[must_use]
    pub fn relation(alias: &str, column: &str) -> Self {
        Self(format!("{alias}.{column}"))
    }

    /// `alias.*`
    #[must_use]
    pub fn relation_wildcard(alias: &str) -> Self {
        Self::relation(alias, WILDCARD)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the literal `*`.
    #[must_use]
    pub fn is_all_root(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Split into `(alias, column)`. Bare root paths return `None`.
    #[must_use]
    pub fn split(&self) -> Option<(&str, &str)> {
        self.0.split_once('.')
    }

    /// `true` for `alias.*`.
    #[must_use]
    pub fn is_relation_wildcard(&self) -> bool {
        self.split().is_some_and(|(_, column)| column == WILDCARD)
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ColumnPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColumnPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ColumnPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Raised when a rule declares both lists or neither.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnPolicyError {
    #[error("column attributes declare both `excluded` and `included`")]
    BothListsSet,

    #[error("column attributes declare neither `excluded` nor `included`")]
    NoListSet,
}

/// Deny-list or allow-list of column paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnPolicy {
    /// Everything is visible/writable except these paths.
    Exclude(BTreeSet<ColumnPath>),
    /// Only these paths are visible/writable.
    Include(BTreeSet<ColumnPath>),
}

impl ColumnPolicy {
    /// Build a policy from the two optional lists of a rule.
    ///
    /// # Errors
    ///
    /// [`ColumnPolicyError`] when both lists or neither list are given.
    pub fn from_lists(
        excluded: Option<Vec<ColumnPath>>,
        included: Option<Vec<ColumnPath>>,
    ) -> Result<Self, ColumnPolicyError> {
        match (excluded, included) {
            (Some(excluded), None) => Ok(Self::Exclude(excluded.into_iter().collect())),
            (None, Some(included)) => Ok(Self::Include(included.into_iter().collect())),
            (Some(_), Some(_)) => Err(ColumnPolicyError::BothListsSet),
            (None, None) => Err(ColumnPolicyError::NoListSet),
        }
    }

    pub fn exclude<P: Into<ColumnPath>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self::Exclude(paths.into_iter().map(Into::into).collect())
    }

    pub fn include<P: Into<ColumnPath>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self::Include(paths.into_iter().map(Into::into).collect())
    }

    /// Empty deny-list: the whole entity is visible and writable.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::Exclude(BTreeSet::new())
    }

    #[must_use]
    pub fn paths(&self) -> &BTreeSet<ColumnPath> {
        match self {
            Self::Exclude(paths) | Self::Include(paths) => paths,
        }
    }

    /// Whether `path` is listed verbatim.
    #[must_use]
    pub fn lists(&self, path: &str) -> bool {
        self.paths().contains(path)
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Exclude(paths) if paths.is_empty())
    }
}
