#![allow(missing_docs)]

//! Append-only, ordered lists of key paths.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::path::KeyPath;

/// An ordered list of paths. Insertion order is kept and duplicates are allowed.
///
/// Growing the list consumes it, so a list that was appended to can't be
/// observed in its old state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList(Vec<KeyPath>);

/// Growing a [`PathList`] failed. The list is handed back untouched:
/// none of the new items were added.
#[derive(Error, Debug)]
#[error("Failed to grow a list of {} paths by {additional}: {source}", list.len())]
pub struct AppendError {
    pub list: PathList,
    pub additional: usize,
    #[source]
    pub source: TryReserveError,
}

impl PathList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// `self` followed by every item of `items`, in order.
    /// Appending an empty list returns `self` as is.
    pub fn append(self, items: PathList) -> Result<PathList, AppendError> {
        self.append_with(items, try_grow)
    }

    /// [`PathList::append`] with the growth step supplied by the caller.
    pub(crate) fn append_with<F>(mut self, items: PathList, reserve: F) -> Result<PathList, AppendError>
    where
        F: FnOnce(&mut Vec<KeyPath>, usize) -> Result<(), TryReserveError>,
    {
        if items.is_empty() {
            return Ok(self);
        }
        let additional = items.len();
        if let Err(source) = reserve(&mut self.0, additional) {
            return Err(AppendError {
                list: self,
                additional,
                source,
            });
        }
        self.0.extend(items.0);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyPath> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[KeyPath] {
        &self.0
    }
}

/// Make room for `additional` more paths without aborting on failure.
pub(crate) fn try_grow(list: &mut Vec<KeyPath>, additional: usize) -> Result<(), TryReserveError> {
    list.try_reserve(additional)
}

impl From<Vec<KeyPath>> for PathList {
    fn from(paths: Vec<KeyPath>) -> Self {
        Self(paths)
    }
}

impl FromIterator<KeyPath> for PathList {
    fn from_iter<I: IntoIterator<Item = KeyPath>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PathList {
    type Item = KeyPath;
    type IntoIter = std::vec::IntoIter<KeyPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PathList {
    type Item = &'a KeyPath;
    type IntoIter = std::slice::Iter<'a, KeyPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
