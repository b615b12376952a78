//! Lists the keys below an open key.

use std::collections::TryReserveError;

use crate::accumulate::{try_grow, PathList};
use crate::error::{RegistryError, RegistryResult};
use crate::path::KeyPath;
use crate::store::{Access, RegistryKey};

/// Default cap on how many levels [`Enumerator::list_all_descendants`] descends.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Walks a key tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enumerator {
    max_depth: usize,
}

impl Default for Enumerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Enumerator {
    /// Descend at most `max_depth` levels below the starting path.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// The depth cap.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Full paths of the direct children of `path`, in the order the store
    /// reports them.
    pub fn list_children<K: RegistryKey>(&self, root: &K, path: &KeyPath) -> RegistryResult<PathList> {
        let unreachable = |source| RegistryError::NodeUnreachable {
            path: path.to_string(),
            source,
        };
        let key = root.open(path, Access::Enumerate).map_err(unreachable)?;
        let mut children = Vec::new();
        for index in 0u32.. {
            match key.enum_child(index).map_err(unreachable)? {
                Some(name) => match path.child(name.as_str()) {
                    Some(child) => children.push(child),
                    None => tracing::warn!(%path, index, ?name, "skipping child with an unusable name"),
                },
                None => break,
            }
        }
        Ok(children.into())
    }

    /// Every path below `path`.
    ///
    /// The direct children of a key come first, followed by everything below
    /// the first child, then everything below the second child, and so on.
    /// So for `A\A1` and `B` the result is `[A, B, A1]`.
    ///
    /// A child that can't be walked only contributes itself; failing to list
    /// `path` itself fails the call.
    #[tracing::instrument(skip_all, fields(path = %path))]
    pub fn list_all_descendants<K: RegistryKey>(
        &self,
        root: &K,
        path: &KeyPath,
    ) -> RegistryResult<PathList> {
        let all = self.descend(root, path, 0, &try_grow)?;
        tracing::debug!(count = all.len(), "enumerated");
        Ok(all)
    }

    fn descend<K, R>(
        &self,
        root: &K,
        path: &KeyPath,
        depth: usize,
        reserve: &R,
    ) -> RegistryResult<PathList>
    where
        K: RegistryKey,
        R: Fn(&mut Vec<KeyPath>, usize) -> Result<(), TryReserveError>,
    {
        if depth >= self.max_depth {
            return Err(RegistryError::DepthExceeded {
                path: path.to_string(),
                max_depth: self.max_depth,
            });
        }
        let children = self.list_children(root, path)?;
        let mut deeper = PathList::new();
        for child in &children {
            match self.descend(root, child, depth + 1, reserve) {
                Ok(below) => {
                    deeper = match deeper.append_with(below, reserve) {
                        Ok(grown) => grown,
                        Err(e) => {
                            tracing::warn!(path = %child, error = %e, "dropping subtree");
                            e.list
                        }
                    }
                }
                Err(e) => tracing::warn!(path = %child, error = %e, "skipping subtree"),
            }
        }
        Ok(children.append_with(deeper, reserve)?)
    }
}
